//! store/associate — связка key-записи с value-записью через поле val.

use anyhow::Result;

use crate::store::Store;

impl Store {
    /// Сохранить key и value и записать bucket value-записи в поле val
    /// key-записи (в первичной куче и каждом зеркале).
    ///
    /// - пустой key => Ok(false), куча не меняется;
    /// - пустой value => val = 0 (dereference такого ключа даст «не найдено»);
    /// - повторная ассоциация перезаписывает val (идемпотентность по ключу).
    pub fn associate(&mut self, key: &[u8], value: &[u8]) -> Result<bool> {
        if key.is_empty() {
            return Ok(false);
        }

        let kb = self.insert_buffer(key)?;
        let vb = if value.is_empty() {
            0
        } else {
            self.insert_buffer(value)?
        };

        for heap in std::iter::once(&mut self.primary).chain(self.mirrors.iter_mut()) {
            heap.write_entry_val(kb, vb)?;
        }
        Ok(true)
    }
}
