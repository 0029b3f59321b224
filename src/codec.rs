//! codec — zlib-конверт над flate2 (пара Compress/Decompress).
//!
//! Пара stateful и сбрасывается перед каждым вызовом; владеет ею Store
//! (за Mutex), поэтому одновременно кодек использует ровно одна операция.
//!
//! Контракт:
//! - compress_into пишет в предоставленный срез; 0 => вывод не влез
//!   (на пути записи это store-full).
//! - decompress_into обязан съесть весь вход и чисто закончить поток,
//!   иначе данные повреждены.

use anyhow::{anyhow, Context, Result};
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use crate::consts::COMPRESSION_LEVEL;

/// Верхняя граница размера zlib-вывода для входа длины `n`
/// (deflateBound + 6 байт zlib-обёртки).
#[inline]
pub fn zlib_bound(n: usize) -> usize {
    n + (n >> 12) + (n >> 14) + (n >> 25) + 13 + 6
}

pub struct Codec {
    c: Compress,
    d: Decompress,
}

impl Codec {
    pub fn new() -> Self {
        Self {
            c: Compress::new(Compression::new(COMPRESSION_LEVEL), true),
            d: Decompress::new(true),
        }
    }

    /// Сжать `input` в `out`. Возвращает число записанных байт,
    /// либо 0, если сжатый поток не помещается в `out`.
    pub fn compress_into(&mut self, input: &[u8], out: &mut [u8]) -> Result<usize> {
        self.c.reset();
        loop {
            let before_out = self.c.total_out();
            let status = self
                .c
                .compress(
                    &input[self.c.total_in() as usize..],
                    &mut out[self.c.total_out() as usize..],
                    FlushCompress::Finish,
                )
                .context("zlib compress")?;
            match status {
                Status::StreamEnd => return Ok(self.c.total_out() as usize),
                Status::Ok => {
                    if self.c.total_out() as usize >= out.len() {
                        return Ok(0);
                    }
                    if self.c.total_out() == before_out {
                        // вывода нет и места нет — поток не влезает
                        return Ok(0);
                    }
                }
                Status::BufError => return Ok(0),
            }
        }
    }

    /// Сжать в новый вектор (путь recompress при fetch массива).
    pub fn compress_vec(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut out = vec![0u8; zlib_bound(input.len())];
        let n = self.compress_into(input, &mut out)?;
        if n == 0 {
            return Err(anyhow!("zlib compress: output did not fit the bound"));
        }
        out.truncate(n);
        Ok(out)
    }

    /// Распаковать `input` в `out`. Возвращает число распакованных байт.
    /// Недоеденный вход, переполнение вывода или ошибка потока => ошибка
    /// (данные, скорее всего, повреждены).
    pub fn decompress_into(&mut self, input: &[u8], out: &mut [u8]) -> Result<usize> {
        self.d.reset(true);
        loop {
            let before_out = self.d.total_out();
            let status = self
                .d
                .decompress(
                    &input[self.d.total_in() as usize..],
                    &mut out[self.d.total_out() as usize..],
                    FlushDecompress::Finish,
                )
                .map_err(|e| anyhow!("zlib decompress: {} (data probably corrupted)", e))?;
            match status {
                Status::StreamEnd => break,
                Status::Ok => {
                    if self.d.total_out() == before_out
                        && self.d.total_out() as usize >= out.len()
                    {
                        return Err(anyhow!(
                            "zlib decompress: output overflow (data probably corrupted)"
                        ));
                    }
                }
                Status::BufError => {
                    return Err(anyhow!(
                        "zlib decompress: truncated or corrupted stream"
                    ));
                }
            }
        }
        if self.d.total_in() as usize != input.len() {
            return Err(anyhow!(
                "zlib decompress: trailing garbage after stream end ({} of {} bytes consumed)",
                self.d.total_in(),
                input.len()
            ));
        }
        Ok(self.d.total_out() as usize)
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new()
    }
}
