//! instadb — контент-адресное mmap-хранилище с чанкингом, дедупликацией
//! и zlib-сжатием. Один файл проецируется в память как куча 64-байтовых
//! блоков; запись опционально реплицируется в write-зеркала, чтение
//! опционально продолжается в read-оверлеях.

// Базовые модули
pub mod config;
pub mod consts;
pub mod metrics;

// Формат и примитивы
pub mod codec;
pub mod entry;
pub mod hash;
pub mod heap; // src/heap/mod.rs
pub mod index;
pub mod util;

// High-level API (папка с mod.rs)
pub mod store; // src/store/{mod,core,open,insert,fetch,associate}.rs

// CLI
pub mod cli;

// Удобные реэкспорты
pub use config::StoreOptions;
pub use entry::EntryKind;
pub use store::{EntryStat, Store};
pub use util::{hex_encode, hex_decode_hash};
