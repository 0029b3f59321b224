//! store — high-level API хранилища (четыре операции хоста + интроспекция).
//!
//! Разделение по подмодулям:
//! - core.rs      — структура Store, интроспекция (stat/EntryStat), Drop
//! - open.rs      — открытие: первичная куча, write-зеркала, read-оверлеи
//! - insert.rs    — writer: insert_entry/insert_chunk/insert_buffer, store()
//! - fetch.rs     — reader: обход оверлеев, пересборка массивов, recompress
//! - associate.rs — связка key-запись -> value-запись через поле val

pub mod associate;
pub mod core;
pub mod fetch;
pub mod insert;
pub mod open;

pub use core::{EntryStat, Store};
