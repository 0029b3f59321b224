use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;

use crate::config::StoreOptions;
use crate::store::Store;
use crate::util::{display_text, hex_encode};

#[derive(Parser, Debug)]
#[command(
    name = "instadb",
    version,
    about = "Content-addressed mmap KV store with dedup and zlib compression",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Создать (или дорастить) кучу и проинициализировать заголовок.
    Init {
        #[arg(long)]
        path: PathBuf,
        /// Размер кучи в байтах (кратен 64, минимум 1024).
        #[arg(long, default_value_t = 1 << 20)]
        size: u64,
    },
    /// Показать заголовок кучи.
    Status {
        #[arg(long)]
        path: PathBuf,
    },
    /// Сохранить буфер; напечатать его hex-хэш.
    Store {
        #[arg(long)]
        path: PathBuf,
        #[arg(long, default_value_t = 1 << 20)]
        size: u64,
        /// Данные строкой (либо --file).
        #[arg(long, conflicts_with = "file")]
        data: Option<String>,
        /// Прочитать данные из файла.
        #[arg(long)]
        file: Option<PathBuf>,
        /// Write-зеркала (можно повторять).
        #[arg(long = "copy")]
        copies: Vec<PathBuf>,
    },
    /// Извлечь запись по hex-хэшу.
    Fetch {
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        hash: String,
        /// Вернуть сжатую wire-форму вместо распакованных байт.
        #[arg(long, default_value_t = false)]
        raw: bool,
        /// Перейти по ассоциации (val) и вернуть value-запись.
        #[arg(long, default_value_t = false)]
        dereference: bool,
        /// Read-оверлеи (можно повторять).
        #[arg(long = "rocopy")]
        rocopies: Vec<PathBuf>,
        /// Записать результат в файл вместо stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Описание записи (вид, размеры, чанки) без извлечения payload.
    Entry {
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        hash: String,
    },
    /// Связать ключ со значением (fetch --dereference вернёт значение).
    Associate {
        #[arg(long)]
        path: PathBuf,
        #[arg(long, default_value_t = 1 << 20)]
        size: u64,
        #[arg(long)]
        key: String,
        #[arg(long)]
        value: String,
        #[arg(long = "copy")]
        copies: Vec<PathBuf>,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Init { path, size } => {
            let store = Store::open(&StoreOptions::new(&path, size))?;
            println!(
                "initialized {}: {} blocks ({} used, index {})",
                path.display(),
                store.size_blocks(),
                store.used_blocks(),
                store.index_len()
            );
            Ok(())
        }
        Cmd::Status { path } => {
            let store = Store::open_ro(&StoreOptions::new(&path, 0))?;
            println!("path:          {}", path.display());
            println!("size (blocks): {}", store.size_blocks());
            println!("used (blocks): {}", store.used_blocks());
            println!("header blocks: {}", store.header_blocks());
            println!("index heads:   {}", store.index_len());
            Ok(())
        }
        Cmd::Store {
            path,
            size,
            data,
            file,
            copies,
        } => {
            let payload = match (data, file) {
                (Some(s), None) => s.into_bytes(),
                (None, Some(f)) => std::fs::read(&f)?,
                _ => return Err(anyhow!("provide exactly one of --data or --file")),
            };
            let opts = StoreOptions::new(&path, size).with_copies(copies);
            let mut store = Store::open(&opts)?;
            match store.store(&payload)? {
                Some(hex) => {
                    println!("{}", hex);
                    Ok(())
                }
                None => Err(anyhow!("refusing to store an empty buffer")),
            }
        }
        Cmd::Fetch {
            path,
            hash,
            raw,
            dereference,
            rocopies,
            out,
        } => {
            let opts = StoreOptions::new(&path, 0).with_rocopies(rocopies);
            let store = Store::open_ro(&opts)?;
            match store.fetch(&hash, !raw, dereference)? {
                Some(bytes) => {
                    if let Some(out_path) = out {
                        std::fs::write(&out_path, &bytes)?;
                        println!("{} bytes -> {}", bytes.len(), out_path.display());
                    } else if raw {
                        std::io::stdout().write_all(&bytes)?;
                    } else {
                        println!("{}", display_text(&bytes));
                    }
                    Ok(())
                }
                None => Err(anyhow!("hash not found: {}", hash)),
            }
        }
        Cmd::Entry { path, hash } => {
            let store = Store::open_ro(&StoreOptions::new(&path, 0))?;
            match store.stat(&hash)? {
                Some(stat) => {
                    println!("bucket:       {}", stat.bucket);
                    println!("kind:         {}", stat.kind);
                    println!("compressed:   {} B", stat.compressed_size);
                    println!("uncompressed: {} B", stat.uncompressed_len);
                    println!("value bucket: {}", stat.value_bucket);
                    if let Some(n) = stat.chunk_count {
                        println!("chunks:       {}", n);
                    }
                    if let Some(len) = stat.data_length {
                        println!("data length:  {} B", len);
                    }
                    Ok(())
                }
                None => Err(anyhow!("hash not found: {}", hash)),
            }
        }
        Cmd::Associate {
            path,
            size,
            key,
            value,
            copies,
        } => {
            let opts = StoreOptions::new(&path, size).with_copies(copies);
            let mut store = Store::open(&opts)?;
            if !store.associate(key.as_bytes(), value.as_bytes())? {
                return Err(anyhow!("association failed: empty key"));
            }
            let key_hex = hex_encode(&crate::hash::content_hash(key.as_bytes()));
            println!("{}", key_hex);
            Ok(())
        }
    }
}
