use anyhow::{anyhow, Result};

use crate::consts::{HASH_LEN, HEX_HASH_LEN};

/// Lowercase hex of a byte slice.
pub fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(HEX[(b >> 4) as usize] as char);
        out.push(HEX[(b & 0x0f) as usize] as char);
    }
    out
}

/// Декодировать 64-символьный hex-хэш (регистронезависимо) в 32 байта.
pub fn hex_decode_hash(s: &str) -> Result<[u8; HASH_LEN]> {
    let bytes = s.as_bytes();
    if bytes.len() != HEX_HASH_LEN {
        return Err(anyhow!(
            "hash must be {} hex chars, got {}",
            HEX_HASH_LEN,
            bytes.len()
        ));
    }
    let mut out = [0u8; HASH_LEN];
    for i in 0..HASH_LEN {
        let hi = hex_nibble(bytes[i * 2])?;
        let lo = hex_nibble(bytes[i * 2 + 1])?;
        out[i] = (hi << 4) | lo;
    }
    Ok(out)
}

#[inline]
fn hex_nibble(c: u8) -> Result<u8> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(anyhow!("invalid hex digit {:?}", c as char)),
    }
}

/// Печатное представление буфера для CLI: текст как есть, бинарное — пометкой.
pub fn display_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => format!("(binary {} B)", bytes.len()),
    }
}
