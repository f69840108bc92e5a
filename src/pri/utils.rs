//! Low-level byte reading utilities

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};
use encoding_rs::WINDOWS_1252;

use super::types::error::{PriError, Result};

/// Read a 16-byte section identifier.
pub fn read_identifier(reader: &mut impl Read) -> Result<[u8; 16]> {
    let mut identifier = [0u8; 16];
    reader.read_exact(&mut identifier)?;
    Ok(identifier)
}

/// Read a little-endian u16 and fail unless it equals `expected`.
pub fn expect_u16(reader: &mut impl Read, expected: u16, field: &str) -> Result<()> {
    let actual = reader.read_u16::<LittleEndian>()?;
    if actual != expected {
        return Err(PriError::malformed(format!(
            "Unexpected {}: expected {:#06x}, found {:#06x}",
            field, expected, actual
        )));
    }
    Ok(())
}

/// Read a little-endian u32 and fail unless it equals `expected`.
pub fn expect_u32(reader: &mut impl Read, expected: u32, field: &str) -> Result<()> {
    let actual = reader.read_u32::<LittleEndian>()?;
    if actual != expected {
        return Err(PriError::malformed(format!(
            "Unexpected {}: expected {:#010x}, found {:#010x}",
            field, expected, actual
        )));
    }
    Ok(())
}

/// Split off the next `len` bytes of a slice and advance it.
pub fn take<'a>(reader: &mut &'a [u8], len: usize, field: &str) -> Result<&'a [u8]> {
    if reader.len() < len {
        return Err(PriError::malformed(format!(
            "Truncated {}: need {} bytes, {} remain",
            field,
            len,
            reader.len()
        )));
    }
    let (head, tail) = reader.split_at(len);
    *reader = tail;
    Ok(head)
}

/// Fail unless `count` entries of `entry_size` bytes fit in what is left of
/// `reader`. Run before sizing any table from a count read out of the file.
pub fn expect_entries(reader: &[u8], count: usize, entry_size: usize, field: &str) -> Result<usize> {
    match count.checked_mul(entry_size) {
        Some(len) if len <= reader.len() => Ok(count),
        _ => Err(PriError::malformed(format!(
            "Truncated {}: {} entries of {} bytes declared, {} bytes remain",
            field,
            count,
            entry_size,
            reader.len()
        ))),
    }
}

/// Read a NUL-terminated UTF-16LE string and advance past the terminator.
pub fn read_utf16z(reader: &mut &[u8]) -> Result<String> {
    let mut units = Vec::new();
    loop {
        let unit = reader.read_u16::<LittleEndian>()?;
        if unit == 0 {
            break;
        }
        units.push(unit);
    }
    Ok(String::from_utf16_lossy(&units))
}

/// Read a NUL-terminated UTF-16LE string starting at a u16-unit offset into `pool`.
pub fn utf16z_at(pool: &[u8], unit_offset: usize) -> Result<String> {
    let start = unit_offset
        .checked_mul(2)
        .filter(|&start| start <= pool.len())
        .ok_or_else(|| {
            PriError::malformed(format!(
                "String offset {} is outside a pool of {} bytes",
                unit_offset,
                pool.len()
            ))
        })?;
    let mut reader = &pool[start..];
    read_utf16z(&mut reader)
        .map_err(|_| PriError::malformed(format!("Missing null terminator for string at unit {}", unit_offset)))
}

/// Read a NUL-terminated 8-bit string starting at a byte offset into `pool`.
pub fn asciiz_at(pool: &[u8], offset: usize) -> Result<String> {
    let tail = pool.get(offset..).ok_or_else(|| {
        PriError::malformed(format!(
            "String offset {} is outside a pool of {} bytes",
            offset,
            pool.len()
        ))
    })?;
    let end = tail
        .iter()
        .position(|&byte| byte == 0)
        .ok_or_else(|| PriError::malformed(format!("Missing null terminator for string at byte {}", offset)))?;
    Ok(WINDOWS_1252.decode_without_bom_handling(&tail[..end]).0.into_owned())
}

/// ASCII case-insensitive prefix test.
pub fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len()
        && text.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}
