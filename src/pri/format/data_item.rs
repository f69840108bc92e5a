//! `[mrm_dataitem]` section: out-of-line candidate values.

use byteorder::{LittleEndian, ReadBytesExt};
use log::debug;

use crate::pri::format::section;
use crate::pri::types::error::{PriError, Result};
use crate::pri::types::models::ByteSpan;
use crate::pri::utils;

/// Byte spans of every value stored in one data item section.
#[derive(Debug, Clone, Default)]
pub struct DataItemSection {
    items: Vec<ByteSpan>,
}

impl DataItemSection {
    /// Absolute span of item `index`. Strings come first, then blobs.
    pub fn item(&self, index: usize) -> Result<ByteSpan> {
        self.items.get(index).copied().ok_or_else(|| {
            PriError::malformed(format!(
                "Data item {} out of range ({} items)",
                index,
                self.items.len()
            ))
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Parses a data item section body.
///
/// # Body Structure
/// ```text
/// [4 bytes] Reserved (0)
/// [2 bytes] String count
/// [2 bytes] Blob count
/// [4 bytes] Total data length
/// [4 bytes each] Strings: offset (u16), length (u16)
/// [8 bytes each] Blobs: offset (u32), length (u32)
/// [N bytes] Data
/// ```
///
/// Offsets are relative to the start of the data block; the returned spans
/// are absolute, based on `body_offset`. Spans are not checked here: a bad
/// entry only affects the candidate that uses it.
pub fn parse(body: &[u8], body_offset: u64) -> Result<DataItemSection> {
    section::parse_body("data item", body, |reader| {
        utils::expect_u32(reader, 0, "data item header")?;
        let num_strings = reader.read_u16::<LittleEndian>()? as usize;
        let num_blobs = reader.read_u16::<LittleEndian>()? as usize;
        let total_data_len = reader.read_u32::<LittleEndian>()?;

        let mut relative = Vec::with_capacity(num_strings + num_blobs);
        for _ in 0..num_strings {
            let offset = reader.read_u16::<LittleEndian>()? as u64;
            let length = reader.read_u16::<LittleEndian>()? as u64;
            relative.push((offset, length));
        }
        for _ in 0..num_blobs {
            let offset = reader.read_u32::<LittleEndian>()? as u64;
            let length = reader.read_u32::<LittleEndian>()? as u64;
            relative.push((offset, length));
        }

        let data_start = body_offset + (body.len() - reader.len()) as u64;
        let items = relative
            .into_iter()
            .map(|(offset, length)| ByteSpan::new(data_start + offset, length))
            .collect();

        debug!(
            "Data items: {} strings, {} blobs, {} bytes",
            num_strings, num_blobs, total_data_len
        );
        Ok(DataItemSection { items })
    })
}
