//! Container header, footer and table-of-contents parsing.
//!
//! This module handles:
//! - Validating the file header and footer
//! - Reading the table of contents into a section table
//! - Verifying every section frame against its TOC entry
//! - Locating the descriptor and its primary resource map

use std::io::{Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use log::{debug, info, trace};

use crate::pri::format::{descriptor, section};
use crate::pri::types::error::{PriError, Result};
use crate::pri::types::models::{
    Container, ContainerHeader, PriVersion, SectionEntry, SectionKind,
};
use crate::pri::utils;

/// Size of the fixed file header.
pub const FILE_HEADER_SIZE: u64 = 32;
/// Size of the file footer.
pub const FILE_FOOTER_SIZE: u64 = 16;
/// Size of one table-of-contents entry.
pub const TOC_ENTRY_SIZE: u64 = 32;
/// Marker at the start of the file footer.
pub const FILE_FOOTER_MAGIC: u32 = 0xDEFF_FADE;

/// Parses the container structure from a seekable byte stream.
///
/// # Header Structure
/// ```text
/// [8 bytes] Magic (mrm_pri0 / mrm_pri1 / mrm_pri2 / mrm_prif)
/// [2 bytes] Reserved (0)
/// [2 bytes] Reserved (1)
/// [4 bytes] Total file size
/// [4 bytes] TOC offset
/// [4 bytes] Section start offset
/// [2 bytes] Section count
/// [2 bytes] Reserved (0xFFFF)
/// [4 bytes] Reserved (0)
/// ```
///
/// The footer repeats `0xDEFFFADE`, the total file size and the magic.
///
/// Parsing is atomic: either every structural check passes and a
/// [`Container`] is returned, or an error is.
///
/// # Errors
/// - [`PriError::MalformedContainer`] if the header, footer, TOC or any
///   section frame is invalid, or no descriptor section exists
/// - [`PriError::MissingResourceMap`] if the descriptor declares no primary
///   resource map
pub fn parse<R: Read + Seek>(stream: &mut R) -> Result<Container> {
    info!("Parsing PRI container");

    let stream_len = stream.seek(SeekFrom::End(0))?;
    if stream_len < FILE_HEADER_SIZE + FILE_FOOTER_SIZE {
        return Err(PriError::malformed(format!(
            "File is too small to be a PRI container ({} bytes)",
            stream_len
        )));
    }
    stream.seek(SeekFrom::Start(0))?;

    // Step 1: Fixed header
    let mut magic = [0u8; 8];
    stream.read_exact(&mut magic)?;
    let version = PriVersion::try_from(&magic)?;
    utils::expect_u16(stream, 0, "header reserved field")?;
    utils::expect_u16(stream, 1, "header reserved field")?;
    let total_file_size = stream.read_u32::<LittleEndian>()?;
    let toc_offset = stream.read_u32::<LittleEndian>()?;
    let section_start_offset = stream.read_u32::<LittleEndian>()?;
    let section_count = stream.read_u16::<LittleEndian>()?;
    utils::expect_u16(stream, 0xFFFF, "header reserved field")?;
    utils::expect_u32(stream, 0, "header reserved field")?;
    trace!(
        "Header: version={}, size={}, toc={:#x}, sections at {:#x}, {} sections",
        version, total_file_size, toc_offset, section_start_offset, section_count
    );

    if total_file_size as u64 != stream_len {
        return Err(PriError::malformed(format!(
            "Header declares {} bytes but the file has {}",
            total_file_size, stream_len
        )));
    }

    // Step 2: Footer
    stream.seek(SeekFrom::Start(stream_len - FILE_FOOTER_SIZE))?;
    utils::expect_u32(stream, FILE_FOOTER_MAGIC, "file footer marker")?;
    utils::expect_u32(stream, total_file_size, "file footer size")?;
    let mut footer_magic = [0u8; 8];
    stream.read_exact(&mut footer_magic)?;
    if &footer_magic != version.magic() {
        return Err(PriError::malformed("File footer magic does not match header"));
    }

    let header = ContainerHeader {
        version,
        total_file_size,
        toc_offset,
        section_start_offset,
        section_count,
    };

    // Step 3: Table of contents
    let sections = parse_toc(stream, &header, stream_len - FILE_FOOTER_SIZE)?;

    // Step 4: Section frames
    for entry in &sections {
        section::verify_frame(stream, entry)?;
    }

    // Step 5: Descriptor
    let descriptor_entry = sections
        .iter()
        .find(|entry| entry.kind == SectionKind::Descriptor)
        .ok_or_else(|| PriError::malformed("Container has no [mrm_pridescex] section"))?;
    let descriptor_body = section::read_body(stream, descriptor_entry)?;
    let descriptor = descriptor::parse(&descriptor_body)?;

    if let Some(bad) = descriptor
        .all_refs()
        .find(|r| r.0 as usize >= sections.len())
    {
        return Err(PriError::malformed(format!(
            "Descriptor references section {} but only {} sections exist",
            bad,
            sections.len()
        )));
    }

    if descriptor.primary_resource_map.is_none() {
        return Err(PriError::MissingResourceMap);
    }

    info!(
        "Container parsed: version={}, {} sections",
        version,
        sections.len()
    );

    Ok(Container {
        header,
        sections,
        descriptor,
    })
}

/// Reads the table of contents and checks every section extent.
fn parse_toc<R: Read + Seek>(
    stream: &mut R,
    header: &ContainerHeader,
    content_end: u64,
) -> Result<Vec<SectionEntry>> {
    let toc_start = header.toc_offset as u64;
    let toc_end = toc_start + header.section_count as u64 * TOC_ENTRY_SIZE;
    if toc_start < FILE_HEADER_SIZE || toc_end > content_end {
        return Err(PriError::malformed(format!(
            "Table of contents [{:#x}..{:#x}] lies outside the file body",
            toc_start, toc_end
        )));
    }

    stream.seek(SeekFrom::Start(toc_start))?;
    let mut sections = Vec::with_capacity(header.section_count as usize);
    for index in 0..header.section_count {
        let identifier = utils::read_identifier(stream)?;
        let flags = stream.read_u16::<LittleEndian>()?;
        let section_flags = stream.read_u16::<LittleEndian>()?;
        let qualifier = stream.read_u32::<LittleEndian>()?;
        let relative_offset = stream.read_u32::<LittleEndian>()?;
        let length = stream.read_u32::<LittleEndian>()?;

        let entry = SectionEntry {
            identifier,
            kind: SectionKind::from_identifier(&identifier),
            qualifier,
            flags,
            section_flags,
            offset: header.section_start_offset as u64 + relative_offset as u64,
            length,
        };

        let frame_size = SectionEntry::HEADER_SIZE + SectionEntry::FOOTER_SIZE;
        if (length as u64) < frame_size || entry.offset + length as u64 > content_end {
            return Err(PriError::malformed(format!(
                "Section {} ('{}') extent [{:#x}, +{}] is invalid",
                index,
                entry.name(),
                entry.offset,
                length
            )));
        }

        debug!(
            "Section {}: '{}' ({}) at {:#x}, {} bytes",
            index,
            entry.name(),
            entry.kind,
            entry.offset,
            length
        );
        sections.push(entry);
    }
    Ok(sections)
}
