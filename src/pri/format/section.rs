//! Section framing: header/footer verification and body extraction.

use std::io::{ErrorKind, Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use log::trace;

use crate::pri::types::error::{PriError, Result};
use crate::pri::types::models::SectionEntry;
use crate::pri::utils;

/// Marker at the start of every section footer.
pub const SECTION_FOOTER_MAGIC: u32 = 0xDEF5_FADE;

/// Checks that the section header and footer agree with the TOC entry.
///
/// # Section Structure
/// ```text
/// [16 bytes] Identifier
/// [4 bytes]  Qualifier
/// [2 bytes]  Flags
/// [2 bytes]  Section flags
/// [4 bytes]  Section length (including header and footer)
/// [4 bytes]  Reserved (0)
/// [N bytes]  Body
/// [4 bytes]  0xDEF5FADE
/// [4 bytes]  Section length
/// ```
pub fn verify_frame<R: Read + Seek>(stream: &mut R, entry: &SectionEntry) -> Result<()> {
    stream.seek(SeekFrom::Start(entry.offset))?;

    let identifier = utils::read_identifier(stream)?;
    if identifier != entry.identifier {
        return Err(PriError::malformed(format!(
            "Section at {:#x} is '{}', but the table of contents names '{}'",
            entry.offset,
            String::from_utf8_lossy(&identifier).trim_end_matches(['\0', ' ']),
            entry.name()
        )));
    }
    let _qualifier = stream.read_u32::<LittleEndian>()?;
    let _flags = stream.read_u16::<LittleEndian>()?;
    let _section_flags = stream.read_u16::<LittleEndian>()?;
    let length = stream.read_u32::<LittleEndian>()?;
    if length != entry.length {
        return Err(PriError::malformed(format!(
            "Section '{}' declares {} bytes, table of contents says {}",
            entry.name(),
            length,
            entry.length
        )));
    }
    utils::expect_u32(stream, 0, "section header padding")?;

    stream.seek(SeekFrom::Start(
        entry.offset + entry.length as u64 - SectionEntry::FOOTER_SIZE,
    ))?;
    utils::expect_u32(stream, SECTION_FOOTER_MAGIC, "section footer marker")?;
    utils::expect_u32(stream, entry.length, "section footer length")?;

    trace!("Section '{}' at {:#x}: {} bytes", entry.name(), entry.offset, entry.length);
    Ok(())
}

/// Reads the body of a section (everything between header and footer).
pub fn read_body<R: Read + Seek>(stream: &mut R, entry: &SectionEntry) -> Result<Vec<u8>> {
    let span = entry.body_span();
    stream.seek(SeekFrom::Start(span.offset))?;
    let mut body = vec![0u8; span.length as usize];
    stream.read_exact(&mut body)?;
    Ok(body)
}

/// Runs a body parser, reporting premature end of data as a malformed section.
///
/// Section parsers read from `&[u8]` cursors, so running out of bytes
/// surfaces as `UnexpectedEof`. That is a structural problem of the section,
/// not an I/O failure.
pub fn parse_body<'a, T>(
    what: &str,
    body: &'a [u8],
    parse: impl FnOnce(&mut &'a [u8]) -> Result<T>,
) -> Result<T> {
    let mut reader = body;
    parse(&mut reader).map_err(|e| match e {
        PriError::Io(io) if io.kind() == ErrorKind::UnexpectedEof => {
            PriError::malformed(format!("Truncated {} section", what))
        }
        other => other,
    })
}
