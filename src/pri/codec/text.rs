//! Text decoding for candidate values.
//!
//! The declared [`ResourceValueType`] selects the encoding:
//! - `AsciiString`, `AsciiPath`: 8-bit ASCII, read as windows-1252
//! - `Utf8String`, `Utf8Path`: UTF-8
//! - everything else: UTF-16LE
//!
//! Trailing null terminators are stripped after decoding.

use encoding_rs::{Encoding, UTF_16LE, UTF_8, WINDOWS_1252};

use crate::pri::types::models::ResourceValueType;

/// Text encodings a candidate value can be stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Ascii,
    Utf8,
    Utf16,
}

impl TextEncoding {
    pub fn for_value_type(value_type: ResourceValueType) -> Self {
        match value_type {
            ResourceValueType::AsciiString | ResourceValueType::AsciiPath => Self::Ascii,
            ResourceValueType::Utf8String | ResourceValueType::Utf8Path => Self::Utf8,
            _ => Self::Utf16,
        }
    }

    pub fn encoding(&self) -> &'static Encoding {
        match self {
            Self::Ascii => WINDOWS_1252,
            Self::Utf8 => UTF_8,
            Self::Utf16 => UTF_16LE,
        }
    }
}

/// Decodes raw candidate bytes into text according to the value type.
///
/// Decoding is lossy: invalid UTF-8 or UTF-16 sequences become U+FFFD. Bytes
/// above 0x7F in ASCII values take their windows-1252 meaning. A byte order
/// mark is kept as data.
pub fn decode(bytes: &[u8], value_type: ResourceValueType) -> String {
    let encoding = TextEncoding::for_value_type(value_type).encoding();
    let (text, _) = encoding.decode_without_bom_handling(bytes);
    text.trim_end_matches('\0').to_string()
}
