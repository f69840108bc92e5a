//! Core data structures for the resource container.
//!
//! This module defines the fundamental types used throughout the library:
//! - File header, section table and section references
//! - Qualifiers and qualifier sets
//! - Resource map items, candidate sets and candidates

use std::fmt;

use super::error::{PriError, Result};

/// Format revision, taken from the 8-byte magic at the start and end of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriVersion {
    /// `mrm_pri0`
    V0,
    /// `mrm_pri1`
    V1,
    /// `mrm_pri2`
    V2,
    /// `mrm_prif`
    VF,
}

impl PriVersion {
    pub fn magic(&self) -> &'static [u8; 8] {
        match self {
            PriVersion::V0 => b"mrm_pri0",
            PriVersion::V1 => b"mrm_pri1",
            PriVersion::V2 => b"mrm_pri2",
            PriVersion::VF => b"mrm_prif",
        }
    }
}

impl TryFrom<&[u8; 8]> for PriVersion {
    type Error = PriError;
    fn try_from(magic: &[u8; 8]) -> Result<Self> {
        match magic {
            b"mrm_pri0" => Ok(Self::V0),
            b"mrm_pri1" => Ok(Self::V1),
            b"mrm_pri2" => Ok(Self::V2),
            b"mrm_prif" => Ok(Self::VF),
            _ => Err(PriError::malformed(format!(
                "Data does not start with a PRI file header (magic {:02x?})",
                magic
            ))),
        }
    }
}

impl fmt::Display for PriVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.magic()))
    }
}

/// Fixed fields of the file header.
#[derive(Debug, Clone, Copy)]
pub struct ContainerHeader {
    pub version: PriVersion,
    pub total_file_size: u32,
    pub toc_offset: u32,
    pub section_start_offset: u32,
    pub section_count: u16,
}

/// Section kinds, identified by the 16-byte identifier in the TOC and section header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Descriptor,
    HierarchicalSchema,
    HierarchicalSchemaEx,
    DecisionInfo,
    ResourceMap,
    ResourceMap2,
    DataItem,
    Unknown,
}

impl SectionKind {
    pub fn from_identifier(identifier: &[u8; 16]) -> Self {
        match identifier {
            b"[mrm_pridescex]\0" => Self::Descriptor,
            b"[mrm_hschema]  \0" => Self::HierarchicalSchema,
            b"[mrm_hschemaex] " => Self::HierarchicalSchemaEx,
            b"[mrm_decn_info]\0" => Self::DecisionInfo,
            b"[mrm_res_map__]\0" => Self::ResourceMap,
            b"[mrm_res_map2_]\0" => Self::ResourceMap2,
            b"[mrm_dataitem] \0" => Self::DataItem,
            _ => Self::Unknown,
        }
    }

    pub fn is_schema(&self) -> bool {
        matches!(self, Self::HierarchicalSchema | Self::HierarchicalSchemaEx)
    }

    pub fn is_resource_map(&self) -> bool {
        matches!(self, Self::ResourceMap | Self::ResourceMap2)
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            SectionKind::Descriptor => "descriptor",
            SectionKind::HierarchicalSchema | SectionKind::HierarchicalSchemaEx => "hierarchical schema",
            SectionKind::DecisionInfo => "decision info",
            SectionKind::ResourceMap | SectionKind::ResourceMap2 => "resource map",
            SectionKind::DataItem => "data item",
            SectionKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// An index into the container's section table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectionRef(pub u16);

impl fmt::Display for SectionRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An `{offset, length}` range of the container's byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteSpan {
    /// Absolute offset from the start of the file.
    pub offset: u64,
    pub length: u64,
}

impl ByteSpan {
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// Exclusive end offset, or `None` on overflow.
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.length)
    }
}

/// One entry of the section table.
#[derive(Debug, Clone)]
pub struct SectionEntry {
    pub identifier: [u8; 16],
    pub kind: SectionKind,
    pub qualifier: u32,
    pub flags: u16,
    pub section_flags: u16,
    /// Absolute offset of the section header.
    pub offset: u64,
    /// Length including the 32-byte header and 8-byte footer.
    pub length: u32,
}

impl SectionEntry {
    pub const HEADER_SIZE: u64 = 32;
    pub const FOOTER_SIZE: u64 = 8;

    /// The section content between header and footer.
    pub fn body_span(&self) -> ByteSpan {
        ByteSpan::new(
            self.offset + Self::HEADER_SIZE,
            (self.length as u64).saturating_sub(Self::HEADER_SIZE + Self::FOOTER_SIZE),
        )
    }

    /// Printable identifier with trailing padding removed.
    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.identifier)
            .trim_end_matches(['\0', ' '])
            .to_string()
    }
}

/// Parsed `[mrm_pridescex]` section: which sections play which role.
#[derive(Debug, Clone, Default)]
pub struct Descriptor {
    pub flags: u16,
    pub schema_sections: Vec<SectionRef>,
    pub decision_info_sections: Vec<SectionRef>,
    pub resource_map_sections: Vec<SectionRef>,
    pub primary_resource_map: Option<SectionRef>,
    pub referenced_file_sections: Vec<SectionRef>,
    pub data_item_sections: Vec<SectionRef>,
}

/// The parsed container structure: header, section table and descriptor.
#[derive(Debug)]
pub struct Container {
    pub header: ContainerHeader,
    pub sections: Vec<SectionEntry>,
    pub descriptor: Descriptor,
}

impl Container {
    /// Resolves a section reference, failing if it exceeds the section table.
    pub fn section(&self, section: SectionRef) -> Result<&SectionEntry> {
        self.sections.get(section.0 as usize).ok_or_else(|| {
            PriError::malformed(format!(
                "Section reference {} exceeds section table of {} entries",
                section,
                self.sections.len()
            ))
        })
    }

    /// Resolves a section reference and checks the section kind.
    pub fn expect_section(
        &self,
        section: SectionRef,
        accept: impl Fn(SectionKind) -> bool,
        expected: &'static str,
    ) -> Result<&SectionEntry> {
        let entry = self.section(section)?;
        if !accept(entry.kind) {
            return Err(PriError::malformed(format!(
                "Section {} is '{}', expected a {} section",
                section,
                entry.name(),
                expected
            )));
        }
        Ok(entry)
    }
}

/// Qualifier types understood by the resource system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualifierType {
    Language,
    Contrast,
    Scale,
    HomeRegion,
    TargetSize,
    LayoutDirection,
    Theme,
    AlternateForm,
    DXFeatureLevel,
    Configuration,
    DeviceFamily,
    Custom,
    Other(u16),
}

impl From<u16> for QualifierType {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::Language,
            1 => Self::Contrast,
            2 => Self::Scale,
            3 => Self::HomeRegion,
            4 => Self::TargetSize,
            5 => Self::LayoutDirection,
            6 => Self::Theme,
            7 => Self::AlternateForm,
            8 => Self::DXFeatureLevel,
            9 => Self::Configuration,
            10 => Self::DeviceFamily,
            11 => Self::Custom,
            other => Self::Other(other),
        }
    }
}

/// A named constraint attached to a candidate, e.g. `Language = en-US`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Qualifier {
    pub qualifier_type: QualifierType,
    pub value: String,
    pub priority: u16,
    /// Fallback score in thousandths.
    pub fallback_score: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QualifierSet {
    pub qualifiers: Vec<Qualifier>,
}

impl QualifierSet {
    /// The first Language qualifier, if any.
    pub fn language(&self) -> Option<&Qualifier> {
        self.qualifiers
            .iter()
            .find(|q| q.qualifier_type == QualifierType::Language)
    }
}

/// Declared type of a candidate value. Decides the text encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceValueType {
    String,
    Path,
    EmbeddedData,
    AsciiString,
    Utf8String,
    AsciiPath,
    Utf8Path,
    Other(u32),
}

impl From<u32> for ResourceValueType {
    fn from(value: u32) -> Self {
        match value {
            0 => Self::String,
            1 => Self::Path,
            2 => Self::EmbeddedData,
            3 => Self::AsciiString,
            4 => Self::Utf8String,
            5 => Self::AsciiPath,
            6 => Self::Utf8Path,
            other => Self::Other(other),
        }
    }
}

/// Reference to one entry of a `[mrm_dataitem]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataItemRef {
    pub section: SectionRef,
    pub index: u16,
}

/// Where a candidate's bytes live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateData {
    /// Stored in the resource map's own string pool.
    Inline(ByteSpan),
    /// Stored in a data item section.
    DataItem(DataItemRef),
    /// Stored in a file outside the container; never decoded.
    External { source_file: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub qualifiers: QualifierSet,
    pub value_type: ResourceValueType,
    pub data: CandidateData,
}

/// All candidates for one resource, in file order. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSet {
    pub decision: u16,
    pub candidates: Vec<Candidate>,
}

impl CandidateSet {
    pub fn iter(&self) -> std::slice::Iter<'_, Candidate> {
        self.candidates.iter()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// A named resource from the primary resource map.
#[derive(Debug, Clone)]
pub struct ResourceMapItem {
    /// Index in the hierarchical schema.
    pub index: usize,
    /// Full name as stored, e.g. `\Resources\AppTitle`.
    pub name: String,
    pub candidates: CandidateSet,
}
