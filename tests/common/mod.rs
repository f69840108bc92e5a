//! Writer for small PRI containers used by the integration tests.
//!
//! The layout matches what `pri_reader` parses: a descriptor, a hierarchical
//! schema, decision info, a v2 resource map and one data item section.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;

use tempfile::NamedTempFile;

pub const DESCRIPTOR: &[u8; 16] = b"[mrm_pridescex]\0";
pub const SCHEMA: &[u8; 16] = b"[mrm_hschema]  \0";
pub const DECISION_INFO: &[u8; 16] = b"[mrm_decn_info]\0";
pub const RESOURCE_MAP_V2: &[u8; 16] = b"[mrm_res_map2_]\0";
pub const DATA_ITEM: &[u8; 16] = b"[mrm_dataitem] \0";

const SCHEMA_SECTION: u16 = 1;
const DECISION_SECTION: u16 = 2;
const MAP_SECTION: u16 = 3;
const DATA_ITEM_SECTION: u16 = 4;

/// Value-type table written into every resource map: entry `i` is type `i`.
const VT_STRING: u8 = 0;
const VT_ASCII_STRING: u8 = 3;
const VT_UTF8_STRING: u8 = 4;

/// How a candidate's value is stored.
#[derive(Debug, Clone, Copy)]
pub enum Value {
    /// Inline UTF-16 string
    Utf16(&'static str),
    /// Inline ASCII string
    Ascii(&'static str),
    /// Inline UTF-8 string
    Utf8(&'static str),
    /// UTF-16 string in the data item section
    DataItem(&'static str),
    /// Inline span pointing past the end of the file
    OutOfBounds,
    /// Value in a referenced file
    External,
}

#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub language: Option<&'static str>,
    pub value: Value,
}

pub fn neutral(value: Value) -> Candidate {
    Candidate {
        language: None,
        value,
    }
}

pub fn lang(language: &'static str, value: Value) -> Candidate {
    Candidate {
        language: Some(language),
        value,
    }
}

#[derive(Debug, Clone)]
struct Resource {
    name: &'static str,
    candidates: Vec<Candidate>,
}

/// Little-endian byte sink.
#[derive(Default)]
struct Bytes(Vec<u8>);

impl Bytes {
    fn u8(&mut self, v: u8) -> &mut Self {
        self.0.push(v);
        self
    }
    fn u16(&mut self, v: u16) -> &mut Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }
    fn u32(&mut self, v: u32) -> &mut Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }
    fn raw(&mut self, v: &[u8]) -> &mut Self {
        self.0.extend_from_slice(v);
        self
    }
    fn utf16z(&mut self, s: &str) -> &mut Self {
        self.raw(&utf16z(s))
    }
    fn len(&self) -> usize {
        self.0.len()
    }
}

fn utf16z(s: &str) -> Vec<u8> {
    s.encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(u16::to_le_bytes)
        .collect()
}

fn units(s: &str) -> usize {
    s.encode_utf16().count()
}

/// Section indices written into the container. The section table itself
/// always holds the five sections in their fixed order.
#[derive(Debug, Clone, Copy)]
pub struct SectionRefs {
    /// Primary resource map in the descriptor
    pub primary_map: u16,
    /// Schema section named by the resource map
    pub map_schema: u16,
    /// Decision info section named by the resource map
    pub map_decision_info: u16,
    /// Data item section named by data item candidates
    pub data_item: u16,
}

impl Default for SectionRefs {
    fn default() -> Self {
        Self {
            primary_map: MAP_SECTION,
            map_schema: SCHEMA_SECTION,
            map_decision_info: DECISION_SECTION,
            data_item: DATA_ITEM_SECTION,
        }
    }
}

/// Number of sections every built container has.
pub const SECTION_COUNT: u16 = 5;

/// Builds a container from a list of resources.
pub struct ContainerBuilder {
    resources: Vec<Resource>,
    refs: SectionRefs,
    implicit_groups: bool,
    large_tables: bool,
    declared_item_infos: Option<u32>,
    declared_candidates: Option<u32>,
    magic: [u8; 8],
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self {
            resources: Vec::new(),
            refs: SectionRefs::default(),
            implicit_groups: false,
            large_tables: false,
            declared_item_infos: None,
            declared_candidates: None,
            magic: *b"mrm_pri2",
        }
    }

    /// Adds a resource. `name` is the full schema name, e.g. `\Resources\AppTitle`.
    pub fn resource(mut self, name: &'static str, candidates: Vec<Candidate>) -> Self {
        assert!(!candidates.is_empty(), "a resource needs at least one candidate");
        self.resources.push(Resource { name, candidates });
        self
    }

    /// Declares no primary resource map in the descriptor.
    pub fn without_primary_map(mut self) -> Self {
        self.refs.primary_map = 0xFFFF;
        self
    }

    /// Overrides section indices the descriptor and resource map point at.
    pub fn section_refs(mut self, edit: impl FnOnce(&mut SectionRefs)) -> Self {
        edit(&mut self.refs);
        self
    }

    /// Writes the item tables in the 32-bit large table block.
    pub fn large_tables(mut self) -> Self {
        self.large_tables = true;
        self
    }

    /// Declares `count` item infos in the resource map header, whatever
    /// is actually written.
    pub fn declare_item_infos(mut self, count: u32) -> Self {
        self.declared_item_infos = Some(count);
        self
    }

    /// Declares `count` candidates in the resource map header.
    pub fn declare_candidates(mut self, count: u32) -> Self {
        self.declared_candidates = Some(count);
        self
    }

    /// Writes one implicit item group per resource instead of one explicit group.
    pub fn implicit_groups(mut self) -> Self {
        self.implicit_groups = true;
        self
    }

    pub fn magic(mut self, magic: &[u8; 8]) -> Self {
        self.magic = *magic;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let (data_item_body, data_item_indices) = self.data_item_body();
        let sections: Vec<(&[u8; 16], Vec<u8>)> = vec![
            (DESCRIPTOR, self.descriptor_body()),
            (SCHEMA, self.schema_body()),
            (DECISION_INFO, self.decision_body()),
            (RESOURCE_MAP_V2, self.resource_map_body(&data_item_indices)),
            (DATA_ITEM, data_item_body),
        ];
        assemble(&self.magic, &sections)
    }

    pub fn write(&self) -> NamedTempFile {
        write_bytes(&self.build())
    }

    fn descriptor_body(&self) -> Vec<u8> {
        let mut b = Bytes::default();
        b.u16(0) // flags
            .u16(0xFFFF) // included file list
            .u16(0)
            .u16(1) // schema sections
            .u16(1) // decision info sections
            .u16(1) // resource map sections
            .u16(self.refs.primary_map)
            .u16(0) // referenced file sections
            .u16(1) // data item sections
            .u16(0)
            .u16(SCHEMA_SECTION)
            .u16(DECISION_SECTION)
            .u16(MAP_SECTION)
            .u16(DATA_ITEM_SECTION);
        b.0
    }

    fn schema_body(&self) -> Vec<u8> {
        // Scope 0 is the unnamed root; scopes are created per path prefix.
        let mut scopes: Vec<(String, usize)> = vec![(String::new(), 0)];
        let mut scope_by_path: HashMap<Vec<String>, usize> = HashMap::new();
        let mut items: Vec<(String, usize)> = Vec::new();

        for resource in &self.resources {
            let segments: Vec<String> = resource
                .name
                .split('\\')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            let (item_name, folders) = segments.split_last().expect("resource name has segments");
            let mut parent = 0;
            for depth in 0..folders.len() {
                let path = folders[..=depth].to_vec();
                parent = match scope_by_path.get(&path) {
                    Some(&scope) => scope,
                    None => {
                        scopes.push((folders[depth].clone(), parent));
                        scope_by_path.insert(path, scopes.len() - 1);
                        scopes.len() - 1
                    }
                };
            }
            items.push((item_name.clone(), parent));
        }

        let num_scopes = scopes.len();
        let num_items = items.len();

        let mut unicode_pool: Vec<u8> = Vec::new();
        let mut ascii_pool: Vec<u8> = Vec::new();
        let mut nodes = Bytes::default();

        let mut write_node = |name: &str, parent: usize, index: usize, is_scope: bool| {
            let named = !name.is_empty();
            let ascii = named && !is_scope && name.is_ascii();
            let offset = if !named {
                0
            } else if ascii {
                let offset = ascii_pool.len();
                ascii_pool.extend_from_slice(name.as_bytes());
                ascii_pool.push(0);
                offset
            } else {
                let offset = unicode_pool.len() / 2;
                unicode_pool.extend_from_slice(&utf16z(name));
                offset
            };
            let mut flags = 0u8;
            if is_scope {
                flags |= 0x10;
            }
            if ascii {
                flags |= 0x20;
            }
            let first = name.chars().next().map(|c| c.to_ascii_uppercase() as u16).unwrap_or(0);
            nodes
                .u16(parent as u16)
                .u16(if named { units(name) as u16 + 1 } else { 0 })
                .u16(first)
                .u8(units(name).min(255) as u8)
                .u8(flags)
                .u16(offset as u16)
                .u16(index as u16);
        };

        for (index, (name, parent)) in scopes.iter().enumerate() {
            write_node(name, *parent, index, true);
        }
        for (index, (name, parent)) in items.iter().enumerate() {
            write_node(name, *parent, index, false);
        }

        let unique_name = "ms-appx://test.app/";
        let name = "test.app";

        let mut b = Bytes::default();
        b.u16(1)
            .u16(units(unique_name) as u16 + 1)
            .u16(units(name) as u16 + 1)
            .u16(0)
            .u16(1) // major
            .u16(0) // minor
            .u32(0)
            .u32(0) // checksum
            .u32(num_scopes as u32)
            .u32(num_items as u32)
            .utf16z(unique_name)
            .utf16z(name)
            .u16(0)
            .u16(256) // max full path length
            .u16(0)
            .u32((num_scopes + num_items) as u32)
            .u32(num_scopes as u32)
            .u32(num_items as u32)
            .u32((unicode_pool.len() / 2) as u32)
            .u32(ascii_pool.len() as u32)
            .raw(&nodes.0);
        for scope in 0..num_scopes {
            b.u16(scope as u16).u16(0).u16(0).u16(0);
        }
        for item in 0..num_items {
            b.u16(item as u16);
        }
        b.raw(&unicode_pool).raw(&ascii_pool);
        b.0
    }

    fn languages(&self) -> Vec<&'static str> {
        let mut languages = Vec::new();
        for candidate in self.resources.iter().flat_map(|r| &r.candidates) {
            if let Some(language) = candidate.language {
                if !languages.contains(&language) {
                    languages.push(language);
                }
            }
        }
        languages
    }

    fn decision_body(&self) -> Vec<u8> {
        let languages = self.languages();

        // Qualifier k is Language = languages[k]. Qualifier set 0 is empty
        // (neutral), set k + 1 holds qualifier k.
        let mut index_table: Vec<u16> = (0..languages.len() as u16).collect();
        let mut set_ranges: Vec<(u16, u16)> = vec![(0, 0)];
        set_ranges.extend((0..languages.len() as u16).map(|k| (k, 1)));

        let mut decision_ranges = Vec::new();
        for resource in &self.resources {
            let first = index_table.len() as u16;
            for candidate in &resource.candidates {
                let set = match candidate.language {
                    None => 0,
                    Some(language) => {
                        languages.iter().position(|l| *l == language).unwrap() as u16 + 1
                    }
                };
                index_table.push(set);
            }
            decision_ranges.push((first, resource.candidates.len() as u16));
        }

        let mut pool = Vec::new();
        let mut operand_offsets = Vec::new();
        for language in &languages {
            operand_offsets.push((pool.len() / 2) as u32);
            pool.extend_from_slice(&utf16z(language));
        }

        let mut b = Bytes::default();
        b.u16(languages.len() as u16)
            .u16(languages.len() as u16)
            .u16(set_ranges.len() as u16)
            .u16(decision_ranges.len() as u16)
            .u16(index_table.len() as u16)
            .u16((pool.len() / 2) as u16);
        for &(first, count) in &decision_ranges {
            b.u16(first).u16(count);
        }
        for &(first, count) in &set_ranges {
            b.u16(first).u16(count);
        }
        for k in 0..languages.len() {
            b.u16(k as u16).u16(700).u16(0).u16(0);
        }
        for offset in &operand_offsets {
            b.u16(0).u16(0).u16(0).u16(0).u32(*offset);
        }
        for entry in &index_table {
            b.u16(*entry);
        }
        b.raw(&pool);
        b.0
    }

    /// Data item body plus the item index of every `Value::DataItem`, in
    /// candidate order.
    fn data_item_body(&self) -> (Vec<u8>, Vec<u16>) {
        let mut data = Vec::new();
        let mut entries = Vec::new();
        for candidate in self.resources.iter().flat_map(|r| &r.candidates) {
            if let Value::DataItem(text) = candidate.value {
                let bytes = utf16z(text);
                entries.push((data.len() as u16, bytes.len() as u16));
                data.extend_from_slice(&bytes);
            }
        }

        let mut b = Bytes::default();
        b.u32(0)
            .u16(entries.len() as u16)
            .u16(0)
            .u32(data.len() as u32);
        for &(offset, length) in &entries {
            b.u16(offset).u16(length);
        }
        b.raw(&data);
        (b.0, (0..entries.len() as u16).collect())
    }

    fn resource_map_body(&self, data_item_indices: &[u16]) -> Vec<u8> {
        let mut pool = Vec::new();
        let mut candidates = Bytes::default();
        let mut item_infos = Vec::new();
        let mut next_data_item = data_item_indices.iter();
        let mut candidate_count = 0u32;

        for (decision, resource) in self.resources.iter().enumerate() {
            item_infos.push((decision as u16, candidate_count as u16));
            for candidate in &resource.candidates {
                candidate_count += 1;
                if let Some((value_type, bytes)) = inline_bytes(candidate.value) {
                    candidates
                        .u8(0x00)
                        .u8(value_type)
                        .u16(bytes.len() as u16)
                        .u32(pool.len() as u32);
                    pool.extend_from_slice(&bytes);
                    continue;
                }
                match candidate.value {
                    Value::OutOfBounds => {
                        candidates.u8(0x00).u8(VT_STRING).u16(8).u32(0x00F0_0000);
                    }
                    Value::DataItem(_) => {
                        let index = *next_data_item.next().expect("data item index");
                        candidates
                            .u8(0x01)
                            .u8(VT_STRING)
                            .u16(0)
                            .u16(index)
                            .u16(self.refs.data_item);
                    }
                    Value::External => {
                        candidates.u8(0x01).u8(VT_STRING).u16(1).u16(0).u16(DATA_ITEM_SECTION);
                    }
                    Value::Utf16(_) | Value::Ascii(_) | Value::Utf8(_) => unreachable!(),
                }
            }
        }

        let num_items = self.resources.len() as u32;
        let item_infos: Vec<(u32, u32)> = item_infos
            .into_iter()
            .map(|(decision, first)| (decision as u32, first as u32))
            .collect();
        let (item_to_groups, groups): (Vec<(u32, u32)>, Vec<(u32, u32)>) = if self.implicit_groups {
            ((0..num_items).map(|i| (i, i)).collect(), Vec::new())
        } else {
            (vec![(0, 0)], vec![(num_items, 0)])
        };

        // In large mode every table moves into the 32-bit block.
        let empty: &[(u32, u32)] = &[];
        let tables: [&[(u32, u32)]; 3] = [&item_to_groups[..], &groups[..], &item_infos[..]];
        let (small, large) = if self.large_tables {
            ([empty; 3], tables)
        } else {
            (tables, [empty; 3])
        };

        let mut large_block = Bytes::default();
        if self.large_tables {
            large_block
                .u32(item_to_groups.len() as u32)
                .u32(groups.len() as u32)
                .u32(item_infos.len() as u32);
            for table in &large {
                for &(first, second) in table.iter() {
                    large_block.u32(first).u32(second);
                }
            }
        }

        let mut b = Bytes::default();
        b.u16(0) // environment references length
            .u16(0) // environment references
            .u16(self.refs.map_schema)
            .u16(0) // schema reference length
            .u16(self.refs.map_decision_info)
            .u16(7) // value type table size
            .u16(small[0].len() as u16)
            .u16(small[1].len() as u16)
            .u32(self.declared_item_infos.unwrap_or(small[2].len() as u32))
            .u32(self.declared_candidates.unwrap_or(candidate_count))
            .u32(pool.len() as u32)
            .u32(large_block.len() as u32);
        for value_type in 0..7u32 {
            b.u32(4).u32(value_type);
        }
        for table in &small {
            for &(first, second) in table.iter() {
                b.u16(first as u16).u16(second as u16);
            }
        }
        b.raw(&large_block.0).raw(&candidates.0).raw(&pool);
        b.0
    }
}

/// Value type and bytes of a value stored in the resource map string pool.
fn inline_bytes(value: Value) -> Option<(u8, Vec<u8>)> {
    let nul_terminated = |text: &str| {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        bytes
    };
    match value {
        Value::Utf16(text) => Some((VT_STRING, utf16z(text))),
        Value::Ascii(text) => Some((VT_ASCII_STRING, nul_terminated(text))),
        Value::Utf8(text) => Some((VT_UTF8_STRING, nul_terminated(text))),
        _ => None,
    }
}

/// Frames sections and lays out header, TOC, sections and footer.
pub fn assemble(magic: &[u8; 8], sections: &[(&[u8; 16], Vec<u8>)]) -> Vec<u8> {
    let framed: Vec<(&[u8; 16], Vec<u8>)> = sections
        .iter()
        .map(|(identifier, body)| (*identifier, frame(identifier, body)))
        .collect();

    let toc_offset = 32u32;
    let section_start = toc_offset + 32 * framed.len() as u32;
    let sections_len: usize = framed.iter().map(|(_, s)| s.len()).sum();
    let total = section_start + sections_len as u32 + 16;

    let mut b = Bytes::default();
    b.raw(magic)
        .u16(0)
        .u16(1)
        .u32(total)
        .u32(toc_offset)
        .u32(section_start)
        .u16(framed.len() as u16)
        .u16(0xFFFF)
        .u32(0);

    let mut relative = 0u32;
    for (identifier, framed_section) in &framed {
        b.raw(*identifier)
            .u16(0)
            .u16(0)
            .u32(0)
            .u32(relative)
            .u32(framed_section.len() as u32);
        relative += framed_section.len() as u32;
    }
    for (_, framed_section) in &framed {
        b.raw(framed_section);
    }
    b.u32(0xDEFF_FADE).u32(total).raw(magic);
    assert_eq!(b.len(), total as usize);
    b.0
}

fn frame(identifier: &[u8; 16], body: &[u8]) -> Vec<u8> {
    let length = (32 + body.len() + 8) as u32;
    let mut b = Bytes::default();
    b.raw(identifier)
        .u32(0) // qualifier
        .u16(0) // flags
        .u16(0) // section flags
        .u32(length)
        .u32(0)
        .raw(body)
        .u32(0xDEF5_FADE)
        .u32(length);
    b.0
}

pub fn write_bytes(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(bytes).expect("write container");
    file.flush().expect("flush container");
    file
}
