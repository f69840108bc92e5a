//! `[mrm_res_map__]` / `[mrm_res_map2_]` sections: candidate sets per item.
//!
//! The resource map ties together three other sections: the hierarchical
//! schema (item names), the decision info (qualifier sets per candidate) and
//! any number of data item sections (out-of-line values).
//!
//! Maps with more than 65535 item infos or groups continue their item
//! tables in a block of 32-bit entries after the regular tables:
//!
//! ```text
//! [4 bytes] Item-to-group count
//! [4 bytes] Group count
//! [4 bytes] Item info count
//! [8 bytes each] Item-to-group: first item, group
//! [8 bytes each] Groups: size, first item info
//! [8 bytes each] Item infos: decision, first candidate
//! ```
//!
//! Its entries are appended to the regular tables, so indices run across both.

use byteorder::{LittleEndian, ReadBytesExt};
use log::{debug, trace};

use crate::pri::format::decision::DecisionInfo;
use crate::pri::format::schema::HierarchicalSchema;
use crate::pri::format::section;
use crate::pri::types::error::{PriError, Result};
use crate::pri::types::models::{
    ByteSpan, Candidate, CandidateData, CandidateSet, DataItemRef, QualifierSet,
    ResourceMapItem, ResourceValueType, SectionRef,
};
use crate::pri::utils;

const CANDIDATE_INLINE: u8 = 0x00;
const CANDIDATE_INDIRECT: u8 = 0x01;

/// A candidate record before it is paired with its qualifier set.
#[derive(Debug, Clone, Copy)]
enum RawCandidate {
    Inline {
        value_type: ResourceValueType,
        length: u16,
        offset: u32,
    },
    Indirect {
        value_type: ResourceValueType,
        source_file: u16,
        index: u16,
        section: u16,
    },
}

/// Reads the schema and decision info section references from the fixed
/// part of a resource map body, so they can be loaded before the full parse.
pub fn section_refs(body: &[u8]) -> Result<(SectionRef, SectionRef)> {
    section::parse_body("resource map", body, |reader| {
        let _environment_refs_len = reader.read_u16::<LittleEndian>()?;
        let _environment_refs = reader.read_u16::<LittleEndian>()?;
        let schema = SectionRef(reader.read_u16::<LittleEndian>()?);
        let _schema_ref_len = reader.read_u16::<LittleEndian>()?;
        let decision_info = SectionRef(reader.read_u16::<LittleEndian>()?);
        Ok((schema, decision_info))
    })
}

/// Parses a resource map body into named items with their candidate sets.
///
/// # Parameters
/// * `body` - Section body bytes
/// * `body_offset` - Absolute file offset of `body`, used to turn inline
///   string offsets into file-level [`ByteSpan`]s
/// * `version2` - `true` for `[mrm_res_map2_]`
/// * `schema` - The schema section the map references
/// * `decisions` - The decision info section the map references
pub fn parse(
    body: &[u8],
    body_offset: u64,
    version2: bool,
    schema: &HierarchicalSchema,
    decisions: &DecisionInfo,
) -> Result<Vec<ResourceMapItem>> {
    section::parse_body("resource map", body, |reader| {
        let environment_refs_len = reader.read_u16::<LittleEndian>()? as usize;
        let num_environment_refs = reader.read_u16::<LittleEndian>()?;
        if version2 != (environment_refs_len == 0 && num_environment_refs == 0) {
            return Err(PriError::malformed(format!(
                "Resource map v{} has inconsistent environment references ({} bytes, {} entries)",
                if version2 { 2 } else { 1 },
                environment_refs_len,
                num_environment_refs
            )));
        }
        let _schema = reader.read_u16::<LittleEndian>()?;
        let schema_ref_len = reader.read_u16::<LittleEndian>()? as usize;
        let _decision_info = reader.read_u16::<LittleEndian>()?;
        let value_type_count = reader.read_u16::<LittleEndian>()? as usize;
        let item_to_group_count = reader.read_u16::<LittleEndian>()? as usize;
        let group_count = reader.read_u16::<LittleEndian>()? as usize;
        let item_info_count = reader.read_u32::<LittleEndian>()? as usize;
        let candidate_count = reader.read_u32::<LittleEndian>()? as usize;
        let _data_len = reader.read_u32::<LittleEndian>()?;
        let large_table_len = reader.read_u32::<LittleEndian>()? as usize;

        utils::take(reader, environment_refs_len, "environment references")?;
        utils::take(reader, schema_ref_len, "schema reference")?;

        utils::expect_entries(reader, value_type_count, 8, "value type table")?;
        let mut value_types = Vec::with_capacity(value_type_count);
        for _ in 0..value_type_count {
            utils::expect_u32(reader, 4, "value type entry")?;
            value_types.push(ResourceValueType::from(reader.read_u32::<LittleEndian>()?));
        }

        let mut item_to_groups = read_u16_pairs(reader, item_to_group_count, "item-to-group table")?;
        let mut groups = read_u16_pairs(reader, group_count, "item group table")?;
        let mut item_infos = read_u16_pairs(reader, item_info_count, "item info table")?;

        let mut large_tables = utils::take(reader, large_table_len, "large item tables")?;
        if !large_tables.is_empty() {
            let reader = &mut large_tables;
            let large_item_to_group_count = reader.read_u32::<LittleEndian>()? as usize;
            let large_group_count = reader.read_u32::<LittleEndian>()? as usize;
            let large_item_info_count = reader.read_u32::<LittleEndian>()? as usize;
            item_to_groups.extend(read_u32_pairs(
                reader,
                large_item_to_group_count,
                "large item-to-group table",
            )?);
            groups.extend(read_u32_pairs(reader, large_group_count, "large item group table")?);
            item_infos.extend(read_u32_pairs(reader, large_item_info_count, "large item info table")?);
            debug!(
                "Large item tables: {} item-to-group entries, {} groups, {} item infos",
                large_item_to_group_count, large_group_count, large_item_info_count
            );
        }

        // Every candidate record is eight bytes, inline or indirect.
        utils::expect_entries(reader, candidate_count, 8, "candidate table")?;
        let mut raw_candidates = Vec::with_capacity(candidate_count);
        for _ in 0..candidate_count {
            raw_candidates.push(read_candidate(reader, &value_types)?);
        }

        let string_pool_start = body_offset + (body.len() - reader.len()) as u64;

        let mut items = Vec::new();
        for &(first_item, group_index) in &item_to_groups {
            // Group indices past the group tables denote an implicit group of
            // one item info.
            let (size, first_info) = match groups.get(group_index) {
                Some(&group) => group,
                None => (1, group_index - groups.len()),
            };

            for info_index in first_info..first_info + size {
                let &(decision_index, first_candidate) = item_infos.get(info_index).ok_or_else(|| {
                    PriError::malformed(format!("Item info {} out of range", info_index))
                })?;
                let qualifier_sets = decisions.decision(decision_index).ok_or_else(|| {
                    PriError::malformed(format!("Decision {} out of range", decision_index))
                })?;
                if qualifier_sets.is_empty() {
                    return Err(PriError::malformed(format!(
                        "Decision {} has no qualifier sets",
                        decision_index
                    )));
                }

                let mut candidates = Vec::with_capacity(qualifier_sets.len());
                for (offset, &set_index) in qualifier_sets.iter().enumerate() {
                    let raw = raw_candidates.get(first_candidate + offset).ok_or_else(|| {
                        PriError::malformed(format!(
                            "Candidate {} out of range",
                            first_candidate + offset
                        ))
                    })?;
                    let qualifiers = decisions
                        .qualifier_set(set_index)
                        .cloned()
                        .ok_or_else(|| {
                            PriError::malformed(format!("Qualifier set {} out of range", set_index))
                        })?;
                    candidates.push(into_candidate(*raw, qualifiers, string_pool_start));
                }

                let item_index = first_item + (info_index - first_info);
                let name = schema.item_name(item_index).ok_or_else(|| {
                    PriError::malformed(format!(
                        "Resource map item {} exceeds schema of {} items",
                        item_index,
                        schema.num_items()
                    ))
                })?;
                trace!("Item {} '{}': {} candidates", item_index, name, candidates.len());

                items.push(ResourceMapItem {
                    index: item_index,
                    name: name.to_string(),
                    candidates: CandidateSet {
                        decision: decision_index as u16,
                        candidates,
                    },
                });
            }
        }

        debug!(
            "Resource map: {} items, {} candidates, {} value types",
            items.len(),
            raw_candidates.len(),
            value_types.len()
        );
        Ok(items)
    })
}

fn read_u16_pairs(reader: &mut &[u8], count: usize, field: &str) -> Result<Vec<(usize, usize)>> {
    utils::expect_entries(reader, count, 4, field)?;
    let mut pairs = Vec::with_capacity(count);
    for _ in 0..count {
        let first = reader.read_u16::<LittleEndian>()? as usize;
        let second = reader.read_u16::<LittleEndian>()? as usize;
        pairs.push((first, second));
    }
    Ok(pairs)
}

fn read_u32_pairs(reader: &mut &[u8], count: usize, field: &str) -> Result<Vec<(usize, usize)>> {
    utils::expect_entries(reader, count, 8, field)?;
    let mut pairs = Vec::with_capacity(count);
    for _ in 0..count {
        let first = reader.read_u32::<LittleEndian>()? as usize;
        let second = reader.read_u32::<LittleEndian>()? as usize;
        pairs.push((first, second));
    }
    Ok(pairs)
}

fn read_candidate(reader: &mut &[u8], value_types: &[ResourceValueType]) -> Result<RawCandidate> {
    let kind = reader.read_u8()?;
    let value_type_index = reader.read_u8()? as usize;
    let value_type = *value_types.get(value_type_index).ok_or_else(|| {
        PriError::malformed(format!("Value type {} out of range", value_type_index))
    })?;
    match kind {
        CANDIDATE_INLINE => {
            let length = reader.read_u16::<LittleEndian>()?;
            let offset = reader.read_u32::<LittleEndian>()?;
            Ok(RawCandidate::Inline {
                value_type,
                length,
                offset,
            })
        }
        CANDIDATE_INDIRECT => {
            let source_file = reader.read_u16::<LittleEndian>()?;
            let index = reader.read_u16::<LittleEndian>()?;
            let section = reader.read_u16::<LittleEndian>()?;
            Ok(RawCandidate::Indirect {
                value_type,
                source_file,
                index,
                section,
            })
        }
        other => Err(PriError::malformed(format!("Unknown candidate kind {:#04x}", other))),
    }
}

fn into_candidate(
    raw: RawCandidate,
    qualifiers: QualifierSet,
    string_pool_start: u64,
) -> Candidate {
    match raw {
        RawCandidate::Inline {
            value_type,
            length,
            offset,
        } => Candidate {
            qualifiers,
            value_type,
            data: CandidateData::Inline(ByteSpan::new(
                string_pool_start + offset as u64,
                length as u64,
            )),
        },
        RawCandidate::Indirect {
            value_type,
            source_file,
            index,
            section,
        } => Candidate {
            qualifiers,
            value_type,
            data: if source_file == 0 {
                CandidateData::DataItem(DataItemRef {
                    section: SectionRef(section),
                    index,
                })
            } else {
                CandidateData::External { source_file }
            },
        },
    }
}
