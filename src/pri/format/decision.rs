//! `[mrm_decn_info]` section: qualifiers, qualifier sets and decisions.
//!
//! A decision is an ordered list of qualifier sets; the candidates of a
//! resource item line up one-to-one with the qualifier sets of its decision.

use byteorder::{LittleEndian, ReadBytesExt};
use log::debug;

use crate::pri::format::section;
use crate::pri::types::error::{PriError, Result};
use crate::pri::types::models::{Qualifier, QualifierSet, QualifierType};
use crate::pri::utils;

/// Parsed decision info section.
#[derive(Debug, Clone, Default)]
pub struct DecisionInfo {
    pub qualifier_sets: Vec<QualifierSet>,
    /// Qualifier-set indices per decision.
    pub decisions: Vec<Vec<usize>>,
}

impl DecisionInfo {
    pub fn decision(&self, index: usize) -> Option<&[usize]> {
        self.decisions.get(index).map(Vec::as_slice)
    }

    pub fn qualifier_set(&self, index: usize) -> Option<&QualifierSet> {
        self.qualifier_sets.get(index)
    }
}

struct DistinctQualifier {
    qualifier_type: QualifierType,
    operand_offset: usize,
}

struct QualifierInfo {
    distinct: usize,
    priority: u16,
    fallback_score: u16,
}

/// Parses a decision info section body.
///
/// # Body Structure
/// ```text
/// [2 bytes x 6] Counts: distinct qualifiers, qualifiers, qualifier sets,
///               decisions, index table entries, value data length
/// [4 bytes each] Decisions: first index-table slot, qualifier set count
/// [4 bytes each] Qualifier sets: first index-table slot, qualifier count
/// [8 bytes each] Qualifiers: distinct index, priority, fallback score, 0
/// [12 bytes each] Distinct qualifiers: ?, type, ?, ?, operand offset (u32)
/// [2 bytes each] Index table
/// [..]           UTF-16 operand values
/// ```
pub fn parse(body: &[u8]) -> Result<DecisionInfo> {
    section::parse_body("decision info", body, |reader| {
        let num_distinct = reader.read_u16::<LittleEndian>()? as usize;
        let num_qualifiers = reader.read_u16::<LittleEndian>()? as usize;
        let num_qualifier_sets = reader.read_u16::<LittleEndian>()? as usize;
        let num_decisions = reader.read_u16::<LittleEndian>()? as usize;
        let num_index_entries = reader.read_u16::<LittleEndian>()? as usize;
        let _data_len = reader.read_u16::<LittleEndian>()?;

        let decision_ranges = read_ranges(reader, num_decisions)?;
        let set_ranges = read_ranges(reader, num_qualifier_sets)?;

        let mut qualifier_infos = Vec::with_capacity(num_qualifiers);
        for _ in 0..num_qualifiers {
            let distinct = reader.read_u16::<LittleEndian>()? as usize;
            let priority = reader.read_u16::<LittleEndian>()?;
            let fallback_score = reader.read_u16::<LittleEndian>()?;
            utils::expect_u16(reader, 0, "qualifier padding")?;
            qualifier_infos.push(QualifierInfo {
                distinct,
                priority,
                fallback_score,
            });
        }

        let mut distinct_qualifiers = Vec::with_capacity(num_distinct);
        for _ in 0..num_distinct {
            let _unknown = reader.read_u16::<LittleEndian>()?;
            let qualifier_type = QualifierType::from(reader.read_u16::<LittleEndian>()?);
            let _unknown = reader.read_u16::<LittleEndian>()?;
            let _unknown = reader.read_u16::<LittleEndian>()?;
            let operand_offset = reader.read_u32::<LittleEndian>()? as usize;
            distinct_qualifiers.push(DistinctQualifier {
                qualifier_type,
                operand_offset,
            });
        }

        let mut index_table = Vec::with_capacity(num_index_entries);
        for _ in 0..num_index_entries {
            index_table.push(reader.read_u16::<LittleEndian>()? as usize);
        }

        let values = *reader;

        let mut qualifiers = Vec::with_capacity(num_qualifiers);
        for info in &qualifier_infos {
            let distinct = distinct_qualifiers.get(info.distinct).ok_or_else(|| {
                PriError::malformed(format!("Distinct qualifier {} out of range", info.distinct))
            })?;
            qualifiers.push(Qualifier {
                qualifier_type: distinct.qualifier_type,
                value: utils::utf16z_at(values, distinct.operand_offset)?,
                priority: info.priority,
                fallback_score: info.fallback_score,
            });
        }

        let mut qualifier_sets = Vec::with_capacity(num_qualifier_sets);
        for &(first, count) in &set_ranges {
            let members = index_slice(&index_table, first, count, "qualifier set")?
                .iter()
                .map(|&q| {
                    qualifiers.get(q).cloned().ok_or_else(|| {
                        PriError::malformed(format!("Qualifier {} out of range", q))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            qualifier_sets.push(QualifierSet { qualifiers: members });
        }

        let mut decisions = Vec::with_capacity(num_decisions);
        for &(first, count) in &decision_ranges {
            let sets = index_slice(&index_table, first, count, "decision")?.to_vec();
            if let Some(&bad) = sets.iter().find(|&&s| s >= qualifier_sets.len()) {
                return Err(PriError::malformed(format!("Qualifier set {} out of range", bad)));
            }
            decisions.push(sets);
        }

        debug!(
            "Decision info: {} qualifiers, {} qualifier sets, {} decisions",
            qualifiers.len(),
            qualifier_sets.len(),
            decisions.len()
        );

        Ok(DecisionInfo {
            qualifier_sets,
            decisions,
        })
    })
}

fn read_ranges(reader: &mut &[u8], count: usize) -> Result<Vec<(usize, usize)>> {
    let mut ranges = Vec::with_capacity(count);
    for _ in 0..count {
        let first = reader.read_u16::<LittleEndian>()? as usize;
        let len = reader.read_u16::<LittleEndian>()? as usize;
        ranges.push((first, len));
    }
    Ok(ranges)
}

fn index_slice<'a>(table: &'a [usize], first: usize, count: usize, what: &str) -> Result<&'a [usize]> {
    table.get(first..first + count).ok_or_else(|| {
        PriError::malformed(format!(
            "{} index range [{}, +{}] exceeds index table of {} entries",
            what,
            first,
            count,
            table.len()
        ))
    })
}
