//! `[mrm_pridescex]` section: the directory of section roles.

use byteorder::{LittleEndian, ReadBytesExt};
use log::debug;

use crate::pri::format::section;
use crate::pri::types::error::Result;
use crate::pri::types::models::{Descriptor, SectionRef};
use crate::pri::utils;

const NO_SECTION: u16 = 0xFFFF;

/// Parses a descriptor section body.
///
/// # Body Structure
/// ```text
/// [2 bytes] Flags
/// [2 bytes] Included file list section
/// [2 bytes] Reserved (0)
/// [2 bytes] Schema section count
/// [2 bytes] Decision info section count
/// [2 bytes] Resource map section count
/// [2 bytes] Primary resource map (0xFFFF = none)
/// [2 bytes] Referenced file section count
/// [2 bytes] Data item section count
/// [2 bytes] Reserved (0)
/// [u16 x n] Section indices, one array per count above
/// ```
pub fn parse(body: &[u8]) -> Result<Descriptor> {
    section::parse_body("descriptor", body, |reader| {
        let flags = reader.read_u16::<LittleEndian>()?;
        let _included_file_list = reader.read_u16::<LittleEndian>()?;
        utils::expect_u16(reader, 0, "descriptor padding")?;
        let num_schemas = reader.read_u16::<LittleEndian>()?;
        let num_decision_infos = reader.read_u16::<LittleEndian>()?;
        let num_resource_maps = reader.read_u16::<LittleEndian>()?;
        let primary_resource_map = reader.read_u16::<LittleEndian>()?;
        let num_referenced_files = reader.read_u16::<LittleEndian>()?;
        let num_data_items = reader.read_u16::<LittleEndian>()?;
        utils::expect_u16(reader, 0, "descriptor padding")?;

        let descriptor = Descriptor {
            flags,
            schema_sections: read_refs(reader, num_schemas)?,
            decision_info_sections: read_refs(reader, num_decision_infos)?,
            resource_map_sections: read_refs(reader, num_resource_maps)?,
            primary_resource_map: (primary_resource_map != NO_SECTION)
                .then_some(SectionRef(primary_resource_map)),
            referenced_file_sections: read_refs(reader, num_referenced_files)?,
            data_item_sections: read_refs(reader, num_data_items)?,
        };

        debug!(
            "Descriptor: flags={:#06x}, {} schema, {} decision info, {} resource map (primary {:?}), {} data item sections",
            descriptor.flags,
            descriptor.schema_sections.len(),
            descriptor.decision_info_sections.len(),
            descriptor.resource_map_sections.len(),
            descriptor.primary_resource_map,
            descriptor.data_item_sections.len()
        );
        Ok(descriptor)
    })
}

fn read_refs(reader: &mut &[u8], count: u16) -> Result<Vec<SectionRef>> {
    let mut refs = Vec::with_capacity(count as usize);
    for _ in 0..count {
        refs.push(SectionRef(reader.read_u16::<LittleEndian>()?));
    }
    Ok(refs)
}

impl Descriptor {
    /// All section references the descriptor mentions.
    pub fn all_refs(&self) -> impl Iterator<Item = SectionRef> + '_ {
        self.schema_sections
            .iter()
            .chain(&self.decision_info_sections)
            .chain(&self.resource_map_sections)
            .chain(&self.referenced_file_sections)
            .chain(&self.data_item_sections)
            .copied()
            .chain(self.primary_resource_map)
    }
}
