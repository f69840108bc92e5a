//! `[mrm_hschema]` / `[mrm_hschemaex]` sections: the resource name tree.
//!
//! The schema stores scopes (folders) and items (resources) as a flat node
//! list with parent links. An item's full name is its parent chain joined
//! with `\`, where the unnamed root contributes an empty leading segment:
//! `\Resources\AppTitle`.

use byteorder::{LittleEndian, ReadBytesExt};
use log::{debug, trace};

use crate::pri::format::section;
use crate::pri::types::error::{PriError, Result};
use crate::pri::utils;

const FLAG_SCOPE: u8 = 0x10;
const FLAG_ASCII_NAME: u8 = 0x20;
const NODE_SIZE: usize = 12;
const SCOPE_EX_SIZE: usize = 8;

/// Resource names from a hierarchical schema section.
#[derive(Debug, Clone)]
pub struct HierarchicalSchema {
    pub unique_name: String,
    pub name: String,
    pub major_version: u16,
    pub minor_version: u16,
    /// Full item names, indexed by item index.
    items: Vec<String>,
}

impl HierarchicalSchema {
    /// Full name of the item with the given index.
    pub fn item_name(&self, index: usize) -> Option<&str> {
        self.items.get(index).map(String::as_str)
    }

    pub fn num_items(&self) -> usize {
        self.items.len()
    }
}

#[derive(Debug, Clone, Copy)]
struct Node {
    parent: usize,
    named: bool,
    is_scope: bool,
    ascii_name: bool,
    name_offset: usize,
    index: usize,
}

/// Parses a hierarchical schema section body.
///
/// `extended` selects the `[mrm_hschemaex]` layout, which carries an extra
/// names-block identifier.
pub fn parse(body: &[u8], extended: bool) -> Result<HierarchicalSchema> {
    if body.is_empty() {
        return Err(PriError::malformed(
            "Hierarchical schema section is empty; resource names are stored elsewhere",
        ));
    }

    section::parse_body("hierarchical schema", body, |reader| {
        utils::expect_u16(reader, 1, "schema marker")?;
        let unique_name_len = reader.read_u16::<LittleEndian>()? as usize;
        let name_len = reader.read_u16::<LittleEndian>()? as usize;
        utils::expect_u16(reader, 0, "schema padding")?;

        let extended_names = if extended {
            match &utils::read_identifier(reader)? {
                b"[def_hnamesx]  \0" => true,
                b"[def_hnames]   \0" => false,
                other => {
                    return Err(PriError::malformed(format!(
                        "Unknown names block '{}'",
                        String::from_utf8_lossy(other).trim_end_matches(['\0', ' '])
                    )));
                }
            }
        } else {
            false
        };

        let major_version = reader.read_u16::<LittleEndian>()?;
        let minor_version = reader.read_u16::<LittleEndian>()?;
        utils::expect_u32(reader, 0, "schema version padding")?;
        let _checksum = reader.read_u32::<LittleEndian>()?;
        let num_scopes = reader.read_u32::<LittleEndian>()? as usize;
        let num_items = reader.read_u32::<LittleEndian>()? as usize;

        let unique_name = utils::read_utf16z(reader)?;
        let name = utils::read_utf16z(reader)?;
        if unique_name.encode_utf16().count() + 1 != unique_name_len
            || name.encode_utf16().count() + 1 != name_len
        {
            return Err(PriError::malformed("Schema name lengths do not match the header"));
        }

        utils::expect_u16(reader, 0, "schema padding")?;
        let _max_full_path_len = reader.read_u16::<LittleEndian>()?;
        utils::expect_u16(reader, 0, "schema padding")?;
        utils::expect_u32(reader, (num_scopes + num_items) as u32, "schema node count")?;
        utils::expect_u32(reader, num_scopes as u32, "schema scope count")?;
        utils::expect_u32(reader, num_items as u32, "schema item count")?;
        let unicode_data_len = reader.read_u32::<LittleEndian>()? as usize;
        let ascii_data_len = reader.read_u32::<LittleEndian>()? as usize;
        if extended_names {
            let _unknown = reader.read_u32::<LittleEndian>()?;
        }

        let num_nodes = num_scopes + num_items;
        let node_bytes = utils::take(reader, num_nodes * NODE_SIZE, "schema nodes")?;
        let nodes = parse_nodes(node_bytes, num_nodes)?;

        // Per-scope child ranges and the item index table are not needed to
        // build full names.
        utils::take(reader, num_scopes * SCOPE_EX_SIZE, "schema scope table")?;
        utils::take(reader, num_items * 2, "schema item table")?;

        let unicode_pool = utils::take(reader, unicode_data_len * 2, "schema unicode names")?;
        let ascii_pool = utils::take(reader, ascii_data_len, "schema ascii names")?;

        let mut names = Vec::with_capacity(num_nodes);
        for node in &nodes {
            let node_name = if !node.named {
                String::new()
            } else if node.ascii_name {
                utils::asciiz_at(ascii_pool, node.name_offset)?
            } else {
                utils::utf16z_at(unicode_pool, node.name_offset)?
            };
            names.push(node_name);
        }

        let mut items: Vec<Option<String>> = vec![None; num_items];
        for (node_index, node) in nodes.iter().enumerate() {
            if node.is_scope {
                if node.index >= num_scopes {
                    return Err(PriError::malformed(format!(
                        "Scope index {} out of range ({} scopes)",
                        node.index, num_scopes
                    )));
                }
                continue;
            }
            let slot = items.get_mut(node.index).ok_or_else(|| {
                PriError::malformed(format!(
                    "Item index {} out of range ({} items)",
                    node.index, num_items
                ))
            })?;
            if slot.is_some() {
                return Err(PriError::malformed(format!("Item index {} appears twice", node.index)));
            }
            *slot = Some(full_name(&nodes, &names, node_index)?);
        }

        let items = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                item.ok_or_else(|| PriError::malformed(format!("Item index {} has no schema node", index)))
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "Schema '{}' v{}.{}: {} scopes, {} items",
            unique_name, major_version, minor_version, num_scopes, num_items
        );

        Ok(HierarchicalSchema {
            unique_name,
            name,
            major_version,
            minor_version,
            items,
        })
    })
}

fn parse_nodes(mut reader: &[u8], count: usize) -> Result<Vec<Node>> {
    let mut nodes = Vec::with_capacity(count);
    for _ in 0..count {
        let parent = reader.read_u16::<LittleEndian>()? as usize;
        let full_path_len = reader.read_u16::<LittleEndian>()?;
        let _uppercase_first_char = reader.read_u16::<LittleEndian>()?;
        let _name_len = reader.read_u8()?;
        let flags = reader.read_u8()?;
        let name_offset_low = reader.read_u16::<LittleEndian>()? as usize;
        let index = reader.read_u16::<LittleEndian>()? as usize;
        nodes.push(Node {
            parent,
            named: full_path_len != 0,
            is_scope: flags & FLAG_SCOPE != 0,
            ascii_name: flags & FLAG_ASCII_NAME != 0,
            name_offset: name_offset_low | ((flags & 0x0F) as usize) << 16,
            index,
        });
    }
    Ok(nodes)
}

/// Walks parent links up to the root and joins the names with `\`.
///
/// The root is the node whose parent is itself (or out of range as 0xFFFF).
fn full_name(nodes: &[Node], names: &[String], node_index: usize) -> Result<String> {
    let mut segments = Vec::new();
    let mut current = node_index;
    loop {
        segments.push(names[current].as_str());
        let parent = nodes[current].parent;
        if parent == current || parent == 0xFFFF {
            break;
        }
        if segments.len() > nodes.len() {
            return Err(PriError::malformed("Cycle in schema parent links"));
        }
        match nodes.get(parent) {
            Some(node) if node.is_scope => current = parent,
            _ => {
                return Err(PriError::malformed(format!(
                    "Schema node {} has invalid parent {}",
                    current, parent
                )));
            }
        }
    }
    segments.reverse();
    let name = segments.join("\\");
    trace!("Schema item {} -> {}", node_index, name);
    Ok(name)
}
