//! File format parsing layer for PRI resource containers.
//!
//! This module provides the mid-level parsing layer that bridges between
//! raw file I/O and the high-level [`PriReader`](crate::pri::reader::PriReader).
//!
//! # Module Organization
//!
//! - [`header`]: File header, footer and table of contents
//! - [`section`]: Section framing and body extraction
//! - [`descriptor`]: Which sections play which role
//! - [`schema`]: Resource names (scopes and items)
//! - [`decision`]: Qualifiers, qualifier sets and decisions
//! - [`resource_map`]: Candidate sets per resource item
//! - [`data_item`]: Out-of-line candidate values
//!
//! # Architecture
//!
//! ```text
//! File Structure:
//! ┌─────────────────────┐
//! │  Header (32 bytes)  │ ← header::parse()
//! ├─────────────────────┤
//! │  Table of contents  │ ← header::parse()
//! ├─────────────────────┤
//! │  Sections           │ ← section::read_body() + per-kind parsers
//! │  [mrm_pridescex]    │
//! │  [mrm_hschema]      │
//! │  [mrm_decn_info]    │
//! │  [mrm_res_map2_]    │
//! │  [mrm_dataitem]     │
//! ├─────────────────────┤
//! │  Footer (16 bytes)  │
//! └─────────────────────┘
//! ```

pub mod data_item;
pub mod decision;
pub mod descriptor;
pub mod header;
pub mod resource_map;
pub mod schema;
pub mod section;
