//! Codec layer for candidate values.
//!
//! # Submodules
//!
//! - [`text`][]: Value-type driven text decoding (ASCII, UTF-8, UTF-16LE)

pub mod text;
