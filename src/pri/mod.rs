//! Core PRI reader module

pub mod codec;
pub mod format;
pub mod index;
pub mod qualifier;
pub mod reader;
pub mod types;
mod utils;

pub use reader::PriReader;
pub use types::error::{PriError, Result};
