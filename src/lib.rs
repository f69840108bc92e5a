//! # pri-reader
//!
//! A reader for compiled PRI resource containers (`resources.pri`).
//! Resolves a resource name such as `ms-resource:AppTitle` to the best
//! localized string for a locale, with language-neutral fallback.
//!
//! ```no_run
//! use pri_reader::PriReader;
//!
//! let reader = PriReader::open("resources.pri")?;
//! let title = reader.resolve("ms-resource:AppTitle", "en-US")?;
//! println!("{}", title.as_deref().unwrap_or("Untitled"));
//! # Ok::<(), pri_reader::PriError>(())
//! ```
//!
//! **Note:** The reader is read-only and does not enumerate resources.
pub mod pri;

// Re-export the main types for convenience
pub use pri::{
    PriError, PriReader, Result,
    index::{normalize, ResourceMapIndex},
    types::models::{
        ByteSpan, Candidate, CandidateData, CandidateSet, Container, Qualifier, QualifierSet,
        QualifierType, ResourceMapItem, ResourceValueType, SectionKind, SectionRef,
    },
};
