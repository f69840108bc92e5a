//! Candidate selection by language qualifier.
//!
//! Candidates are tried strictly in file order. A candidate is skipped when
//! its language does not match, or when its value decodes to nothing; the
//! first candidate that produces non-empty text wins. A language match with
//! an empty value therefore never hides a later language-neutral candidate.

use log::trace;

use super::types::error::Result;
use super::types::models::{Candidate, CandidateSet, QualifierSet};

/// Whether a qualifier set is eligible for `locale`.
///
/// Sets without a Language qualifier are language-neutral and always match.
/// Otherwise the first Language qualifier decides, compared without regard
/// to case. Other qualifier types are not considered.
pub fn language_matches(qualifiers: &QualifierSet, locale: &str) -> bool {
    match qualifiers.language() {
        None => true,
        Some(language) => language.value.to_lowercase() == locale.to_lowercase(),
    }
}

/// Selects the text of the first eligible candidate that decodes to a
/// non-empty string.
///
/// `decode` returns `Ok(None)` when a candidate has no readable value; that
/// candidate is skipped like one with an empty value. An `Err` from `decode`
/// ends the selection and is returned as is.
pub fn select_text<F>(candidates: &CandidateSet, locale: &str, mut decode: F) -> Result<Option<String>>
where
    F: FnMut(&Candidate) -> Result<Option<String>>,
{
    for (position, candidate) in candidates.iter().enumerate() {
        if !language_matches(&candidate.qualifiers, locale) {
            trace!("Candidate {}: language does not match '{}'", position, locale);
            continue;
        }
        match decode(candidate)? {
            Some(text) if !text.is_empty() => {
                trace!("Candidate {}: selected", position);
                return Ok(Some(text));
            }
            _ => trace!("Candidate {}: no text", position),
        }
    }
    Ok(None)
}
