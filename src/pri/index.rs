//! Name lookup over the primary resource map.
//!
//! Resource names are accepted in several spellings which all normalize to
//! the same key:
//!
//! ```text
//! ms-resource:Foo/Bar  ─┐
//! \Foo\Bar             ─┤
//! Foo/Bar              ─┼─▶ \Foo\Bar
//! Foo\Bar              ─┘
//! ```
//!
//! Keys compare case-insensitively. A miss is retried exactly once under the
//! implicit `\Resources\` folder.

use std::collections::HashMap;

use log::{debug, trace};

use super::types::models::ResourceMapItem;
use super::utils;

/// URI scheme prefix accepted in resource names.
pub const MS_RESOURCE_PREFIX: &str = "ms-resource:";
/// Folder that string resources are compiled into by default.
pub const IMPLICIT_FOLDER: &str = "\\Resources\\";

const SEPARATOR: char = '\\';

/// Normalizes a resource name into its `\`-separated lookup form.
///
/// 1. Strip a leading `ms-resource:` and prepend a single `\`.
/// 2. Prepend `\` if the name does not already start with one.
/// 3. Replace every `/` with `\`.
pub fn normalize(name: &str) -> String {
    let mut normalized = match name.strip_prefix(MS_RESOURCE_PREFIX) {
        Some(rest) => format!("{}{}", SEPARATOR, rest),
        None => name.to_string(),
    };
    if !normalized.starts_with(SEPARATOR) {
        normalized.insert(0, SEPARATOR);
    }
    normalized.replace('/', "\\")
}

fn fold(normalized: &str) -> String {
    normalized.to_lowercase()
}

/// Read-only mapping from normalized resource names to resource map items.
#[derive(Debug, Default)]
pub struct ResourceMapIndex {
    items: Vec<ResourceMapItem>,
    by_name: HashMap<String, usize>,
}

impl ResourceMapIndex {
    /// Registers every item under its normalized, case-folded name.
    ///
    /// Items keep file order; if two items normalize to the same key, the
    /// first one wins.
    pub fn build(items: Vec<ResourceMapItem>) -> Self {
        let mut by_name = HashMap::with_capacity(items.len());
        for (position, item) in items.iter().enumerate() {
            let key = fold(&normalize(&item.name));
            if by_name.contains_key(&key) {
                debug!("Duplicate resource name '{}' ignored", item.name);
                continue;
            }
            by_name.insert(key, position);
        }
        Self { items, by_name }
    }

    /// Direct lookup of a name, without the implicit folder fallback.
    pub fn get(&self, name: &str) -> Option<&ResourceMapItem> {
        self.get_normalized(&normalize(name))
    }

    /// Looks up a name, retrying once under `\Resources\` on a miss.
    ///
    /// The retry is skipped when the name is already inside `\Resources\`,
    /// and a miss on the retry is final.
    pub fn lookup(&self, name: &str) -> Option<&ResourceMapItem> {
        let normalized = normalize(name);
        if let Some(item) = self.get_normalized(&normalized) {
            return Some(item);
        }
        if utils::starts_with_ignore_case(&normalized, IMPLICIT_FOLDER) {
            trace!("'{}' not found", normalized);
            return None;
        }

        let prefixed = format!("{}{}", IMPLICIT_FOLDER.trim_end_matches(SEPARATOR), normalized);
        trace!("'{}' not found, retrying as '{}'", normalized, prefixed);
        self.get_normalized(&prefixed)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn get_normalized(&self, normalized: &str) -> Option<&ResourceMapItem> {
        self.by_name
            .get(&fold(normalized))
            .map(|&position| &self.items[position])
    }
}
