//! Tag list normalization.
//!
//! Tags arrive either as one comma-delimited string (`"pso2, meme"`) or as an
//! array of tokens. Identity is the exact trimmed string: no case folding.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Raw tag input as submitted by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTags {
    Delimited(String),
    List(Vec<String>),
}

impl Default for RawTags {
    fn default() -> Self {
        RawTags::List(Vec::new())
    }
}

impl RawTags {
    /// Normalize into an ordered, deduplicated tag list.
    pub fn normalize(&self) -> Vec<String> {
        match self {
            RawTags::Delimited(s) => normalize_tags(std::iter::once(s.as_str())),
            RawTags::List(items) => normalize_tags(items.iter().map(String::as_str)),
        }
    }
}

/// Split every token on commas, trim, drop empties, and keep the first
/// occurrence of each name.
pub fn normalize_tags<'a, I>(tokens: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for token in tokens {
        for piece in token.split(',') {
            let name = piece.trim();
            if name.is_empty() {
                continue;
            }
            if seen.insert(name) {
                out.push(name.to_string());
            }
        }
    }

    out
}
