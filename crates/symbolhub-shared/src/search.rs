//! Searchable fields and their weight tiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Relative priority of a field's contribution to the rank, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    A,
    B,
    C,
    D,
}

impl Tier {
    /// Multiplier applied to every occurrence carrying this tier.
    pub fn weight(self) -> f64 {
        match self {
            Tier::A => 1.0,
            Tier::B => 0.4,
            Tier::C => 0.2,
            Tier::D => 0.1,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Tier::A => 'A',
            Tier::B => 'B',
            Tier::C => 'C',
            Tier::D => 'D',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'A' => Some(Tier::A),
            'B' => Some(Tier::B),
            'C' => Some(Tier::C),
            'D' => Some(Tier::D),
            _ => None,
        }
    }
}

/// A post attribute that can take part in a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchField {
    Title,
    Description,
    Tags,
    Username,
}

impl SearchField {
    /// All fields, in tier order.
    pub const ALL: [SearchField; 4] = [
        SearchField::Title,
        SearchField::Description,
        SearchField::Tags,
        SearchField::Username,
    ];

    pub fn tier(self) -> Tier {
        match self {
            SearchField::Title => Tier::A,
            SearchField::Description => Tier::B,
            SearchField::Tags => Tier::C,
            SearchField::Username => Tier::D,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SearchField::Title => "title",
            SearchField::Description => "description",
            SearchField::Tags => "tags",
            SearchField::Username => "username",
        }
    }
}

impl fmt::Display for SearchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "title" => Ok(SearchField::Title),
            "description" => Ok(SearchField::Description),
            "tags" => Ok(SearchField::Tags),
            "username" => Ok(SearchField::Username),
            other => Err(ValidationError::UnknownSearchColumn(other.to_string())),
        }
    }
}

/// The set of fields enabled for one search. Iteration is always in tier
/// order regardless of how the set was built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchFields {
    enabled: [bool; 4],
}

impl SearchFields {
    pub fn all() -> Self {
        Self { enabled: [true; 4] }
    }

    pub fn insert(&mut self, field: SearchField) {
        self.enabled[Self::slot(field)] = true;
    }

    pub fn contains(&self, field: SearchField) -> bool {
        self.enabled[Self::slot(field)]
    }

    pub fn is_empty(&self) -> bool {
        !self.enabled.iter().any(|e| *e)
    }

    pub fn iter(&self) -> impl Iterator<Item = SearchField> + '_ {
        SearchField::ALL.into_iter().filter(|f| self.contains(*f))
    }

    /// Parse a comma-separated column list such as `"title,tags"`.
    /// An empty list parses to an empty set; callers reject it.
    pub fn parse_list(raw: &str) -> Result<Self, ValidationError> {
        let mut fields = Self::default();
        for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            fields.insert(name.parse()?);
        }
        Ok(fields)
    }

    fn slot(field: SearchField) -> usize {
        match field {
            SearchField::Title => 0,
            SearchField::Description => 1,
            SearchField::Tags => 2,
            SearchField::Username => 3,
        }
    }
}

impl FromIterator<SearchField> for SearchFields {
    fn from_iter<T: IntoIterator<Item = SearchField>>(iter: T) -> Self {
        let mut fields = Self::default();
        for f in iter {
            fields.insert(f);
        }
        fields
    }
}

/// A validated search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub text: String,
    pub fields: SearchFields,
}

impl SearchQuery {
    /// Columns are checked first so that a request with neither reports the
    /// missing columns.
    pub fn new(text: Option<&str>, fields: SearchFields) -> Result<Self, ValidationError> {
        if fields.is_empty() {
            return Err(ValidationError::NoSearchColumns);
        }
        let text = match text.map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => return Err(ValidationError::NoQueryText),
        };
        Ok(Self { text, fields })
    }
}
