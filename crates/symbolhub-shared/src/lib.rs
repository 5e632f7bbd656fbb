//! # symbolhub-shared
//!
//! Domain vocabulary shared by the store and the server: identity bounds,
//! tag normalization, searchable fields and their weight tiers, and the
//! validated inputs of the write path. Nothing in here performs I/O.

pub mod constants;
pub mod error;
pub mod search;
pub mod tags;
pub mod types;

pub use error::ValidationError;
pub use search::{SearchField, SearchFields, SearchQuery, Tier};
pub use tags::{normalize_tags, RawTags};
pub use types::{
    parse_id, parse_offset, AssetProperties, Credentials, NewAsset, NewPost, PostEdit,
};
