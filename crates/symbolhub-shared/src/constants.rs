/// Application name
pub const APP_NAME: &str = "SymbolHub";

/// Rows returned by one page of the offset-paged post listing
pub const PAGE_SIZE: u32 = 20;

/// Maximum number of rows returned by a search
pub const SEARCH_LIMIT: u32 = 20;

/// A search hit must rank strictly above this to be returned
pub const RANK_THRESHOLD: f64 = 0.01;

/// Smallest valid post / user identity
pub const MIN_ID: i64 = 1;

/// Largest valid post / user identity (32-bit signed positive range)
pub const MAX_ID: i64 = i32::MAX as i64;

/// Identity of the user that unauthenticated writes are attributed to.
/// Seeded by the initial migration.
pub const ANONYMOUS_USER_ID: i32 = 1;

/// Username of the seeded anonymous user
pub const ANONYMOUS_USERNAME: &str = "anonymous";

/// Maximum number of layers a symbol art may declare
pub const MAX_LAYERS: u32 = 225;

/// Maximum title length in characters
pub const MAX_TITLE_LEN: usize = 200;

/// Maximum username length in characters
pub const MAX_USERNAME_LEN: usize = 32;

/// Minimum password length in characters
pub const MIN_PASSWORD_LEN: usize = 8;

/// Catalog of known sound effects, indexed by the asset's sound index.
pub const SOUNDS: &[&str] = &[
    "none",
    "default",
    "joy",
    "anger",
    "sorrow",
    "unease",
    "surprise",
    "doubt",
    "help",
    "whistle",
    "embarrassed",
    "nailed_it",
];

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;
