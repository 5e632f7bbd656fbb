use thiserror::Error;

/// Input rejected before it reaches the store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid id: {0}")]
    InvalidId(String),

    #[error("invalid offset: {0}")]
    InvalidOffset(String),

    #[error("no search column specified")]
    NoSearchColumns,

    #[error("unknown search column: {0}")]
    UnknownSearchColumn(String),

    #[error("no query text specified")]
    NoQueryText,

    #[error("title must not be empty")]
    EmptyTitle,

    #[error("title exceeds {max} characters")]
    TitleTooLong { max: usize },

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("unknown sound index: {0}")]
    UnknownSound(u32),

    #[error("layer count {layers} exceeds {max}")]
    TooManyLayers { layers: u32, max: u32 },

    #[error("invalid username: {0}")]
    InvalidUsername(String),

    #[error("password must be at least {min} characters")]
    PasswordTooShort { min: usize },
}
