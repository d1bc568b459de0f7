//! Error types shared by the board library.

use thiserror::Error;

/// Invalid construction-time settings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_messages must be greater than zero")]
    ZeroMaxMessages,

    #[error("time_window_ms must be greater than zero")]
    ZeroTimeWindow,

    #[error("invalid value for {key}: {value}")]
    InvalidVar { key: String, value: String },
}

/// Reasons a message body is refused before it reaches the rate limiter.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Message cannot be empty")]
    EmptyContent,

    #[error("Message must be 240 characters or less")]
    TooLong,

    #[error("Links are not allowed in messages")]
    LinkNotAllowed,
}

/// Profile and room-creation checks performed on the client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoomError {
    #[error("Display name is required")]
    MissingDisplayName,

    #[error("Display name must be at least 2 characters")]
    DisplayNameTooShort,

    #[error("Please enter a discussion title")]
    MissingTitle,

    #[error("Title must be 50 characters or less")]
    TitleTooLong,

    #[error("A discussion with this title already exists")]
    DuplicateTitle,

    #[error("Please enter a custom board name")]
    MissingCategory,

    #[error("Board name must be 16 characters or less")]
    CategoryTooLong,

    #[error("Board name cannot contain spaces (single word only)")]
    CategoryHasSpaces,

    #[error("Board name can only contain letters, numbers, hyphens, and underscores")]
    CategoryCharset,

    #[error("A board with this name already exists")]
    DuplicateCategory,
}

/// Failures from the storage collaborator, local or remote.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Missing required fields: id, title, or category")]
    MissingRoomFields,

    #[error("Chat room with this title already exists.")]
    DuplicateRoom,

    #[error("Chat room id {0} is already taken.")]
    RoomIdTaken(String),

    #[error("server rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid server url: {0}")]
    InvalidUrl(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("snapshot i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot format error: {0}")]
    Format(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether the caller may simply try the same request again.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Transport(_) | StoreError::Io(_) => true,
            StoreError::Rejected { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Outcome of a refused send attempt in a chat session.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{message}")]
    RateLimited { message: String },

    #[error("Failed to send message. Please try again.")]
    Storage(#[source] StoreError),
}
