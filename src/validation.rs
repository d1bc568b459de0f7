//! Client-side checks for message bodies, profiles and new rooms.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{RoomError, ValidationError};

pub const MAX_MESSAGE_CHARS: usize = 240;
pub const MAX_TITLE_CHARS: usize = 50;
pub const MAX_CATEGORY_CHARS: usize = 16;
pub const MIN_DISPLAY_NAME_CHARS: usize = 2;

fn link_re() -> &'static Regex {
    static LINK_RE: OnceLock<Regex> = OnceLock::new();
    LINK_RE.get_or_init(|| {
        Regex::new(r"(?i)https?://|www\.|\.com|\.org|\.net|\.edu|\.gov")
            .expect("link pattern is valid")
    })
}

fn category_re() -> &'static Regex {
    static CATEGORY_RE: OnceLock<Regex> = OnceLock::new();
    CATEGORY_RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("category pattern is valid"))
}

/// Check a message body before it is offered to the rate limiter.
pub fn validate_message(content: &str) -> Result<(), ValidationError> {
    if content.is_empty() {
        return Err(ValidationError::EmptyContent);
    }
    if content.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ValidationError::TooLong);
    }
    if link_re().is_match(content) {
        return Err(ValidationError::LinkNotAllowed);
    }
    Ok(())
}

/// Trimmed display name, or why it is unusable.
pub fn validate_display_name(name: &str) -> Result<String, RoomError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(RoomError::MissingDisplayName);
    }
    if trimmed.chars().count() < MIN_DISPLAY_NAME_CHARS {
        return Err(RoomError::DisplayNameTooShort);
    }
    Ok(trimmed.to_string())
}

/// Trimmed room title, rejecting duplicates of `existing` (case-insensitive).
pub fn validate_room_title<'a, I>(title: &str, existing: I) -> Result<String, RoomError>
where
    I: IntoIterator<Item = &'a str>,
{
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(RoomError::MissingTitle);
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(RoomError::TitleTooLong);
    }
    let lowered = trimmed.to_lowercase();
    if existing.into_iter().any(|t| t.to_lowercase() == lowered) {
        return Err(RoomError::DuplicateTitle);
    }
    Ok(trimmed.to_string())
}

/// Validate a user-invented category (a "board") against the known ones.
pub fn validate_custom_category<'a, I>(name: &str, existing: I) -> Result<String, RoomError>
where
    I: IntoIterator<Item = &'a str>,
{
    if name.trim().is_empty() {
        return Err(RoomError::MissingCategory);
    }
    if name.chars().count() > MAX_CATEGORY_CHARS {
        return Err(RoomError::CategoryTooLong);
    }
    if name.contains(' ') {
        return Err(RoomError::CategoryHasSpaces);
    }
    if !category_re().is_match(name) {
        return Err(RoomError::CategoryCharset);
    }
    if existing.into_iter().any(|c| c.eq_ignore_ascii_case(name)) {
        return Err(RoomError::DuplicateCategory);
    }
    Ok(name.to_string())
}
