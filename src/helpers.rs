//! Small shared helpers.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Short random id for rooms, messages and profiles.
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Current wall-clock time.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Case-insensitive substring test used by room search.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
