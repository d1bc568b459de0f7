//! Core data types and type aliases for the board.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::RoomError;
use crate::helpers::{generate_id, now};
use crate::validation::validate_display_name;

/// Rooms by id.
pub type Rooms = Arc<DashMap<String, ChatRoom>>;

/// Per-room message lists: chat_id -> messages in arrival order.
pub type Histories = Arc<DashMap<String, Vec<Message>>>;

/// Boards offered before anyone invents their own.
pub const DEFAULT_CATEGORIES: [&str; 8] = [
    "Music", "Politics", "Tech", "Sports", "Random", "Gaming", "Movies", "Books",
];

/// A stored chat message.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub user_avatar: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub chat_id: String,
}

/// Body of a create-message request. The store fills in what is missing.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub user_name: String,
    pub user_avatar: String,
    pub content: String,
    pub chat_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewMessage {
    /// A message from `profile` into `chat_id`, stamped now.
    pub fn from_profile(profile: &Profile, chat_id: &str, content: &str) -> Self {
        Self {
            id: Some(generate_id()),
            user_id: profile.id.clone(),
            user_name: profile.display_name.clone(),
            user_avatar: profile.avatar.clone(),
            content: content.trim().to_string(),
            chat_id: chat_id.to_string(),
            timestamp: Some(now()),
        }
    }

    pub fn into_message(self) -> Message {
        Message {
            id: self.id.unwrap_or_else(generate_id),
            user_id: self.user_id,
            user_name: self.user_name,
            user_avatar: self.user_avatar,
            content: self.content,
            timestamp: self.timestamp.unwrap_or_else(now),
            chat_id: self.chat_id,
        }
    }
}

/// A topic room.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoom {
    pub id: String,
    pub title: String,
    pub category: String,
    pub active_users: u32,
    pub last_message: DateTime<Utc>,
    pub message_count: u64,
}

impl ChatRoom {
    /// Account for a message posted at `at`.
    pub fn record_message(&mut self, at: DateTime<Utc>) {
        self.message_count += 1;
        if at > self.last_message {
            self.last_message = at;
        }
    }
}

/// Body of a create-room request.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewRoom {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_users: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_count: Option<u64>,
}

impl NewRoom {
    pub fn new(title: &str, category: &str) -> Self {
        Self {
            id: generate_id(),
            title: title.trim().to_string(),
            category: category.trim().to_string(),
            ..Self::default()
        }
    }

    pub fn has_required_fields(&self) -> bool {
        !self.id.trim().is_empty() && !self.title.trim().is_empty() && !self.category.trim().is_empty()
    }

    pub fn into_room(self) -> ChatRoom {
        ChatRoom {
            id: self.id,
            title: self.title,
            category: self.category,
            active_users: self.active_users.unwrap_or(1),
            last_message: self.last_message.unwrap_or_else(now),
            message_count: self.message_count.unwrap_or(0),
        }
    }
}

/// Ephemeral identity picked at sign-in; never persisted by the server.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub display_name: String,
    pub avatar: String,
}

impl Profile {
    pub fn new(display_name: &str, avatar: &str) -> Result<Self, RoomError> {
        Ok(Self {
            id: generate_id(),
            display_name: validate_display_name(display_name)?,
            avatar: avatar.to_string(),
        })
    }

    /// Same identity under a new name or avatar.
    pub fn renamed(&self, display_name: &str, avatar: &str) -> Result<Self, RoomError> {
        Ok(Self {
            id: self.id.clone(),
            display_name: validate_display_name(display_name)?,
            avatar: avatar.to_string(),
        })
    }
}
