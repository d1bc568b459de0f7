//! Room and message storage: the collaborator that sessions submit to.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::types::{ChatRoom, Histories, Message, NewMessage, NewRoom, Rooms};

/// Persistence operations the board needs, local or over HTTP.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Save a message and return the stored record.
    async fn create_message(&self, message: NewMessage) -> Result<Message, StoreError>;

    /// Messages of one room, oldest first.
    async fn messages(&self, chat_id: &str) -> Result<Vec<Message>, StoreError>;

    async fn create_room(&self, room: NewRoom) -> Result<ChatRoom, StoreError>;

    /// All rooms, most recent activity first.
    async fn rooms(&self) -> Result<Vec<ChatRoom>, StoreError>;
}

/// On-disk form of the whole store.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct Snapshot {
    pub rooms: Vec<ChatRoom>,
    pub messages: Vec<Message>,
}

/// In-memory store shared by the HTTP handlers.
#[derive(Clone, Default)]
pub struct MemoryStore {
    rooms: Rooms,
    histories: Histories,
    // serialises the title uniqueness check with the insert
    room_guard: Arc<Mutex<()>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let store = Self::new();
        for room in snapshot.rooms {
            store.rooms.insert(room.id.clone(), room);
        }
        for message in snapshot.messages {
            store
                .histories
                .entry(message.chat_id.clone())
                .or_default()
                .push(message);
        }
        store
    }

    /// Load a snapshot file (synchronous, done at startup). A missing file
    /// yields an empty store.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let s = fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&s)?;
        info!(
            "Loaded {} rooms and {} messages from {}",
            snapshot.rooms.len(),
            snapshot.messages.len(),
            path.display()
        );
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn snapshot(&self) -> Snapshot {
        let mut rooms: Vec<ChatRoom> = self.rooms.iter().map(|r| r.value().clone()).collect();
        rooms.sort_by(|a, b| a.id.cmp(&b.id));
        let mut messages: Vec<Message> = self
            .histories
            .iter()
            .flat_map(|r| r.value().clone())
            .collect();
        messages.sort_by(|a, b| a.chat_id.cmp(&b.chat_id).then(a.timestamp.cmp(&b.timestamp)));
        Snapshot { rooms, messages }
    }

    /// Write the snapshot to disk off the async runtime.
    pub async fn save(&self, path: &Path) -> Result<(), StoreError> {
        let snapshot = self.snapshot();
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let s = serde_json::to_string_pretty(&snapshot)?;
            fs::write(&path, s)?;
            debug!("Saved {} rooms to {}", snapshot.rooms.len(), path.display());
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))??;
        Ok(())
    }

    pub fn room(&self, id: &str) -> Option<ChatRoom> {
        self.rooms.get(id).map(|r| r.value().clone())
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn create_message(&self, message: NewMessage) -> Result<Message, StoreError> {
        let message = message.into_message();
        if let Some(mut room) = self.rooms.get_mut(&message.chat_id) {
            room.record_message(message.timestamp);
        }
        self.histories
            .entry(message.chat_id.clone())
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn messages(&self, chat_id: &str) -> Result<Vec<Message>, StoreError> {
        let mut items = self
            .histories
            .get(chat_id)
            .map(|r| r.value().clone())
            .unwrap_or_default();
        items.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(items)
    }

    async fn create_room(&self, room: NewRoom) -> Result<ChatRoom, StoreError> {
        if !room.has_required_fields() {
            return Err(StoreError::MissingRoomFields);
        }
        let _guard = self
            .room_guard
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let title = room.title.to_lowercase();
        if self
            .rooms
            .iter()
            .any(|r| r.value().title.to_lowercase() == title)
        {
            return Err(StoreError::DuplicateRoom);
        }
        if self.rooms.contains_key(&room.id) {
            return Err(StoreError::RoomIdTaken(room.id));
        }

        let room = room.into_room();
        self.rooms.insert(room.id.clone(), room.clone());
        info!("Created room '{}' in /{}/", room.title, room.category);
        Ok(room)
    }

    async fn rooms(&self) -> Result<Vec<ChatRoom>, StoreError> {
        let mut rooms: Vec<ChatRoom> = self.rooms.iter().map(|r| r.value().clone()).collect();
        rooms.sort_by(|a, b| b.last_message.cmp(&a.last_message));
        Ok(rooms)
    }
}
