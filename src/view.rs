//! Local view state of one client: the rooms and messages it has seen.

use std::collections::{BTreeSet, HashSet};

use crate::helpers::contains_ignore_case;
use crate::types::{ChatRoom, Message, Profile, DEFAULT_CATEGORIES};

/// Category filter value that matches every room.
pub const ALL_CATEGORIES: &str = "All";

#[derive(Debug, Clone, Default)]
pub struct BoardView {
    rooms: Vec<ChatRoom>,
    messages: Vec<Message>,
}

impl BoardView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rooms(&self) -> &[ChatRoom] {
        &self.rooms
    }

    pub fn room(&self, id: &str) -> Option<&ChatRoom> {
        self.rooms.iter().find(|r| r.id == id)
    }

    /// Messages of one room in chronological order.
    pub fn messages_in<'a>(&'a self, chat_id: &'a str) -> impl Iterator<Item = &'a Message> + 'a {
        self.messages.iter().filter(move |m| m.chat_id == chat_id)
    }

    pub fn replace_rooms(&mut self, rooms: Vec<ChatRoom>) {
        self.rooms = rooms;
    }

    /// A freshly created room goes to the top of the list.
    pub fn add_room(&mut self, room: ChatRoom) {
        self.rooms.retain(|r| r.id != room.id);
        self.rooms.insert(0, room);
    }

    /// Add one message and account for it on its room. Returns false if
    /// the message was already known.
    pub fn merge_message(&mut self, message: Message) -> bool {
        if self.messages.iter().any(|m| m.id == message.id) {
            return false;
        }
        if let Some(room) = self.rooms.iter_mut().find(|r| r.id == message.chat_id) {
            room.record_message(message.timestamp);
        }
        self.insert_sorted(message);
        true
    }

    /// Replace what is known about one room with the server's list and
    /// return the messages that were not seen before.
    pub fn replace_messages(&mut self, chat_id: &str, fresh: Vec<Message>) -> Vec<Message> {
        let known: HashSet<String> = self
            .messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .map(|m| m.id.clone())
            .collect();
        let unseen: Vec<Message> = fresh
            .iter()
            .filter(|m| !known.contains(&m.id))
            .cloned()
            .collect();

        self.messages.retain(|m| m.chat_id != chat_id);
        for message in fresh {
            self.insert_sorted(message);
        }
        unseen
    }

    fn insert_sorted(&mut self, message: Message) {
        let at = self
            .messages
            .partition_point(|m| m.timestamp <= message.timestamp);
        self.messages.insert(at, message);
    }

    /// Rooms in `category` whose title or category contains `query`,
    /// busiest first.
    pub fn rooms_filtered(&self, category: &str, query: &str) -> Vec<&ChatRoom> {
        let mut rooms: Vec<&ChatRoom> = self
            .rooms
            .iter()
            .filter(|r| category == ALL_CATEGORIES || r.category == category)
            .filter(|r| {
                query.is_empty()
                    || contains_ignore_case(&r.title, query)
                    || contains_ignore_case(&r.category, query)
            })
            .collect();
        rooms.sort_by(|a, b| b.active_users.cmp(&a.active_users));
        rooms
    }

    /// Built-in categories plus any invented by existing rooms, sorted.
    pub fn categories(&self) -> Vec<String> {
        DEFAULT_CATEGORIES
            .iter()
            .map(|c| c.to_string())
            .chain(self.rooms.iter().map(|r| r.category.clone()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Show a profile change on everything this user already posted.
    pub fn apply_profile(&mut self, profile: &Profile) {
        for message in self.messages.iter_mut().filter(|m| m.user_id == profile.id) {
            message.user_name = profile.display_name.clone();
            message.user_avatar = profile.avatar.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NewRoom;
    use chrono::{Duration, Utc};

    fn room(title: &str, category: &str, active_users: u32) -> ChatRoom {
        let mut room = NewRoom::new(title, category).into_room();
        room.active_users = active_users;
        room
    }

    fn message(id: &str, chat_id: &str, secs: i64) -> Message {
        Message {
            id: id.into(),
            user_id: "u1".into(),
            user_name: "owl".into(),
            user_avatar: "🦉".into(),
            content: format!("msg {}", id),
            timestamp: Utc::now() + Duration::seconds(secs),
            chat_id: chat_id.into(),
        }
    }

    #[test]
    fn test_merge_message_bumps_room_once() {
        let mut view = BoardView::new();
        let r = room("Tunes", "Music", 1);
        let id = r.id.clone();
        view.replace_rooms(vec![r]);

        let m = message("m1", &id, 60);
        assert!(view.merge_message(m.clone()));
        assert!(!view.merge_message(m.clone()));

        let r = view.room(&id).unwrap();
        assert_eq!(r.message_count, 1);
        assert_eq!(r.last_message, m.timestamp);
    }

    #[test]
    fn test_messages_kept_in_time_order() {
        let mut view = BoardView::new();
        view.merge_message(message("b", "r", 10));
        view.merge_message(message("a", "r", 5));
        view.merge_message(message("x", "other", 7));
        let ids: Vec<_> = view.messages_in("r").map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn test_replace_messages_reports_unseen() {
        let mut view = BoardView::new();
        view.merge_message(message("a", "r", 1));
        let unseen = view.replace_messages("r", vec![message("a", "r", 1), message("b", "r", 2)]);
        assert_eq!(unseen.len(), 1);
        assert_eq!(unseen[0].id, "b");
        assert_eq!(view.messages_in("r").count(), 2);
    }

    #[test]
    fn test_rooms_filtered_by_category_and_query() {
        let mut view = BoardView::new();
        view.replace_rooms(vec![
            room("Synth talk", "Music", 3),
            room("Jazz", "Music", 9),
            room("Rust", "Tech", 5),
        ]);

        let music: Vec<_> = view
            .rooms_filtered("Music", "")
            .into_iter()
            .map(|r| r.title.as_str())
            .collect();
        assert_eq!(music, ["Jazz", "Synth talk"]);

        let found: Vec<_> = view
            .rooms_filtered(ALL_CATEGORIES, "TECH")
            .into_iter()
            .map(|r| r.title.as_str())
            .collect();
        assert_eq!(found, ["Rust"]);

        assert_eq!(view.rooms_filtered(ALL_CATEGORIES, "").len(), 3);
    }

    #[test]
    fn test_categories_include_invented_boards() {
        let mut view = BoardView::new();
        view.replace_rooms(vec![room("x", "retro_games", 1), room("y", "Music", 1)]);
        let categories = view.categories();
        assert!(categories.contains(&"retro_games".to_string()));
        assert_eq!(categories.iter().filter(|c| *c == "Music").count(), 1);
        assert_eq!(categories.len(), DEFAULT_CATEGORIES.len() + 1);
    }

    #[test]
    fn test_add_room_goes_first() {
        let mut view = BoardView::new();
        view.replace_rooms(vec![room("old", "Books", 1)]);
        view.add_room(room("new", "Books", 1));
        assert_eq!(view.rooms()[0].title, "new");
    }

    #[test]
    fn test_apply_profile_rewrites_own_messages() {
        let mut view = BoardView::new();
        let profile = Profile::new("owl", "🦉").unwrap();
        let mut mine = message("m1", "r", 1);
        mine.user_id = profile.id.clone();
        view.merge_message(mine);
        view.merge_message(message("m2", "r", 2));

        let renamed = profile.renamed("hawk", "🦅").unwrap();
        view.apply_profile(&renamed);

        let names: Vec<_> = view.messages_in("r").map(|m| m.user_name.as_str()).collect();
        assert_eq!(names, ["hawk", "owl"]);
    }
}
