//! One open chat room view: validation, rate limiting, submission and the
//! cooldown timer that belongs to it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::{Clock, TokioClock};
use crate::error::{ConfigError, StoreError, SubmitError, ValidationError};
use crate::rate_limit::{Admission, RateLimitConfig, RateLimitStatus, RateLimiter};
use crate::store::MessageStore;
use crate::types::{Message, NewMessage, Profile};
use crate::validation::validate_message;
use crate::view::BoardView;

/// Events posted back to the session by its own timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    CooldownExpired { generation: u64 },
}

/// Pending cooldown task; aborted when replaced or dropped.
struct CooldownTimer {
    handle: JoinHandle<()>,
}

impl Drop for CooldownTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub struct ChatSession<C = TokioClock> {
    profile: Profile,
    room_id: String,
    limiter: RateLimiter<C>,
    store: Arc<dyn MessageStore>,
    view: BoardView,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    cooldown: Option<CooldownTimer>,
    generation: u64,
}

impl ChatSession<TokioClock> {
    pub fn new(
        profile: Profile,
        room_id: &str,
        config: RateLimitConfig,
        store: Arc<dyn MessageStore>,
    ) -> Result<Self, ConfigError> {
        Ok(Self::with_limiter(profile, room_id, RateLimiter::new(config)?, store))
    }
}

impl<C: Clock> ChatSession<C> {
    pub fn with_limiter(
        profile: Profile,
        room_id: &str,
        limiter: RateLimiter<C>,
        store: Arc<dyn MessageStore>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            profile,
            room_id: room_id.to_string(),
            limiter,
            store,
            view: BoardView::new(),
            events_tx,
            events_rx,
            cooldown: None,
            generation: 0,
        }
    }

    /// Validate, rate limit, then store one message.
    ///
    /// Rejected content never reaches the limiter. A storage failure is
    /// reported but the attempt still counts against the window.
    pub async fn send_message(&mut self, content: &str) -> Result<Message, SubmitError> {
        validate_message(content)?;
        // content is stored trimmed
        if content.trim().is_empty() {
            return Err(ValidationError::EmptyContent.into());
        }

        if let Admission::Limited { cooldown } = self.limiter.check() {
            self.schedule_cooldown(cooldown);
            return Err(SubmitError::RateLimited {
                message: self.limiter.rate_limit_message(),
            });
        }

        let draft = NewMessage::from_profile(&self.profile, &self.room_id, content);
        match self.store.create_message(draft).await {
            Ok(saved) => {
                self.view.merge_message(saved.clone());
                Ok(saved)
            }
            Err(e) => {
                warn!("failed to save message in {}: {}", self.room_id, e);
                Err(SubmitError::Storage(e))
            }
        }
    }

    fn schedule_cooldown(&mut self, after: Duration) {
        self.generation += 1;
        let generation = self.generation;
        let tx = self.events_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(SessionEvent::CooldownExpired { generation });
        });
        // replacing the guard aborts the previous timer
        self.cooldown = Some(CooldownTimer { handle });
    }

    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::CooldownExpired { generation } if generation == self.generation => {
                self.limiter.clear_cooldown();
                self.cooldown = None;
                debug!("cooldown over in {}", self.room_id);
            }
            SessionEvent::CooldownExpired { generation } => {
                debug!("ignoring stale cooldown {} (current {})", generation, self.generation);
            }
        }
    }

    /// Wait for the next timer event. The session holds a sender itself,
    /// so this only returns once an event arrives.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events_rx.recv().await
    }

    /// Apply every event that is already queued.
    pub fn pump_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Reload rooms and this room's messages. Returns messages not seen before.
    pub async fn refresh(&mut self) -> Result<Vec<Message>, StoreError> {
        let rooms = self.store.rooms().await?;
        self.view.replace_rooms(rooms);
        let messages = self.store.messages(&self.room_id).await?;
        Ok(self.view.replace_messages(&self.room_id, messages))
    }

    pub fn update_profile(&mut self, profile: Profile) {
        info!("profile changed to '{}'", profile.display_name);
        self.view.apply_profile(&profile);
        self.profile = profile;
    }

    pub fn status(&self) -> RateLimitStatus {
        self.limiter.status()
    }

    pub fn rate_limit_message(&self) -> String {
        self.limiter.rate_limit_message()
    }

    pub fn is_limited(&self) -> bool {
        self.limiter.is_limited()
    }

    pub fn remaining_time(&self) -> u64 {
        self.limiter.remaining_time()
    }

    pub fn current_multiplier(&self) -> u32 {
        self.limiter.current_multiplier()
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn view(&self) -> &BoardView {
        &self.view
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{ChatRoom, NewRoom};
    use async_trait::async_trait;

    struct FailingStore;

    #[async_trait]
    impl MessageStore for FailingStore {
        async fn create_message(&self, _message: NewMessage) -> Result<Message, StoreError> {
            Err(StoreError::Rejected {
                status: 503,
                message: "unavailable".into(),
            })
        }

        async fn messages(&self, _chat_id: &str) -> Result<Vec<Message>, StoreError> {
            Ok(Vec::new())
        }

        async fn create_room(&self, _room: NewRoom) -> Result<ChatRoom, StoreError> {
            Err(StoreError::DuplicateRoom)
        }

        async fn rooms(&self) -> Result<Vec<ChatRoom>, StoreError> {
            Ok(Vec::new())
        }
    }

    fn session(store: Arc<dyn MessageStore>, max: u32, window_ms: u64) -> ChatSession {
        let profile = Profile::new("owl", "🦉").unwrap();
        let config = RateLimitConfig::new(max, window_ms).unwrap();
        ChatSession::new(profile, "room1", config, store).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_stores_and_merges() {
        let store = Arc::new(MemoryStore::new());
        let room = store.create_room(NewRoom::new("Tunes", "Music")).await.unwrap();
        let profile = Profile::new("owl", "🦉").unwrap();
        let mut session =
            ChatSession::new(profile, &room.id, RateLimitConfig::default(), store.clone()).unwrap();
        session.refresh().await.unwrap();

        let saved = session.send_message("  hello there ").await.unwrap();
        assert_eq!(saved.content, "hello there");
        assert_eq!(saved.chat_id, room.id);

        assert_eq!(session.view().messages_in(&room.id).count(), 1);
        assert_eq!(session.view().room(&room.id).unwrap().message_count, 1);
        assert_eq!(store.messages(&room.id).await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_content_does_not_use_a_slot() {
        let mut session = session(Arc::new(MemoryStore::new()), 1, 60_000);

        assert!(matches!(
            session.send_message("").await,
            Err(SubmitError::Validation(ValidationError::EmptyContent))
        ));
        assert!(matches!(
            session.send_message("visit www.spam.biz").await,
            Err(SubmitError::Validation(ValidationError::LinkNotAllowed))
        ));
        assert!(!session.is_limited());

        session.send_message("hi").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_content_is_empty_and_does_not_use_a_slot() {
        let store = Arc::new(MemoryStore::new());
        let mut session = session(store.clone(), 1, 60_000);

        assert!(matches!(
            session.send_message("   ").await,
            Err(SubmitError::Validation(ValidationError::EmptyContent))
        ));
        assert!(matches!(
            session.send_message(" \t\n").await,
            Err(SubmitError::Validation(ValidationError::EmptyContent))
        ));
        assert!(store.messages("room1").await.unwrap().is_empty());

        let saved = session.send_message("hi").await.unwrap();
        assert_eq!(saved.content, "hi");
        assert!(!session.is_limited());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_then_cooldown_clears() {
        let mut session = session(Arc::new(MemoryStore::new()), 1, 1000);
        session.send_message("one").await.unwrap();

        let err = session.send_message("two").await.unwrap_err();
        match err {
            SubmitError::RateLimited { message } => assert_eq!(
                message,
                "Too many messages! Please wait 1 seconds before sending another message."
            ),
            other => panic!("unexpected {:?}", other),
        }
        assert!(session.is_limited());
        assert_eq!(session.remaining_time(), 1);

        // paused time auto-advances to the timer
        let event = session.next_event().await.unwrap();
        session.handle_event(event);
        assert!(!session.is_limited());
        assert_eq!(session.remaining_time(), 0);

        // the window has passed and the retry escalates the penalty
        session.send_message("three").await.unwrap();
        assert_eq!(session.current_multiplier(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_cooldown_ignored() {
        let mut session = session(Arc::new(MemoryStore::new()), 1, 1000);
        session.send_message("one").await.unwrap();
        assert!(session.send_message("two").await.is_err());
        assert!(session.send_message("three").await.is_err());

        session.handle_event(SessionEvent::CooldownExpired { generation: 1 });
        assert!(session.is_limited());

        let event = session.next_event().await.unwrap();
        assert_eq!(event, SessionEvent::CooldownExpired { generation: 2 });
        session.handle_event(event);
        assert!(!session.is_limited());

        // the replaced timer was aborted and never fires
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(session.pump_events(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_session_aborts_timer() {
        let mut session = session(Arc::new(MemoryStore::new()), 1, 5000);
        session.send_message("one").await.unwrap();
        assert!(session.send_message("two").await.is_err());

        let abort = session
            .cooldown
            .as_ref()
            .map(|t| t.handle.abort_handle())
            .unwrap();
        assert!(!abort.is_finished());

        drop(session);
        for _ in 0..10 {
            if abort.is_finished() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(abort.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_storage_failure_still_counts() {
        let mut session = session(Arc::new(FailingStore), 1, 60_000);

        let err = session.send_message("hi").await.unwrap_err();
        assert!(matches!(err, SubmitError::Storage(ref e) if e.is_retryable()));
        assert_eq!(err.to_string(), "Failed to send message. Please try again.");

        assert!(matches!(
            session.send_message("hi again").await,
            Err(SubmitError::RateLimited { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_reports_new_messages() {
        let store = Arc::new(MemoryStore::new());
        let room = store.create_room(NewRoom::new("Chess", "Gaming")).await.unwrap();
        let other = Profile::new("fox", "🦊").unwrap();
        store
            .create_message(NewMessage::from_profile(&other, &room.id, "anyone here?"))
            .await
            .unwrap();

        let profile = Profile::new("owl", "🦉").unwrap();
        let mut session =
            ChatSession::new(profile, &room.id, RateLimitConfig::default(), store.clone()).unwrap();

        let unseen = session.refresh().await.unwrap();
        assert_eq!(unseen.len(), 1);
        assert_eq!(session.view().rooms().len(), 1);
        assert!(session.refresh().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_profile_applies_to_next_message() {
        let mut session = session(Arc::new(MemoryStore::new()), 5, 30_000);
        session.send_message("before").await.unwrap();

        let renamed = session.profile().renamed("hawk", "🦅").unwrap();
        session.update_profile(renamed);
        let saved = session.send_message("after").await.unwrap();
        assert_eq!(saved.user_name, "hawk");

        let names: Vec<_> = session
            .view()
            .messages_in("room1")
            .map(|m| m.user_name.as_str())
            .collect();
        assert_eq!(names, ["hawk", "hawk"]);
    }
}
