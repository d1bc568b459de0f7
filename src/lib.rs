//! Anonymous topic-based chat board.
//!
//! Modular structure:
//! - types.rs: Core data structures
//! - rate_limit.rs: Client-side rate limiting with penalty escalation
//! - validation.rs: Message, profile and room checks
//! - session.rs: One chat room view and its send flow
//! - view.rs: Local rooms/messages state
//! - store.rs: Storage trait and in-memory store with snapshots
//! - http_store.rs: Storage over the REST API
//! - api.rs: REST routes
//! - config.rs: Server settings
//! - clock.rs: Millisecond clocks
//! - helpers.rs: Ids and small utilities
//! - error.rs: Error types

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod helpers;
pub mod http_store;
pub mod rate_limit;
pub mod session;
pub mod store;
pub mod types;
pub mod validation;
pub mod view;

pub use error::{ConfigError, RoomError, StoreError, SubmitError, ValidationError};
pub use rate_limit::{RateLimitConfig, RateLimitStatus, RateLimiter};
pub use session::{ChatSession, SessionEvent};
pub use store::{MemoryStore, MessageStore};
pub use validation::validate_message;
