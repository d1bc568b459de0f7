//! Rate limiting for message spam prevention.
//!
//! A sliding window of admitted send instants per chat session. Repeated
//! violations stretch the window by a multiplier (1x, 2x, 4x, 8x) that
//! decays back to 1x after a quiet minute.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::{Clock, TokioClock};
use crate::error::ConfigError;

/// An admitted check this soon after the last violation doubles the multiplier.
pub const ESCALATION_WINDOW_MS: u64 = 10_000;

/// Quiet time after which the multiplier and violation count reset.
pub const DECAY_AFTER_MS: u64 = 60_000;

pub const MAX_MULTIPLIER: u32 = 8;

/// Window settings fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitConfig {
    /// Admitted sends allowed per window.
    pub max_messages: u32,
    /// Base window length before any penalty.
    pub time_window_ms: u64,
}

impl RateLimitConfig {
    pub fn new(max_messages: u32, time_window_ms: u64) -> Result<Self, ConfigError> {
        let config = Self {
            max_messages,
            time_window_ms,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_messages == 0 {
            return Err(ConfigError::ZeroMaxMessages);
        }
        if self.time_window_ms == 0 {
            return Err(ConfigError::ZeroTimeWindow);
        }
        Ok(())
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_messages: 5,
            time_window_ms: 30_000,
        }
    }
}

/// Read-only snapshot handed to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatus {
    pub is_limited: bool,
    /// Whole seconds until the current cooldown ends.
    pub remaining_time: u64,
    pub current_multiplier: u32,
}

impl RateLimitStatus {
    /// User-facing cooldown text.
    pub fn message(&self) -> String {
        let base = format!(
            "Too many messages! Please wait {} seconds before sending another message.",
            self.remaining_time
        );
        if self.current_multiplier > 1 {
            format!(
                "{} (Penalty increased due to repeated violations - {}x cooldown)",
                base, self.current_multiplier
            )
        } else {
            base
        }
    }
}

/// Result of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    /// Rejected; the window frees a slot after `cooldown`.
    Limited { cooldown: Duration },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }
}

/// Per-session limiter with progressive penalty escalation.
#[derive(Debug)]
pub struct RateLimiter<C = TokioClock> {
    config: RateLimitConfig,
    clock: C,
    timestamps: VecDeque<u64>,
    multiplier: u32,
    violation_count: u32,
    last_violation: Option<u64>,
    is_limited: bool,
    remaining_time: u64,
}

impl RateLimiter<TokioClock> {
    pub fn new(config: RateLimitConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, TokioClock::new())
    }
}

impl<C: Clock> RateLimiter<C> {
    pub fn with_clock(config: RateLimitConfig, clock: C) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            clock,
            timestamps: VecDeque::with_capacity(config.max_messages as usize),
            multiplier: 1,
            violation_count: 0,
            last_violation: None,
            is_limited: false,
            remaining_time: 0,
        })
    }

    /// Returns true if the send may proceed, false if rate limited.
    pub fn check_rate_limit(&mut self) -> bool {
        self.check().is_admitted()
    }

    /// Admission check that also reports how long a rejection lasts.
    pub fn check(&mut self) -> Admission {
        let now = self.clock.now_ms();
        let window = self.effective_window_ms();

        // Remove old timestamps outside the stretched window
        self.timestamps.retain(|t| now.saturating_sub(*t) < window);

        if self.timestamps.len() >= self.config.max_messages as usize {
            let oldest = self.timestamps.front().copied().unwrap_or(now);
            let until_reset = window - now.saturating_sub(oldest);

            self.violation_count += 1;
            self.last_violation = Some(now);
            self.is_limited = true;
            self.remaining_time = until_reset.div_ceil(1000);

            debug!(
                violations = self.violation_count,
                multiplier = self.multiplier,
                cooldown_ms = until_reset,
                "message rate limited"
            );
            return Admission::Limited {
                cooldown: Duration::from_millis(until_reset),
            };
        }

        let since_violation = self.last_violation.map(|t| now.saturating_sub(t));
        match since_violation {
            Some(elapsed) if elapsed < ESCALATION_WINDOW_MS && self.violation_count > 0 => {
                let next = (self.multiplier * 2).min(MAX_MULTIPLIER);
                if next != self.multiplier {
                    info!(from = self.multiplier, to = next, "rate limit penalty escalated");
                }
                self.multiplier = next;
            }
            Some(elapsed) if elapsed <= DECAY_AFTER_MS => {}
            _ => {
                if self.multiplier > 1 {
                    debug!("rate limit penalty reset after quiet period");
                }
                self.multiplier = 1;
                self.violation_count = 0;
            }
        }

        self.timestamps.push_back(now);
        Admission::Admitted
    }

    /// Applied when the cooldown timer fires. Leaves the penalty untouched.
    pub fn clear_cooldown(&mut self) {
        self.is_limited = false;
        self.remaining_time = 0;
    }

    pub fn effective_window_ms(&self) -> u64 {
        self.config.time_window_ms * u64::from(self.multiplier)
    }

    pub fn is_limited(&self) -> bool {
        self.is_limited
    }

    pub fn remaining_time(&self) -> u64 {
        self.remaining_time
    }

    pub fn current_multiplier(&self) -> u32 {
        self.multiplier
    }

    pub fn violation_count(&self) -> u32 {
        self.violation_count
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn status(&self) -> RateLimitStatus {
        RateLimitStatus {
            is_limited: self.is_limited,
            remaining_time: self.remaining_time,
            current_multiplier: self.multiplier,
        }
    }

    pub fn rate_limit_message(&self) -> String {
        self.status().message()
    }
}

/// A limiter that several threads may hit. The prune-check-append
/// sequence runs under one lock.
#[derive(Debug)]
pub struct SharedRateLimiter<C = TokioClock> {
    inner: Mutex<RateLimiter<C>>,
}

impl<C: Clock> SharedRateLimiter<C> {
    pub fn new(limiter: RateLimiter<C>) -> Self {
        Self {
            inner: Mutex::new(limiter),
        }
    }

    pub fn check(&self) -> Admission {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .check()
    }

    pub fn check_rate_limit(&self) -> bool {
        self.check().is_admitted()
    }

    pub fn clear_cooldown(&self) {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear_cooldown();
    }

    pub fn status(&self) -> RateLimitStatus {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .status()
    }
}
