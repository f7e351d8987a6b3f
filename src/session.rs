//! Session lifecycle: Idle -> Active -> TimedOut -> (reopen) Active.
//!
//! The controller itself is clock-free: every transition takes the current
//! instant, so the timers that drive it live in [`crate::widget`].

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::greeting::time_of_day_greeting;
use crate::message::Message;

/// Upper bound on the watchdog period, so huge timeouts still wake up
/// regularly.
pub const MAX_CHECK_INTERVAL: Duration = Duration::from_millis(60_000);
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_millis(180_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Active,
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub inactivity_timeout: Duration,
    /// Replaces the time-of-day greeting when set.
    pub greeting_override: Option<String>,
    pub user_name: Option<String>,
    /// Seed the log with a bot greeting message on activation.
    pub seed_greeting: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
            greeting_override: None,
            user_name: None,
            seed_greeting: true,
        }
    }
}

/// Outcome of an Idle/TimedOut -> Active transition.
#[derive(Debug, Clone)]
pub struct Activation {
    pub greeting: String,
    pub seed: Option<Message>,
}

#[derive(Debug)]
pub struct SessionController {
    settings: SessionSettings,
    status: SessionStatus,
    last_activity_at: Instant,
    greeting: String,
    timed_out_flag: bool,
}

impl SessionController {
    pub fn new(settings: SessionSettings, now: Instant) -> Self {
        Self {
            settings,
            status: SessionStatus::Idle,
            last_activity_at: now,
            greeting: String::new(),
            timed_out_flag: false,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Empty unless the session is active.
    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    /// Display flag raised by a timeout and cleared by any interaction.
    pub fn timed_out(&self) -> bool {
        self.timed_out_flag
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn last_activity_at(&self) -> Instant {
        self.last_activity_at
    }

    pub fn inactivity_timeout(&self) -> Duration {
        self.settings.inactivity_timeout
    }

    pub fn check_interval(&self) -> Duration {
        self.settings
            .inactivity_timeout
            .min(MAX_CHECK_INTERVAL)
            .max(Duration::from_millis(1))
    }

    /// Enters Active from Idle or TimedOut. Returns `None` when already active.
    pub fn activate(&mut self, now: Instant) -> Option<Activation> {
        if self.status == SessionStatus::Active {
            return None;
        }

        let greeting = match &self.settings.greeting_override {
            Some(text) if !text.trim().is_empty() => text.clone(),
            _ => time_of_day_greeting(self.settings.user_name.as_deref()),
        };
        let seed = self
            .settings
            .seed_greeting
            .then(|| Message::greeting(greeting.clone()));

        tracing::debug!(from = ?self.status, "chat session activated");
        self.status = SessionStatus::Active;
        self.last_activity_at = now;
        self.timed_out_flag = false;
        self.greeting = greeting.clone();

        Some(Activation { greeting, seed })
    }

    pub fn clear_timeout_flag(&mut self) {
        self.timed_out_flag = false;
    }

    /// Debounced activity: pushes the inactivity deadline forward.
    pub fn record_activity(&mut self, now: Instant) {
        self.timed_out_flag = false;
        if self.status == SessionStatus::Active {
            self.last_activity_at = now;
        }
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity_at)
    }

    /// Active -> TimedOut once the inactivity window has elapsed. Returns true
    /// only on the call that performs the transition; the caller then clears
    /// the conversation.
    pub fn check_timeout(&mut self, now: Instant) -> bool {
        if self.status != SessionStatus::Active {
            return false;
        }
        let idle = self.idle_for(now);
        if idle < self.settings.inactivity_timeout {
            return false;
        }

        tracing::info!(
            idle_ms = idle.as_millis() as u64,
            timeout_ms = self.settings.inactivity_timeout.as_millis() as u64,
            "chat session closed due to inactivity"
        );
        self.status = SessionStatus::TimedOut;
        self.greeting.clear();
        self.timed_out_flag = true;
        true
    }
}
