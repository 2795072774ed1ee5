//! Per-floor connection state machine
//!
//! Pure transitions, no I/O. The manager drives one [`FloorLifecycle`] per
//! floor and acts on the [`CloseOutcome`] of every closed socket.

use std::time::Duration;

use serde::Serialize;

/// Connection state of one floor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Known, not yet connecting (e.g. waiting for its stagger slot)
    Idle,
    Connecting,
    Open,
    /// Closed, a reconnect is scheduled
    Reconnecting,
    /// Attempts exhausted; only [`reset`](super::RealtimeManager::reset) revives it
    Failed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exponential backoff: `delay(n) = min(initial * 2^(n-1), max)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max }
    }

    /// Delay before reconnect attempt `attempt` (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.initial.saturating_mul(1u32 << exp).min(self.max)
    }
}

/// What to do after a socket closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Floor removed or manager shut down
    Stop,
    Retry { attempt: u32, delay: Duration },
    Exhausted { attempts: u32 },
}

#[derive(Debug, Clone)]
pub struct FloorLifecycle {
    state: ConnectionState,
    attempts: u32,
    max_attempts: u32,
    backoff: Backoff,
}

impl FloorLifecycle {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            state: ConnectionState::Idle,
            attempts: 0,
            max_attempts,
            backoff,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Whether a new connect may start
    pub fn can_connect(&self) -> bool {
        !matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Open
        ) && !self.is_exhausted()
    }

    pub fn on_connecting(&mut self) {
        self.state = ConnectionState::Connecting;
    }

    /// Successful open resets the counter
    pub fn on_open(&mut self) {
        self.attempts = 0;
        self.state = ConnectionState::Open;
    }

    /// Socket closed or connect failed
    pub fn on_closed(&mut self, keep_going: bool) -> CloseOutcome {
        if !keep_going {
            self.state = ConnectionState::Idle;
            return CloseOutcome::Stop;
        }

        self.attempts = self.attempts.saturating_add(1);
        if self.attempts < self.max_attempts {
            self.state = ConnectionState::Reconnecting;
            CloseOutcome::Retry {
                attempt: self.attempts,
                delay: self.backoff.delay(self.attempts),
            }
        } else {
            self.state = ConnectionState::Failed;
            CloseOutcome::Exhausted {
                attempts: self.attempts,
            }
        }
    }

    /// Manual recovery from `Failed`
    pub fn reset(&mut self) {
        self.attempts = 0;
        if self.state == ConnectionState::Failed {
            self.state = ConnectionState::Idle;
        }
    }
}
