//! Execution identity and run phases

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique execution identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(pub uuid::Uuid);

impl ExecutionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of one supervised process.
///
/// `Pending -> Spawned -> {Completed | TimedOut | Cancelled}`, or
/// `Pending -> SpawnFailed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionPhase {
    Pending,
    Spawned,
    Completed,
    TimedOut,
    Cancelled,
    SpawnFailed,
}

impl ExecutionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionPhase::Pending => "PENDING",
            ExecutionPhase::Spawned => "SPAWNED",
            ExecutionPhase::Completed => "COMPLETED",
            ExecutionPhase::TimedOut => "TIMED_OUT",
            ExecutionPhase::Cancelled => "CANCELLED",
            ExecutionPhase::SpawnFailed => "SPAWN_FAILED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionPhase::Completed
                | ExecutionPhase::TimedOut
                | ExecutionPhase::Cancelled
                | ExecutionPhase::SpawnFailed
        )
    }

    pub fn can_transition_to(self, next: ExecutionPhase) -> bool {
        use ExecutionPhase::*;
        matches!(
            (self, next),
            (Pending, Spawned)
                | (Pending, SpawnFailed)
                | (Spawned, Completed)
                | (Spawned, TimedOut)
                | (Spawned, Cancelled)
        )
    }
}

impl fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the phase of a run and rejects illegal transitions
#[derive(Debug)]
pub struct PhaseTracker {
    phase: ExecutionPhase,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            phase: ExecutionPhase::Pending,
        }
    }

    pub fn phase(&self) -> ExecutionPhase {
        self.phase
    }

    /// Move to `next`. Returns false and keeps the current phase when the
    /// transition is not allowed.
    pub fn advance(&mut self, next: ExecutionPhase) -> bool {
        if !self.phase.can_transition_to(next) {
            tracing::warn!(from = %self.phase, to = %next, "Ignoring invalid phase transition");
            return false;
        }
        tracing::trace!(from = %self.phase, to = %next, "Execution phase changed");
        self.phase = next;
        true
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}
