//! Serialization gate: at most one evi process in flight.
//!
//! Every feature (completion, hover, definition, diagnostics) shares one gate
//! through the bridge. Waiters queue on an async mutex and give up after a
//! bounded wait with [`LintError::GateTimeout`].

use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::error::LintError;

pub const DEFAULT_GATE_WAIT: Duration = Duration::from_millis(3000);

pub struct SerializationGate {
    slot: Mutex<()>,
    wait: Duration,
}

/// Held while an evi invocation is outstanding. Dropping it opens the gate.
pub struct GatePermit<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl SerializationGate {
    pub fn new(wait: Duration) -> Self {
        Self {
            slot: Mutex::new(()),
            wait,
        }
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }

    pub async fn acquire(&self) -> Result<GatePermit<'_>, LintError> {
        match tokio::time::timeout(self.wait, self.slot.lock()).await {
            Ok(guard) => Ok(GatePermit { _guard: guard }),
            Err(_) => {
                debug!(wait = ?self.wait, "gate wait timed out");
                Err(LintError::GateTimeout(self.wait))
            }
        }
    }

    /// Whether an invocation currently holds the gate.
    pub fn is_busy(&self) -> bool {
        self.slot.try_lock().is_err()
    }
}

impl Default for SerializationGate {
    fn default() -> Self {
        Self::new(DEFAULT_GATE_WAIT)
    }
}
