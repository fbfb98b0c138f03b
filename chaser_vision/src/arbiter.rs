// THEORY:
// The `Arbiter` folds the per-camera decisions of one cycle into the commands that
// actually go out on the wire. It is a small two-mode state machine:
//
//   Tracking  - at least one camera has an opinion. Announce `TargetAcquired`, then
//               send the first opinion in camera order and remember it.
//   Searching - nobody sees anything. Keep repeating the last remembered action and
//               use an idle counter to inject a `Nudge` and, later, an `Align`.
//
// Key architectural principles:
// 1.  **Explicit State**: Everything the arbiter remembers lives in `ArbiterState`,
//     owned by the caller and threaded through `arbitrate`. There is no hidden
//     global.
// 2.  **Order Is Priority**: Camera order is the only tie-breaker. The first
//     non-noop decision wins; the rest are ignored for the cycle.
// 3.  **Counter Only Moves While Searching**: A tracking cycle never touches the idle
//     counter. Only reaching the realign bound resets it.
// 4.  **Noop Is Silent**: `Noop` can be remembered (it is the initial last action)
//     but is never emitted.

use crate::core_modules::command::Command;
use serde::Deserialize;
use tracing::{debug, info};

/// Counter values at which the search behaviour fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Idle count that triggers a `Nudge`.
    pub nudge_at: u32,
    /// Idle count that triggers an `Align` and wraps the counter to zero.
    pub realign_at: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { nudge_at: 4, realign_at: 15 }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.realign_at == 0 {
            return Err("search.realign_at must be greater than 0".to_string());
        }
        if self.nudge_at >= self.realign_at {
            return Err(format!(
                "search.nudge_at ({}) must be below search.realign_at ({})",
                self.nudge_at, self.realign_at
            ));
        }
        Ok(())
    }
}

/// The arbiter's memory between cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArbiterState {
    /// The most recent tracking decision. Starts out as `Noop`.
    pub last_action: Command,
    /// Consecutive searching cycles since the last realign.
    pub idle_counter: u32,
}

/// Whether a cycle saw the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    Tracking,
    Searching,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Arbiter {
    config: SearchConfig,
}

impl Arbiter {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    /// Classifies a cycle without touching any state.
    pub fn mode_of(decisions: &[Command]) -> Report {
        if decisions.iter().any(|d| !d.is_noop()) {
            Report::Tracking
        } else {
            Report::Searching
        }
    }

    /// Returns the commands to transmit this cycle, in order.
    pub fn arbitrate(&self, state: &mut ArbiterState, decisions: &[Command]) -> Vec<Command> {
        if let Some(&first) = decisions.iter().find(|d| !d.is_noop()) {
            if state.last_action != first {
                info!(from = %state.last_action, to = %first, "tracking decision changed");
            }
            state.last_action = first;
            return vec![Command::TargetAcquired, first];
        }

        let mut out = Vec::with_capacity(2);
        if state.idle_counter == self.config.nudge_at {
            debug!(idle = state.idle_counter, "searching: nudge");
            out.push(Command::Nudge);
        }
        if state.idle_counter == self.config.realign_at {
            debug!(idle = state.idle_counter, "searching: realign");
            out.push(Command::Align);
            state.idle_counter = 0;
        }
        state.idle_counter += 1;

        if !state.last_action.is_noop() {
            out.push(state.last_action);
        }
        out
    }
}
