//! Relink Lifecycle
//!
//! Pure state machines for engagement records:
//! - [`pov`]: `Planning -> Discovery -> Execution -> Validation -> Completion`
//! - [`trr`]: `Pending -submit-> InReview -approve|reject-> Approved|Rejected`
//!
//! Nothing here touches the store. The engine loads the current state,
//! asks the machine for the next one and persists a [`Transition`].

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
pub mod pov;
pub mod trr;

pub use error::InvalidTransitionError;
pub use pov::PovEvent;
pub use trr::TrrEvent;

use chrono::{DateTime, Utc};
use relink_model::{PovPhase, TrrStatus};
use serde::Serialize;

/// States that can end a lifecycle
pub trait LifecycleState: Copy + PartialEq {
    fn is_terminal(&self) -> bool;
}

impl LifecycleState for PovPhase {
    fn is_terminal(&self) -> bool {
        PovPhase::is_terminal(self)
    }
}

impl LifecycleState for TrrStatus {
    fn is_terminal(&self) -> bool {
        TrrStatus::is_terminal(self)
    }
}

/// A legal state change, ready to be persisted
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition<S> {
    pub from: S,
    pub to: S,
    pub actor_id: String,
    pub at: DateTime<Utc>,
}

impl<S: LifecycleState> Transition<S> {
    #[must_use]
    pub fn new(from: S, to: S, actor_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            from,
            to,
            actor_id: actor_id.into(),
            at,
        }
    }

    /// `completedAt` to stamp, set only when entering a terminal state
    #[inline]
    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        (self.to.is_terminal() && !self.from.is_terminal()).then_some(self.at)
    }
}

/// Advance a POV one phase
///
/// # Errors
/// Returns [`InvalidTransitionError`] from the terminal phase
pub fn advance_pov(
    current: PovPhase,
    actor_id: &str,
    at: DateTime<Utc>,
) -> Result<Transition<PovPhase>, InvalidTransitionError> {
    let next = pov::transition(current, PovEvent::Advance)?;
    Ok(Transition::new(current, next, actor_id, at))
}

/// Apply a review event to a TRR
///
/// # Errors
/// Returns [`InvalidTransitionError`] if `event` is not legal from `current`
pub fn apply_trr_event(
    current: TrrStatus,
    event: TrrEvent,
    actor_id: &str,
    at: DateTime<Utc>,
) -> Result<Transition<TrrStatus>, InvalidTransitionError> {
    let next = trr::transition(current, event)?;
    Ok(Transition::new(current, next, actor_id, at))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entering_terminal_state_stamps_completion() {
        let now = Utc::now();
        let t = apply_trr_event(TrrStatus::InReview, TrrEvent::Approve, "alice", now).unwrap();
        assert_eq!(t.completed_at(), Some(now));

        let t = apply_trr_event(TrrStatus::Pending, TrrEvent::Submit, "alice", now).unwrap();
        assert_eq!(t.completed_at(), None);
    }

    #[test]
    fn pov_completion_stamps_completion() {
        let now = Utc::now();
        let t = advance_pov(PovPhase::Validation, "bob", now).unwrap();
        assert_eq!(t.to, PovPhase::Completion);
        assert_eq!(t.completed_at(), Some(now));
        assert_eq!(t.actor_id, "bob");
    }

    #[test]
    fn completed_pov_cannot_advance() {
        let err = advance_pov(PovPhase::Completion, "bob", Utc::now()).unwrap_err();
        assert_eq!(err.from, "Completion");
    }
}
