use crate::error::InvalidTransitionError;
use relink_model::{RecordKind, TrrStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Events accepted by the TRR review machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrrEvent {
    /// Pending -> InReview
    Submit,
    /// InReview -> Approved
    Approve,
    /// InReview -> Rejected
    Reject,
}

impl TrrEvent {
    pub const ALL: [TrrEvent; 3] = [TrrEvent::Submit, TrrEvent::Approve, TrrEvent::Reject];

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TrrEvent::Submit => "submit",
            TrrEvent::Approve => "approve",
            TrrEvent::Reject => "reject",
        }
    }
}

impl fmt::Display for TrrEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrrEvent {
    type Err = InvalidTransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        TrrEvent::ALL
            .into_iter()
            .find(|e| e.as_str() == needle)
            .ok_or_else(|| InvalidTransitionError::unknown_event(RecordKind::Trr, s))
    }
}

/// Apply `event` to `current`. Approved and Rejected are terminal.
pub fn transition(current: TrrStatus, event: TrrEvent) -> Result<TrrStatus, InvalidTransitionError> {
    use TrrStatus::*;
    match (current, event) {
        (Pending, TrrEvent::Submit) => Ok(InReview),
        (InReview, TrrEvent::Approve) => Ok(Approved),
        (InReview, TrrEvent::Reject) => Ok(Rejected),
        _ => Err(InvalidTransitionError::new(
            RecordKind::Trr,
            current.as_str(),
            event.as_str(),
        )),
    }
}

pub fn allowed_transitions(from: TrrStatus) -> Vec<TrrStatus> {
    TrrEvent::ALL
        .into_iter()
        .filter_map(|event| transition(from, event).ok())
        .collect()
}

/// Event that moves `from` to `to`, if the move is legal
pub fn validate_transition(from: TrrStatus, to: TrrStatus) -> Result<TrrEvent, InvalidTransitionError> {
    TrrEvent::ALL
        .into_iter()
        .find(|event| transition(from, *event).ok() == Some(to))
        .ok_or_else(|| {
            InvalidTransitionError::new(RecordKind::Trr, from.as_str(), format!("move to {to}"))
        })
}
