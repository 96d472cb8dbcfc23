use crate::error::InvalidTransitionError;
use relink_model::{PovPhase, RecordKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Events accepted by the POV phase machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PovEvent {
    /// Move to the next phase
    Advance,
}

impl PovEvent {
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PovEvent::Advance => "advance",
        }
    }
}

impl fmt::Display for PovEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PovEvent {
    type Err = InvalidTransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "advance" | "next" => Ok(PovEvent::Advance),
            other => Err(InvalidTransitionError::unknown_event(RecordKind::Pov, other)),
        }
    }
}

/// Phase reached by advancing from `from`, if any
///
/// The phase graph is linear: Planning, Discovery, Execution, Validation,
/// Completion.
#[must_use]
pub fn next_phase(from: PovPhase) -> Option<PovPhase> {
    use PovPhase::*;
    match from {
        Planning => Some(Discovery),
        Discovery => Some(Execution),
        Execution => Some(Validation),
        Validation => Some(Completion),
        Completion => None,
    }
}

pub fn allowed_transitions(from: PovPhase) -> Vec<PovPhase> {
    next_phase(from).into_iter().collect()
}

/// Validates a phase change. Skipping phases is never allowed.
pub fn validate_transition(from: PovPhase, to: PovPhase) -> Result<(), InvalidTransitionError> {
    if next_phase(from) == Some(to) {
        Ok(())
    } else {
        Err(InvalidTransitionError::new(
            RecordKind::Pov,
            from.as_str(),
            format!("move to {to}"),
        ))
    }
}

/// Apply `event` to `current`
pub fn transition(current: PovPhase, event: PovEvent) -> Result<PovPhase, InvalidTransitionError> {
    match event {
        PovEvent::Advance => next_phase(current).ok_or_else(|| {
            InvalidTransitionError::new(RecordKind::Pov, current.as_str(), event.as_str())
        }),
    }
}
