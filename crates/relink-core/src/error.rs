//! Error types for the relationship engine
//!
//! Every crate below the facade has its own error; [`EngineError`] wraps
//! them so callers handle one type:
//! - input that never reached the store ([`ValidationError`], [`UnknownState`])
//! - illegal lifecycle moves ([`InvalidTransitionError`])
//! - store failures, propagated unchanged ([`StoreError`])
//!
//! Structural graph problems are not errors here; they are reported in
//! `ValidationReport` and `RepairReport`.

use crate::config::ConfigError;
use relink_lifecycle::InvalidTransitionError;
use relink_model::{ProjectId, RecordKind, UnknownState, ValidationError};
use relink_store::StoreError;

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Missing or oversized input fields
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Event not legal from the current lifecycle state
    #[error(transparent)]
    Transition(#[from] InvalidTransitionError),

    /// Lifecycle state name that does not exist
    #[error(transparent)]
    UnknownState(#[from] UnknownState),

    /// Record addressed by id does not exist
    #[error("{kind} {id} not found")]
    NotFound { kind: RecordKind, id: String },

    /// Link between records of different projects
    #[error("cannot link {kind} {id} of project {actual} into project {expected}")]
    CrossProject {
        kind: RecordKind,
        id: String,
        expected: ProjectId,
        actual: ProjectId,
    },

    /// Adapter failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Invalid engine configuration
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EngineError {
    #[inline]
    pub fn not_found(kind: RecordKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Whether retrying the same call may succeed
    ///
    /// Only transient store failures qualify; everything else fails again.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_transient())
    }

    /// Stable machine-readable code for API envelopes
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Transition(_) => "INVALID_TRANSITION",
            Self::UnknownState(_) => "UNKNOWN_STATE",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::CrossProject { .. } => "CROSS_PROJECT_LINK",
            Self::Store(_) => "STORE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }
}
