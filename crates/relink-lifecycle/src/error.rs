use relink_model::RecordKind;

/// Lifecycle event not legal from the current state; state is unchanged
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} transition: cannot {attempted} from {from}")]
pub struct InvalidTransitionError {
    pub kind: RecordKind,
    /// State the record was in, or `"?"` when the event itself is unknown
    pub from: String,
    pub attempted: String,
}

impl InvalidTransitionError {
    pub fn new(kind: RecordKind, from: impl Into<String>, attempted: impl Into<String>) -> Self {
        Self {
            kind,
            from: from.into(),
            attempted: attempted.into(),
        }
    }

    pub(crate) fn unknown_event(kind: RecordKind, event: &str) -> Self {
        Self::new(kind, "?", format!("apply unknown event `{event}`"))
    }
}
