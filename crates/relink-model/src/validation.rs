//! Field validation for new records
//!
//! Validation happens once, when a draft becomes a record. Downstream code
//! trusts the typed record and never re-checks these rules.

use crate::ids::ProjectId;
use crate::record::RecordKind;
use serde::{Deserialize, Serialize};

/// Rejection of malformed or incomplete input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Required field absent or blank
    #[error("{kind} is missing required field `{field}`")]
    MissingField {
        kind: RecordKind,
        field: &'static str,
    },

    /// Field longer than the configured limit
    #[error("{kind} field `{field}` is {len} characters (limit {max})")]
    TooLong {
        kind: RecordKind,
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// Owning project does not exist
    #[error("project {0} does not exist")]
    UnknownProject(ProjectId),
}

/// Length limits applied to free-text fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationLimits {
    /// Max characters for titles and names
    pub max_title_len: usize,
    /// Max characters for descriptions
    pub max_description_len: usize,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_title_len: 200,
            max_description_len: 2000,
        }
    }
}

/// Require a non-blank field within `max` characters
pub(crate) fn require_text(
    kind: RecordKind,
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField { kind, field });
    }
    check_len(kind, field, value, max)
}

/// Check an optional field against `max` characters
pub(crate) fn optional_text(
    kind: RecordKind,
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<(), ValidationError> {
    match value {
        Some(v) => check_len(kind, field, v, max),
        None => Ok(()),
    }
}

fn check_len(
    kind: RecordKind,
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<(), ValidationError> {
    let len = value.trim().chars().count();
    if len > max {
        Err(ValidationError::TooLong {
            kind,
            field,
            len,
            max,
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_required_field_is_missing() {
        let err = require_text(RecordKind::Pov, "title", "   ", 10).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingField {
                kind: RecordKind::Pov,
                field: "title"
            }
        );
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        assert!(require_text(RecordKind::Trr, "title", "ééé", 3).is_ok());
        assert!(matches!(
            require_text(RecordKind::Trr, "title", "éééé", 3),
            Err(ValidationError::TooLong { len: 4, max: 3, .. })
        ));
    }

    #[test]
    fn error_message_names_kind_and_field() {
        let err = ValidationError::MissingField {
            kind: RecordKind::Pov,
            field: "title",
        };
        assert_eq!(err.to_string(), "POV is missing required field `title`");
    }
}
