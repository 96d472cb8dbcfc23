//! Validation and repair reports
//!
//! Structural problems are values, not thrown errors: `validate` and
//! `repair` always return every issue they found.

use crate::links::RefField;
use relink_model::{ProjectId, RecordKind};
use serde::Serialize;
use std::fmt;

/// Reference to a record by kind and raw id
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntityRef {
    pub kind: RecordKind,
    pub id: String,
}

impl EntityRef {
    #[inline]
    #[must_use]
    pub fn new(kind: RecordKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// Classification of a [`ReferenceError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ReferenceErrorKind {
    /// Target does not exist
    Dangling,
    /// Target belongs to another project
    CrossProject,
    /// POV lists a TRR whose `povId` names a different POV
    ConflictingClaim,
    /// Stored document does not decode into its record type
    Malformed,
}

/// Validator-detected reference problem; reported, never silently fixed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("{holder}: {detail}")]
pub struct ReferenceError {
    pub kind: ReferenceErrorKind,
    /// Record carrying the bad reference
    pub holder: EntityRef,
    /// Field carrying it (absent for malformed documents)
    pub field: Option<RefField>,
    pub target: Option<EntityRef>,
    pub detail: String,
}

impl ReferenceError {
    pub(crate) fn dangling(holder: EntityRef, field: RefField, target: EntityRef) -> Self {
        let detail = format!("`{field}` references {target} which does not exist");
        Self {
            kind: ReferenceErrorKind::Dangling,
            holder,
            field: Some(field),
            target: Some(target),
            detail,
        }
    }

    pub(crate) fn cross_project(
        holder: EntityRef,
        field: RefField,
        target: EntityRef,
        target_project: Option<&ProjectId>,
    ) -> Self {
        let detail = match target_project {
            Some(project) => format!("`{field}` references {target} in project {project}"),
            None => format!("`{field}` references {target} outside this project"),
        };
        Self {
            kind: ReferenceErrorKind::CrossProject,
            holder,
            field: Some(field),
            target: Some(target),
            detail,
        }
    }

    pub(crate) fn conflicting_claim(holder: EntityRef, target: EntityRef, claimed_by: &str) -> Self {
        let detail = format!("`trrIds` lists {target}, whose `povId` is {claimed_by}");
        Self {
            kind: ReferenceErrorKind::ConflictingClaim,
            holder,
            field: Some(RefField::POV_TRR_IDS),
            target: Some(target),
            detail,
        }
    }

    pub(crate) fn malformed(holder: EntityRef, reason: impl Into<String>) -> Self {
        Self {
            kind: ReferenceErrorKind::Malformed,
            holder,
            field: None,
            target: None,
            detail: format!("document cannot be decoded: {}", reason.into()),
        }
    }
}

/// Classification of a [`GraphWarning`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WarningKind {
    /// Forward reference exists, back-reference is missing
    MissingBackReference,
    /// `POV.trrIds` lists a TRR whose `povId` is null
    StaleBackReference,
    /// Same id appears more than once in a relationship array
    DuplicateLink,
    /// Scenario linked to no POV
    EmptyScenario,
}

/// Auto-fixable (or informational) asymmetry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphWarning {
    pub kind: WarningKind,
    pub holder: EntityRef,
    pub field: RefField,
    pub target: Option<EntityRef>,
    pub detail: String,
}

impl fmt::Display for GraphWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.holder, self.detail)
    }
}

/// Outcome of validating one project's graph
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub project_id: ProjectId,
    /// True iff `errors` is empty; warnings do not affect validity
    pub valid: bool,
    pub errors: Vec<ReferenceError>,
    pub warnings: Vec<GraphWarning>,
}

impl ValidationReport {
    #[must_use]
    pub fn new(
        project_id: ProjectId,
        errors: Vec<ReferenceError>,
        warnings: Vec<GraphWarning>,
    ) -> Self {
        Self {
            project_id,
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// Number of errors of `kind`
    #[must_use]
    pub fn count_errors(&self, kind: ReferenceErrorKind) -> usize {
        self.errors.iter().filter(|e| e.kind == kind).count()
    }

    /// Number of warnings of `kind`
    #[must_use]
    pub fn count_warnings(&self, kind: WarningKind) -> usize {
        self.warnings.iter().filter(|w| w.kind == kind).count()
    }
}

/// Both sides of a relationship claim authority and disagree
///
/// Left for operator review; repair never picks a winner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("conflicting link between {left} and {right}: {detail}")]
pub struct RepairConflictError {
    pub left: EntityRef,
    pub right: EntityRef,
    pub detail: String,
}

/// Issue left unresolved by a repair pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RepairIssue {
    Conflict(RepairConflictError),
    Unresolved(ReferenceError),
}

impl fmt::Display for RepairIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepairIssue::Conflict(c) => write!(f, "{c}"),
            RepairIssue::Unresolved(e) => write!(f, "{e}"),
        }
    }
}

/// Outcome of one repair pass
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairReport {
    pub project_id: ProjectId,
    /// Writes that changed stored state
    pub fixed: usize,
    pub errors: Vec<RepairIssue>,
    /// Validation of the graph after the pass
    pub after: ValidationReport,
}

impl RepairReport {
    #[must_use]
    pub fn conflicts(&self) -> impl Iterator<Item = &RepairConflictError> {
        self.errors.iter().filter_map(|issue| match issue {
            RepairIssue::Conflict(c) => Some(c),
            RepairIssue::Unresolved(_) => None,
        })
    }
}
