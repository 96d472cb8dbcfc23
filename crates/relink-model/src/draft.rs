//! Input shapes for new records
//!
//! A draft carries only caller-supplied fields. [`Draft::validate`] checks
//! it against [`ValidationLimits`]; `into_record` then fills in the id,
//! owning project, default lifecycle state and timestamps.

use crate::ids::{PovId, ProjectId, ScenarioId, TrrId};
use crate::record::{
    Pov, PovPhase, Project, ProjectStatus, RecordKind, Scenario, Trr, TrrStatus,
};
use crate::validation::{optional_text, require_text, ValidationError, ValidationLimits};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Common behaviour of record drafts
pub trait Draft {
    /// Kind of record the draft produces
    const KIND: RecordKind;

    /// Check required fields and length limits
    ///
    /// # Errors
    /// Returns the first [`ValidationError`] found
    fn validate(&self, limits: &ValidationLimits) -> Result<(), ValidationError>;
}

/// Fields for a new project
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub name: String,
    pub customer: String,
}

impl NewProject {
    #[must_use]
    pub fn new(name: impl Into<String>, customer: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            customer: customer.into(),
        }
    }

    #[must_use]
    pub fn into_record(self, id: ProjectId, now: DateTime<Utc>) -> Project {
        Project {
            id,
            name: self.name.trim().to_string(),
            customer: self.customer.trim().to_string(),
            status: ProjectStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Draft for NewProject {
    const KIND: RecordKind = RecordKind::Project;

    fn validate(&self, limits: &ValidationLimits) -> Result<(), ValidationError> {
        require_text(Self::KIND, "name", &self.name, limits.max_title_len)?;
        require_text(Self::KIND, "customer", &self.customer, limits.max_title_len)
    }
}

/// Fields for a new POV
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPov {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl NewPov {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn into_record(self, id: PovId, project_id: ProjectId, now: DateTime<Utc>) -> Pov {
        Pov {
            id,
            project_id,
            title: self.title.trim().to_string(),
            description: normalize(self.description),
            category: normalize(self.category),
            phase: PovPhase::Planning,
            trr_ids: Vec::new(),
            scenario_ids: Vec::new(),
            created_at: now,
            updated_at: now,
            updated_by: None,
            completed_at: None,
        }
    }
}

impl Draft for NewPov {
    const KIND: RecordKind = RecordKind::Pov;

    fn validate(&self, limits: &ValidationLimits) -> Result<(), ValidationError> {
        require_text(Self::KIND, "title", &self.title, limits.max_title_len)?;
        optional_text(
            Self::KIND,
            "description",
            self.description.as_deref(),
            limits.max_description_len,
        )?;
        optional_text(
            Self::KIND,
            "category",
            self.category.as_deref(),
            limits.max_title_len,
        )
    }
}

/// Fields for a new TRR
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTrr {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub template_key: Option<String>,
}

impl NewTrr {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_template_key(mut self, key: impl Into<String>) -> Self {
        self.template_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn into_record(
        self,
        id: TrrId,
        project_id: ProjectId,
        pov_id: Option<PovId>,
        now: DateTime<Utc>,
    ) -> Trr {
        Trr {
            id,
            project_id,
            pov_id,
            title: self.title.trim().to_string(),
            description: normalize(self.description),
            template_key: normalize(self.template_key),
            status: TrrStatus::Pending,
            created_at: now,
            updated_at: now,
            updated_by: None,
            completed_at: None,
        }
    }
}

impl Draft for NewTrr {
    const KIND: RecordKind = RecordKind::Trr;

    fn validate(&self, limits: &ValidationLimits) -> Result<(), ValidationError> {
        require_text(Self::KIND, "title", &self.title, limits.max_title_len)?;
        optional_text(
            Self::KIND,
            "description",
            self.description.as_deref(),
            limits.max_description_len,
        )
    }
}

/// Fields for a new scenario
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewScenario {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub pov_ids: Vec<PovId>,
}

impl NewScenario {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_pov(mut self, pov_id: PovId) -> Self {
        self.pov_ids.push(pov_id);
        self
    }

    /// Build the record; duplicate POV ids collapse to one
    #[must_use]
    pub fn into_record(self, id: ScenarioId, project_id: ProjectId, now: DateTime<Utc>) -> Scenario {
        let mut pov_ids: Vec<PovId> = Vec::with_capacity(self.pov_ids.len());
        for pov_id in self.pov_ids {
            if !pov_ids.contains(&pov_id) {
                pov_ids.push(pov_id);
            }
        }
        Scenario {
            id,
            project_id,
            title: self.title.trim().to_string(),
            description: normalize(self.description),
            pov_ids,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Draft for NewScenario {
    const KIND: RecordKind = RecordKind::Scenario;

    fn validate(&self, limits: &ValidationLimits) -> Result<(), ValidationError> {
        require_text(Self::KIND, "title", &self.title, limits.max_title_len)?;
        optional_text(
            Self::KIND,
            "description",
            self.description.as_deref(),
            limits.max_description_len,
        )
    }
}

// Blank optional text is stored as absent
fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pov_draft_requires_title() {
        let limits = ValidationLimits::default();
        assert!(NewPov::new("Zero Trust POV").validate(&limits).is_ok());
        assert!(matches!(
            NewPov::new("").validate(&limits),
            Err(ValidationError::MissingField { field: "title", .. })
        ));
    }

    #[test]
    fn oversized_description_is_rejected() {
        let limits = ValidationLimits {
            max_title_len: 50,
            max_description_len: 5,
        };
        let draft = NewTrr::new("Security Assessment").with_description("far too long");
        assert!(matches!(
            draft.validate(&limits),
            Err(ValidationError::TooLong {
                field: "description",
                ..
            })
        ));
    }

    #[test]
    fn project_requires_customer() {
        let limits = ValidationLimits::default();
        let err = NewProject::new("P1", " ").validate(&limits).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::MissingField {
                field: "customer",
                ..
            }
        ));
    }

    #[test]
    fn new_records_start_in_default_state() {
        let now = Utc::now();
        let pov = NewPov::new("  Zero Trust POV ")
            .with_category(" ")
            .into_record(PovId::generate(), ProjectId::from("p1"), now);
        assert_eq!(pov.phase, PovPhase::Planning);
        assert_eq!(pov.title, "Zero Trust POV");
        assert_eq!(pov.category, None);
        assert_eq!(pov.created_at, pov.updated_at);

        let trr = NewTrr::new("Security Assessment").into_record(
            TrrId::generate(),
            ProjectId::from("p1"),
            None,
            now,
        );
        assert_eq!(trr.status, TrrStatus::Pending);
        assert!(trr.completed_at.is_none());
    }

    #[test]
    fn scenario_pov_ids_are_deduplicated() {
        let pov = PovId::from("pov-1");
        let scenario = NewScenario::new("Ransomware drill")
            .with_pov(pov.clone())
            .with_pov(pov.clone())
            .into_record(ScenarioId::generate(), ProjectId::from("p1"), Utc::now());
        assert_eq!(scenario.pov_ids, vec![pov]);
    }
}
