//! Engagement records
//!
//! The four record shapes persisted by the engine, plus the lifecycle enums
//! they carry. Documents are stored as camelCase JSON; relationship arrays
//! are decoded as ordered `Vec`s so duplicates in stored data stay visible.

use crate::ids::{PovId, ProjectId, ScenarioId, TrrId};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Record kind discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Project,
    Pov,
    Trr,
    Scenario,
}

impl RecordKind {
    /// Human-readable label
    #[inline]
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            RecordKind::Project => "Project",
            RecordKind::Pov => "POV",
            RecordKind::Trr => "TRR",
            RecordKind::Scenario => "Scenario",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Implemented by every record type persisted in the document store
pub trait StoredRecord: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Kind of this record
    const KIND: RecordKind;

    /// Raw id of this record
    fn record_id(&self) -> &str;
}

/// Project status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProjectStatus {
    #[default]
    Active,
    OnHold,
    Completed,
}

/// POV phase, in lifecycle order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum PovPhase {
    #[default]
    Planning,
    Discovery,
    Execution,
    Validation,
    Completion,
}

impl PovPhase {
    /// All phases in order
    pub const ALL: [PovPhase; 5] = [
        PovPhase::Planning,
        PovPhase::Discovery,
        PovPhase::Execution,
        PovPhase::Validation,
        PovPhase::Completion,
    ];

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PovPhase::Planning => "Planning",
            PovPhase::Discovery => "Discovery",
            PovPhase::Execution => "Execution",
            PovPhase::Validation => "Validation",
            PovPhase::Completion => "Completion",
        }
    }

    /// Whether no further transition is possible
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, PovPhase::Completion)
    }
}

impl fmt::Display for PovPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// TRR review status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TrrStatus {
    #[default]
    Pending,
    InReview,
    Approved,
    Rejected,
}

impl TrrStatus {
    pub const ALL: [TrrStatus; 4] = [
        TrrStatus::Pending,
        TrrStatus::InReview,
        TrrStatus::Approved,
        TrrStatus::Rejected,
    ];

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TrrStatus::Pending => "Pending",
            TrrStatus::InReview => "InReview",
            TrrStatus::Approved => "Approved",
            TrrStatus::Rejected => "Rejected",
        }
    }

    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TrrStatus::Approved | TrrStatus::Rejected)
    }
}

impl fmt::Display for TrrStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing a lifecycle state name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} state `{value}`")]
pub struct UnknownState {
    pub kind: RecordKind,
    pub value: String,
}

impl FromStr for TrrStatus {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        TrrStatus::ALL
            .into_iter()
            .find(|status| status.as_str().to_ascii_lowercase() == normalized)
            .ok_or_else(|| UnknownState {
                kind: RecordKind::Trr,
                value: s.to_string(),
            })
    }
}

impl FromStr for PovPhase {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PovPhase::ALL
            .into_iter()
            .find(|phase| phase.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownState {
                kind: RecordKind::Pov,
                value: s.to_string(),
            })
    }
}

/// Project: scopes every other record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub customer: String,
    #[serde(default)]
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Proof of Value engagement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pov {
    pub id: PovId,
    pub project_id: ProjectId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Template category used by auto-population
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub phase: PovPhase,
    #[serde(default)]
    pub trr_ids: Vec<TrrId>,
    #[serde(default)]
    pub scenario_ids: Vec<ScenarioId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Technical Risk Review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trr {
    pub id: TrrId,
    pub project_id: ProjectId,
    /// Authoritative side of the POV <-> TRR link
    #[serde(default)]
    pub pov_id: Option<PovId>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Auto-population template this review satisfies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_key: Option<String>,
    #[serde(default)]
    pub status: TrrStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Demo/test scenario shared between POVs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub id: ScenarioId,
    pub project_id: ProjectId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub pov_ids: Vec<PovId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredRecord for Project {
    const KIND: RecordKind = RecordKind::Project;

    fn record_id(&self) -> &str {
        self.id.as_str()
    }
}

impl StoredRecord for Pov {
    const KIND: RecordKind = RecordKind::Pov;

    fn record_id(&self) -> &str {
        self.id.as_str()
    }
}

impl StoredRecord for Trr {
    const KIND: RecordKind = RecordKind::Trr;

    fn record_id(&self) -> &str {
        self.id.as_str()
    }
}

impl StoredRecord for Scenario {
    const KIND: RecordKind = RecordKind::Scenario;

    fn record_id(&self) -> &str {
        self.id.as_str()
    }
}

/// Any engagement record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Record {
    Project(Project),
    Pov(Pov),
    Trr(Trr),
    Scenario(Scenario),
}

impl Record {
    #[inline]
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Project(_) => RecordKind::Project,
            Record::Pov(_) => RecordKind::Pov,
            Record::Trr(_) => RecordKind::Trr,
            Record::Scenario(_) => RecordKind::Scenario,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Record::Project(p) => p.id.as_str(),
            Record::Pov(p) => p.id.as_str(),
            Record::Trr(t) => t.id.as_str(),
            Record::Scenario(s) => s.id.as_str(),
        }
    }

    /// Owning project (a project owns itself)
    #[inline]
    #[must_use]
    pub fn project_id(&self) -> &ProjectId {
        match self {
            Record::Project(p) => &p.id,
            Record::Pov(p) => &p.project_id,
            Record::Trr(t) => &t.project_id,
            Record::Scenario(s) => &s.project_id,
        }
    }

    /// Decode a stored document of the given kind
    ///
    /// # Errors
    /// Returns the serde error if the document does not match the record shape
    pub fn decode(kind: RecordKind, doc: serde_json::Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            RecordKind::Project => Record::Project(serde_json::from_value(doc)?),
            RecordKind::Pov => Record::Pov(serde_json::from_value(doc)?),
            RecordKind::Trr => Record::Trr(serde_json::from_value(doc)?),
            RecordKind::Scenario => Record::Scenario(serde_json::from_value(doc)?),
        })
    }
}

impl From<Project> for Record {
    fn from(value: Project) -> Self {
        Record::Project(value)
    }
}

impl From<Pov> for Record {
    fn from(value: Pov) -> Self {
        Record::Pov(value)
    }
}

impl From<Trr> for Record {
    fn from(value: Trr) -> Self {
        Record::Trr(value)
    }
}

impl From<Scenario> for Record {
    fn from(value: Scenario) -> Self {
        Record::Scenario(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pov_document_uses_camel_case() {
        let now = Utc::now();
        let pov = Pov {
            id: PovId::from("pov-1"),
            project_id: ProjectId::from("p1"),
            title: "Zero Trust POV".to_string(),
            description: None,
            category: None,
            phase: PovPhase::Planning,
            trr_ids: vec![TrrId::from("trr-1")],
            scenario_ids: vec![],
            created_at: now,
            updated_at: now,
            updated_by: None,
            completed_at: None,
        };

        let doc = serde_json::to_value(&pov).unwrap();
        assert_eq!(doc["projectId"], json!("p1"));
        assert_eq!(doc["phase"], json!("Planning"));
        assert_eq!(doc["trrIds"], json!(["trr-1"]));
        assert!(doc.get("completedAt").is_none());
    }

    #[test]
    fn unlinked_trr_keeps_null_pov_id() {
        let now = Utc::now();
        let trr = Trr {
            id: TrrId::from("trr-1"),
            project_id: ProjectId::from("p1"),
            pov_id: None,
            title: "Security Assessment".to_string(),
            description: None,
            template_key: None,
            status: TrrStatus::Pending,
            created_at: now,
            updated_at: now,
            updated_by: None,
            completed_at: None,
        };

        let doc = serde_json::to_value(&trr).unwrap();
        assert_eq!(doc["povId"], serde_json::Value::Null);
    }

    #[test]
    fn duplicate_links_survive_decoding() {
        let doc = json!({
            "id": "s1",
            "projectId": "p1",
            "title": "Lateral movement demo",
            "povIds": ["a", "a"],
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z",
        });
        let record = Record::decode(RecordKind::Scenario, doc).unwrap();
        match record {
            Record::Scenario(s) => assert_eq!(s.pov_ids.len(), 2),
            other => panic!("expected scenario, got {:?}", other.kind()),
        }
    }

    #[test]
    fn decode_rejects_unknown_phase() {
        let doc = json!({
            "id": "pov-1",
            "projectId": "p1",
            "title": "x",
            "phase": "Launched",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z",
        });
        assert!(Record::decode(RecordKind::Pov, doc).is_err());
    }

    #[test]
    fn status_parsing_is_lenient_about_separators() {
        assert_eq!("in_review".parse::<TrrStatus>().unwrap(), TrrStatus::InReview);
        assert_eq!("InReview".parse::<TrrStatus>().unwrap(), TrrStatus::InReview);
        assert_eq!("approved".parse::<TrrStatus>().unwrap(), TrrStatus::Approved);
        assert!("shipped".parse::<TrrStatus>().is_err());
        assert_eq!("discovery".parse::<PovPhase>().unwrap(), PovPhase::Discovery);
    }
}
