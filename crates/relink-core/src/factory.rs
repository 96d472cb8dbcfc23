//! Record factory
//!
//! The only place records are created. A create is two writes at most:
//! the record itself, then the parent's back-reference. The second write is
//! best-effort: its outcome is reported as a [`LinkWrite`], never as an
//! error, and a missed link is left to repair.

use crate::error::EngineError;
use chrono::Utc;
use relink_graph::{LinkField, RelationshipIndex};
use relink_model::{
    Draft, NewPov, NewProject, NewScenario, NewTrr, Pov, PovId, Project, ProjectId, RecordKind,
    Scenario, ScenarioId, Trr, TrrId, ValidationError, ValidationLimits,
};
use relink_store::{typed, Collection, EntityStore};
use serde::Serialize;
use std::sync::Arc;

/// Outcome of the best-effort back-reference write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LinkWrite {
    /// No parent, or relationships disabled for this call
    NotRequested,
    Written,
    /// Parent missing or in another project; record keeps the reference
    Skipped,
    /// Back-reference write failed; state unknown until the next repair
    Uncertain,
}

impl LinkWrite {
    /// Aggregate over several parents; the least certain outcome wins
    #[must_use]
    pub fn combine(self, other: LinkWrite) -> LinkWrite {
        self.max(other)
    }
}

/// Per-call create options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOptions {
    /// Write the parent's back-reference after the record
    pub create_relationships: bool,
}

impl CreateOptions {
    #[inline]
    #[must_use]
    pub fn linked() -> Self {
        Self {
            create_relationships: true,
        }
    }

    #[inline]
    #[must_use]
    pub fn unlinked() -> Self {
        Self {
            create_relationships: false,
        }
    }
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self::linked()
    }
}

/// A persisted record and what happened to its back-references
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Created<T> {
    pub id: T,
    pub link: LinkWrite,
}

/// Validating record constructor
#[derive(Clone)]
pub struct RecordFactory {
    store: Arc<dyn EntityStore>,
    index: RelationshipIndex,
    limits: ValidationLimits,
}

impl std::fmt::Debug for RecordFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordFactory")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl RecordFactory {
    #[must_use]
    pub fn new(store: Arc<dyn EntityStore>, limits: ValidationLimits) -> Self {
        let index = RelationshipIndex::new(store.clone());
        Self {
            store,
            index,
            limits,
        }
    }

    pub async fn create_project(&self, draft: NewProject) -> Result<Project, EngineError> {
        draft.validate(&self.limits)?;
        let project = draft.into_record(ProjectId::generate(), Utc::now());
        typed::insert(self.store.as_ref(), &project).await?;
        tracing::info!(project = %project.id, name = %project.name, "project created");
        Ok(project)
    }

    pub async fn create_pov(&self, draft: NewPov, project_id: &ProjectId) -> Result<Pov, EngineError> {
        draft.validate(&self.limits)?;
        self.require_project(project_id).await?;

        let pov = draft.into_record(PovId::generate(), project_id.clone(), Utc::now());
        typed::insert(self.store.as_ref(), &pov).await?;
        tracing::info!(project = %project_id, pov = %pov.id, "pov created");
        Ok(pov)
    }

    /// Create a TRR, optionally linked to `pov_id`
    ///
    /// `TRR.povId` is always persisted as given. The POV's `trrIds` is only
    /// written when relationships are requested and the POV exists in the
    /// same project.
    pub async fn create_trr(
        &self,
        draft: NewTrr,
        project_id: &ProjectId,
        pov_id: Option<PovId>,
        options: CreateOptions,
    ) -> Result<(Trr, LinkWrite), EngineError> {
        draft.validate(&self.limits)?;
        self.require_project(project_id).await?;

        let parent_ok = match (&pov_id, options.create_relationships) {
            (Some(pov_id), true) => Some(self.parent_in_project(RecordKind::Pov, pov_id.as_str(), project_id).await?),
            _ => None,
        };

        let trr = draft.into_record(TrrId::generate(), project_id.clone(), pov_id, Utc::now());
        typed::insert(self.store.as_ref(), &trr).await?;
        tracing::info!(project = %project_id, trr = %trr.id, pov = ?trr.pov_id, "trr created");

        let link = match (&trr.pov_id, parent_ok) {
            (Some(pov_id), Some(true)) => {
                self.back_reference(LinkField::PovTrrIds, pov_id.as_str(), trr.id.as_str())
                    .await
            }
            (Some(pov_id), Some(false)) => {
                tracing::warn!(trr = %trr.id, pov = %pov_id, "parent pov not in project; back-reference skipped");
                LinkWrite::Skipped
            }
            _ => LinkWrite::NotRequested,
        };
        Ok((trr, link))
    }

    /// Create a scenario and append it to each listed POV's `scenarioIds`
    pub async fn create_scenario(
        &self,
        draft: NewScenario,
        project_id: &ProjectId,
        options: CreateOptions,
    ) -> Result<(Scenario, LinkWrite), EngineError> {
        draft.validate(&self.limits)?;
        self.require_project(project_id).await?;

        let scenario = draft.into_record(ScenarioId::generate(), project_id.clone(), Utc::now());
        let mut parents = Vec::with_capacity(scenario.pov_ids.len());
        if options.create_relationships {
            for pov_id in &scenario.pov_ids {
                let ok = self
                    .parent_in_project(RecordKind::Pov, pov_id.as_str(), project_id)
                    .await?;
                parents.push((pov_id, ok));
            }
        }

        typed::insert(self.store.as_ref(), &scenario).await?;
        tracing::info!(
            project = %project_id,
            scenario = %scenario.id,
            povs = scenario.pov_ids.len(),
            "scenario created"
        );

        let mut link = LinkWrite::NotRequested;
        for (pov_id, ok) in parents {
            let outcome = if ok {
                self.back_reference(LinkField::PovScenarioIds, pov_id.as_str(), scenario.id.as_str())
                    .await
            } else {
                tracing::warn!(scenario = %scenario.id, pov = %pov_id, "parent pov not in project; back-reference skipped");
                LinkWrite::Skipped
            };
            link = link.combine(outcome);
        }
        Ok((scenario, link))
    }

    async fn require_project(&self, project_id: &ProjectId) -> Result<(), EngineError> {
        match self.store.get(Collection::Projects, project_id.as_str()).await? {
            Some(_) => Ok(()),
            None => Err(ValidationError::UnknownProject(project_id.clone()).into()),
        }
    }

    /// Whether `id` exists and belongs to `project_id`
    ///
    /// Reads the raw document so a malformed parent does not fail the create.
    async fn parent_in_project(
        &self,
        kind: RecordKind,
        id: &str,
        project_id: &ProjectId,
    ) -> Result<bool, EngineError> {
        let doc = self.store.get(Collection::of(kind), id).await?;
        Ok(doc
            .as_ref()
            .and_then(|d| d.get("projectId"))
            .and_then(|v| v.as_str())
            .is_some_and(|owner| owner == project_id.as_str()))
    }

    async fn back_reference(&self, field: LinkField, owner: &str, target: &str) -> LinkWrite {
        match self.index.add_link(field, owner, target).await {
            Ok(_) => LinkWrite::Written,
            Err(err) => {
                tracing::warn!(%field, owner, target, error = %err, "back-reference write failed");
                LinkWrite::Uncertain
            }
        }
    }
}
