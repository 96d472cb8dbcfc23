//! Relationship engine
//!
//! The API surface of the consistency engine. Owns the record factory,
//! relationship index, validator, repairer and auto-population
//! orchestrator, all sharing one injected [`EntityStore`].

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::factory::{CreateOptions, Created, LinkWrite, RecordFactory};
use crate::populate::{AutoPopulateReport, AutoPopulator};
use chrono::{DateTime, Utc};
use relink_graph::{
    GraphRepairer, GraphValidator, LinkField, ProjectGraph, RelationshipGraph,
    RelationshipIndex, RepairReport, ValidationReport,
};
use relink_lifecycle::{LifecycleState, Transition, TrrEvent};
use relink_model::{
    NewPov, NewProject, NewScenario, NewTrr, Pov, PovId, PovPhase, ProjectId, RecordKind,
    Scenario, ScenarioId, StoredRecord, Trr, TrrId, TrrStatus,
};
use relink_store::{typed, Collection, EntityStore, Patch, StoreError};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Result of advancing a POV
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseTransition {
    pub pov_id: PovId,
    pub from: PovPhase,
    pub to: PovPhase,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Present when entering Execution triggered auto-population
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_populated: Option<AutoPopulateReport>,
}

/// Result of a TRR review step
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusTransition {
    pub trr_id: TrrId,
    pub event: TrrEvent,
    pub from: TrrStatus,
    pub to: TrrStatus,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Result of an explicit link call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkOutcome {
    /// Whether the primary side changed
    pub changed: bool,
    pub back_reference: LinkWrite,
    /// POV the TRR was detached from, if it moved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_pov: Option<PovId>,
}

/// Relationship & lifecycle consistency engine
#[derive(Clone)]
pub struct RelationshipEngine {
    config: EngineConfig,
    store: Arc<dyn EntityStore>,
    index: RelationshipIndex,
    factory: RecordFactory,
    validator: GraphValidator,
    repairer: GraphRepairer,
    populator: AutoPopulator,
}

impl std::fmt::Debug for RelationshipEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationshipEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RelationshipEngine {
    #[must_use]
    pub fn new(store: Arc<dyn EntityStore>, config: EngineConfig) -> Self {
        let factory = RecordFactory::new(store.clone(), config.limits);
        let populator = AutoPopulator::new(store.clone(), factory.clone(), config.templates.clone());
        Self {
            index: RelationshipIndex::new(store.clone()),
            validator: GraphValidator::new(store.clone()),
            repairer: GraphRepairer::new(store.clone()),
            factory,
            populator,
            store,
            config,
        }
    }

    /// Engine with [`EngineConfig::default`]
    #[must_use]
    pub fn with_defaults(store: Arc<dyn EntityStore>) -> Self {
        Self::new(store, EngineConfig::default())
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Link queries over the same store
    #[inline]
    #[must_use]
    pub fn index(&self) -> &RelationshipIndex {
        &self.index
    }

    fn options(&self, options: Option<CreateOptions>) -> CreateOptions {
        options.unwrap_or(CreateOptions {
            create_relationships: self.config.create_relationships_by_default,
        })
    }

    #[tracing::instrument(skip_all)]
    pub async fn create_project(&self, draft: NewProject) -> Result<ProjectId, EngineError> {
        Ok(self.factory.create_project(draft).await?.id)
    }

    /// Create a POV in `project_id`
    ///
    /// POVs have no parent, so `link` is always [`LinkWrite::NotRequested`].
    #[tracing::instrument(skip_all, fields(project = %project_id))]
    pub async fn create_pov(
        &self,
        draft: NewPov,
        project_id: &ProjectId,
        _options: Option<CreateOptions>,
    ) -> Result<Created<PovId>, EngineError> {
        let pov = self.factory.create_pov(draft, project_id).await?;
        Ok(Created {
            id: pov.id,
            link: LinkWrite::NotRequested,
        })
    }

    #[tracing::instrument(skip_all, fields(project = %project_id, pov = ?pov_id))]
    pub async fn create_trr(
        &self,
        draft: NewTrr,
        project_id: &ProjectId,
        pov_id: Option<PovId>,
        options: Option<CreateOptions>,
    ) -> Result<Created<TrrId>, EngineError> {
        let (trr, link) = self
            .factory
            .create_trr(draft, project_id, pov_id, self.options(options))
            .await?;
        Ok(Created { id: trr.id, link })
    }

    #[tracing::instrument(skip_all, fields(project = %project_id))]
    pub async fn create_scenario(
        &self,
        draft: NewScenario,
        project_id: &ProjectId,
        options: Option<CreateOptions>,
    ) -> Result<Created<ScenarioId>, EngineError> {
        let (scenario, link) = self
            .factory
            .create_scenario(draft, project_id, self.options(options))
            .await?;
        Ok(Created {
            id: scenario.id,
            link,
        })
    }

    /// Point a TRR at a POV of the same project
    ///
    /// Writes `TRR.povId` first, then the POV's back-reference. A TRR that
    /// moves is also dropped from its previous POV's `trrIds`; both of
    /// these follow-up writes are best-effort.
    #[tracing::instrument(skip_all, fields(trr = %trr_id, pov = %pov_id))]
    pub async fn link_trr_to_pov(&self, trr_id: &TrrId, pov_id: &PovId) -> Result<LinkOutcome, EngineError> {
        let trr: Trr = self.load(trr_id.as_str()).await?;
        let pov: Pov = self.load(pov_id.as_str()).await?;
        ensure_same_project(&trr.project_id, RecordKind::Pov, pov_id.as_str(), &pov.project_id)?;

        let previous_pov = trr.pov_id.clone().filter(|p| p != pov_id);
        let changed = self.index.set_trr_pov(trr_id, Some(pov_id)).await?;

        let mut back_reference = self
            .best_effort(LinkField::PovTrrIds, pov_id.as_str(), trr_id.as_str(), true)
            .await;
        if let Some(previous) = &previous_pov {
            let detached = self
                .best_effort(LinkField::PovTrrIds, previous.as_str(), trr_id.as_str(), false)
                .await;
            back_reference = back_reference.combine(detached);
        }

        tracing::info!(changed, ?back_reference, "trr linked");
        Ok(LinkOutcome {
            changed,
            back_reference,
            previous_pov,
        })
    }

    /// Link a scenario and a POV of the same project, both directions
    #[tracing::instrument(skip_all, fields(scenario = %scenario_id, pov = %pov_id))]
    pub async fn link_scenario_to_pov(
        &self,
        scenario_id: &ScenarioId,
        pov_id: &PovId,
    ) -> Result<LinkOutcome, EngineError> {
        let scenario: Scenario = self.load(scenario_id.as_str()).await?;
        let pov: Pov = self.load(pov_id.as_str()).await?;
        ensure_same_project(&scenario.project_id, RecordKind::Pov, pov_id.as_str(), &pov.project_id)?;

        let changed = self
            .index
            .add_link(LinkField::ScenarioPovIds, scenario_id.as_str(), pov_id.as_str())
            .await?;
        let back_reference = self
            .best_effort(LinkField::PovScenarioIds, pov_id.as_str(), scenario_id.as_str(), true)
            .await;

        tracing::info!(changed, ?back_reference, "scenario linked");
        Ok(LinkOutcome {
            changed,
            back_reference,
            previous_pov: None,
        })
    }

    /// Advance a POV one phase
    ///
    /// Entering Execution runs auto-population on the POV loaded here when
    /// enabled. Once the phase change is persisted, population failures are
    /// only reported in [`PhaseTransition::auto_populated`].
    #[tracing::instrument(skip_all, fields(pov = %pov_id, actor = actor_id))]
    pub async fn transition_pov_phase(&self, pov_id: &PovId, actor_id: &str) -> Result<PhaseTransition, EngineError> {
        let pov: Pov = self.load(pov_id.as_str()).await?;
        let transition = relink_lifecycle::advance_pov(pov.phase, actor_id, Utc::now())?;
        self.persist_transition(Collection::Povs, pov_id.as_str(), "phase", &transition)
            .await?;
        tracing::info!(from = %transition.from, to = %transition.to, "pov phase changed");

        let auto_populated = if transition.to == PovPhase::Execution && self.config.auto_populate_on_execution {
            Some(self.populator.populate_pov(&pov, actor_id).await)
        } else {
            None
        };

        Ok(PhaseTransition {
            pov_id: pov_id.clone(),
            from: transition.from,
            to: transition.to,
            completed_at: transition.completed_at(),
            updated_by: transition.actor_id,
            updated_at: transition.at,
            auto_populated,
        })
    }

    /// Move a TRR to `new_status` if a single review event gets it there
    #[tracing::instrument(skip_all, fields(trr = %trr_id, to = %new_status, actor = actor_id))]
    pub async fn transition_trr_status(
        &self,
        trr_id: &TrrId,
        new_status: TrrStatus,
        actor_id: &str,
    ) -> Result<StatusTransition, EngineError> {
        let trr: Trr = self.load(trr_id.as_str()).await?;
        let event = relink_lifecycle::trr::validate_transition(trr.status, new_status)?;
        self.record_trr_event(&trr, event, actor_id).await
    }

    #[tracing::instrument(skip_all, fields(trr = %trr_id, event = %event, actor = actor_id))]
    pub async fn apply_trr_event(
        &self,
        trr_id: &TrrId,
        event: TrrEvent,
        actor_id: &str,
    ) -> Result<StatusTransition, EngineError> {
        let trr: Trr = self.load(trr_id.as_str()).await?;
        self.record_trr_event(&trr, event, actor_id).await
    }

    /// Records of a project plus derived link maps
    #[tracing::instrument(skip_all, fields(project = %project_id))]
    pub async fn project_relationship_graph(
        &self,
        project_id: &ProjectId,
    ) -> Result<RelationshipGraph, EngineError> {
        self.require_project(project_id).await?;
        let graph = ProjectGraph::load(self.store.as_ref(), project_id).await?;
        Ok(graph.into_relationship_graph())
    }

    #[tracing::instrument(skip_all, fields(project = %project_id))]
    pub async fn validate_relationships(&self, project_id: &ProjectId) -> Result<ValidationReport, EngineError> {
        self.require_project(project_id).await?;
        Ok(self.validator.validate(project_id).await?)
    }

    #[tracing::instrument(skip_all, fields(project = %project_id))]
    pub async fn repair_relationships(&self, project_id: &ProjectId) -> Result<RepairReport, EngineError> {
        self.require_project(project_id).await?;
        Ok(self.repairer.repair(project_id).await?)
    }

    #[tracing::instrument(skip_all, fields(pov = %pov_id, actor = actor_id))]
    pub async fn auto_populate_pov_records(
        &self,
        pov_id: &PovId,
        actor_id: &str,
    ) -> Result<AutoPopulateReport, EngineError> {
        self.populator.populate(pov_id, actor_id).await
    }

    async fn record_trr_event(
        &self,
        trr: &Trr,
        event: TrrEvent,
        actor_id: &str,
    ) -> Result<StatusTransition, EngineError> {
        let transition = relink_lifecycle::apply_trr_event(trr.status, event, actor_id, Utc::now())?;
        self.persist_transition(Collection::Trrs, trr.id.as_str(), "status", &transition)
            .await?;
        tracing::info!(from = %transition.from, to = %transition.to, "trr status changed");

        Ok(StatusTransition {
            trr_id: trr.id.clone(),
            event,
            from: transition.from,
            to: transition.to,
            completed_at: transition.completed_at(),
            updated_by: transition.actor_id,
            updated_at: transition.at,
        })
    }

    async fn persist_transition<S: LifecycleState + Serialize>(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        transition: &Transition<S>,
    ) -> Result<(), EngineError> {
        let mut patch = Patch::new();
        patch.insert(field.to_string(), to_value(&transition.to)?);
        patch.insert("updatedAt".to_string(), to_value(&transition.at)?);
        patch.insert(
            "updatedBy".to_string(),
            Value::String(transition.actor_id.clone()),
        );
        if let Some(completed_at) = transition.completed_at() {
            patch.insert("completedAt".to_string(), to_value(&completed_at)?);
        }
        self.store.update(collection, id, patch).await?;
        Ok(())
    }

    async fn load<T: StoredRecord>(&self, id: &str) -> Result<T, EngineError> {
        typed::fetch(self.store.as_ref(), id)
            .await?
            .ok_or_else(|| EngineError::not_found(T::KIND, id))
    }

    async fn require_project(&self, project_id: &ProjectId) -> Result<(), EngineError> {
        match self.store.get(Collection::Projects, project_id.as_str()).await? {
            Some(_) => Ok(()),
            None => Err(EngineError::not_found(RecordKind::Project, project_id.as_str())),
        }
    }

    /// Add or remove one link; failures are logged and reported as uncertain
    async fn best_effort(&self, field: LinkField, owner: &str, target: &str, add: bool) -> LinkWrite {
        let result = if add {
            self.index.add_link(field, owner, target).await
        } else {
            self.index.remove_link(field, owner, target).await
        };
        match result {
            Ok(_) => LinkWrite::Written,
            // previous owner is gone, nothing to detach from
            Err(StoreError::NotFound { .. }) if !add => LinkWrite::Written,
            Err(err) => {
                tracing::warn!(%field, owner, target, add, error = %err, "link write failed");
                LinkWrite::Uncertain
            }
        }
    }
}

fn ensure_same_project(
    expected: &ProjectId,
    kind: RecordKind,
    id: &str,
    actual: &ProjectId,
) -> Result<(), EngineError> {
    if expected == actual {
        Ok(())
    } else {
        Err(EngineError::CrossProject {
            kind,
            id: id.to_string(),
            expected: expected.clone(),
            actual: actual.clone(),
        })
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(StoreError::Encode)
}
