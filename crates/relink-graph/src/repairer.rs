//! Graph repairer
//!
//! Turns validator warnings into link writes using the canonical direction
//! of each relationship:
//! - `TRR.povId` always wins over `POV.trrIds`
//! - for POV <-> scenario, the side holding the link wins if the other
//!   side's array was empty in the snapshot; otherwise both claim
//!   authority and the pair is reported as a conflict
//!
//! Planning is pure ([`plan_repairs`]); [`GraphRepairer::repair`] executes
//! the plan through the [`RelationshipIndex`] and re-validates.

use crate::index::RelationshipIndex;
use crate::links::{LinkField, RefField};
use crate::report::{
    GraphWarning, RepairConflictError, RepairIssue, RepairReport, ReferenceErrorKind,
    ValidationReport, WarningKind,
};
use crate::snapshot::ProjectGraph;
use crate::validator::GraphValidator;
use relink_model::{PovId, ProjectId, ScenarioId};
use relink_store::{EntityStore, StoreError};
use serde::Serialize;
use std::sync::Arc;

/// A single idempotent link write
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum RepairAction {
    AddLink {
        field: LinkField,
        owner: String,
        target: String,
    },
    RemoveLink {
        field: LinkField,
        owner: String,
        target: String,
    },
    Dedupe { field: LinkField, owner: String },
}

/// Writes to perform plus issues no write can settle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairPlan {
    pub actions: Vec<RepairAction>,
    pub issues: Vec<RepairIssue>,
}

/// Derive the repair plan for a validated snapshot
#[must_use]
pub fn plan_repairs(graph: &ProjectGraph, report: &ValidationReport) -> RepairPlan {
    let mut plan = RepairPlan::default();

    for err in &report.errors {
        let issue = match (err.kind, &err.target) {
            (ReferenceErrorKind::ConflictingClaim, Some(target)) => {
                RepairIssue::Conflict(RepairConflictError {
                    left: err.holder.clone(),
                    right: target.clone(),
                    detail: err.detail.clone(),
                })
            }
            _ => RepairIssue::Unresolved(err.clone()),
        };
        plan.issues.push(issue);
    }

    for warning in &report.warnings {
        match warning.kind {
            WarningKind::DuplicateLink => {
                let Some(field) = warning.field.as_link() else {
                    continue;
                };
                let action = RepairAction::Dedupe {
                    field,
                    owner: warning.holder.id.clone(),
                };
                if !plan.actions.contains(&action) {
                    plan.actions.push(action);
                }
            }
            WarningKind::StaleBackReference => {
                if let Some(target) = &warning.target {
                    plan.actions.push(RepairAction::RemoveLink {
                        field: LinkField::PovTrrIds,
                        owner: warning.holder.id.clone(),
                        target: target.id.clone(),
                    });
                }
            }
            WarningKind::MissingBackReference => plan_back_reference(graph, warning, &mut plan),
            WarningKind::EmptyScenario => {}
        }
    }

    plan
}

fn plan_back_reference(graph: &ProjectGraph, warning: &GraphWarning, plan: &mut RepairPlan) {
    let (Some(field), Some(target)) = (warning.field.as_link(), &warning.target) else {
        return;
    };
    let add = RepairAction::AddLink {
        field,
        owner: warning.holder.id.clone(),
        target: target.id.clone(),
    };

    // POV.trrIds is derived from the authoritative TRR.povId
    if field == LinkField::PovTrrIds {
        plan.actions.push(add);
        return;
    }

    let lacking_side_empty = match field {
        LinkField::ScenarioPovIds => graph
            .scenarios
            .get(&ScenarioId::from(warning.holder.id.as_str()))
            .is_some_and(|s| s.pov_ids.is_empty()),
        LinkField::PovScenarioIds => graph
            .povs
            .get(&PovId::from(warning.holder.id.as_str()))
            .is_some_and(|p| p.scenario_ids.is_empty()),
        LinkField::PovTrrIds => false,
    };

    if lacking_side_empty {
        plan.actions.push(add);
    } else {
        plan.issues.push(RepairIssue::Conflict(RepairConflictError {
            left: target.clone(),
            right: warning.holder.clone(),
            detail: format!(
                "{target} links {holder}, but {holder} has a non-empty `{field}` without it",
                holder = warning.holder,
                field = RefField::Link(field),
            ),
        }));
    }
}

/// Validate-then-fix driver for one project
#[derive(Clone)]
pub struct GraphRepairer {
    store: Arc<dyn EntityStore>,
    index: RelationshipIndex,
}

impl std::fmt::Debug for GraphRepairer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphRepairer").finish_non_exhaustive()
    }
}

impl GraphRepairer {
    #[must_use]
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        let index = RelationshipIndex::new(store.clone());
        Self { store, index }
    }

    /// Repair every auto-fixable asymmetry of `project_id`
    ///
    /// `fixed` counts writes that changed stored state, so a second call on
    /// an unchanged graph reports zero.
    ///
    /// # Errors
    /// Propagates store failures; writes already applied stay applied
    pub async fn repair(&self, project_id: &ProjectId) -> Result<RepairReport, StoreError> {
        let graph = ProjectGraph::load(self.store.as_ref(), project_id).await?;
        let before = GraphValidator::check(&graph);
        let plan = plan_repairs(&graph, &before);

        let mut fixed = 0;
        for action in &plan.actions {
            if self.apply(action).await? {
                fixed += 1;
            }
        }

        for issue in &plan.issues {
            if let RepairIssue::Conflict(conflict) = issue {
                tracing::warn!(project = %project_id, %conflict, "repair conflict left for review");
            }
        }

        let after = if fixed == 0 {
            before
        } else {
            let graph = ProjectGraph::load(self.store.as_ref(), project_id).await?;
            GraphValidator::check(&graph)
        };

        tracing::info!(
            project = %project_id,
            planned = plan.actions.len(),
            fixed,
            unresolved = plan.issues.len(),
            valid = after.valid,
            "relationships repaired"
        );

        Ok(RepairReport {
            project_id: project_id.clone(),
            fixed,
            errors: plan.issues,
            after,
        })
    }

    async fn apply(&self, action: &RepairAction) -> Result<bool, StoreError> {
        tracing::debug!(?action, "applying repair");
        match action {
            RepairAction::AddLink {
                field,
                owner,
                target,
            } => self.index.add_link(*field, owner, target).await,
            RepairAction::RemoveLink {
                field,
                owner,
                target,
            } => self.index.remove_link(*field, owner, target).await,
            RepairAction::Dedupe { field, owner } => self.index.dedupe_links(*field, owner).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::EntityRef;
    use pretty_assertions::assert_eq;
    use relink_store::{Collection, MemoryStore};
    use serde_json::{json, Value};

    const TS: &str = "2024-01-01T00:00:00Z";

    fn pov(store: &MemoryStore, id: &str, trrs: Value, scenarios: Value) {
        store.put_raw(
            Collection::Povs,
            id,
            json!({"id": id, "projectId": "p1", "title": id, "trrIds": trrs,
                   "scenarioIds": scenarios, "createdAt": TS, "updatedAt": TS}),
        );
    }

    fn trr(store: &MemoryStore, id: &str, pov_id: Value) {
        store.put_raw(
            Collection::Trrs,
            id,
            json!({"id": id, "projectId": "p1", "povId": pov_id, "title": id,
                   "createdAt": TS, "updatedAt": TS}),
        );
    }

    fn scenario(store: &MemoryStore, id: &str, povs: Value) {
        store.put_raw(
            Collection::Scenarios,
            id,
            json!({"id": id, "projectId": "p1", "title": id, "povIds": povs,
                   "createdAt": TS, "updatedAt": TS}),
        );
    }

    async fn field(store: &MemoryStore, collection: Collection, id: &str, name: &str) -> Value {
        store.get(collection, id).await.unwrap().unwrap()[name].clone()
    }

    fn repairer(store: &Arc<MemoryStore>) -> GraphRepairer {
        GraphRepairer::new(store.clone())
    }

    #[tokio::test]
    async fn trr_pov_id_wins_over_pov_array() {
        let store = Arc::new(MemoryStore::new());
        pov(&store, "pov-1", json!(["trr-2"]), json!([]));
        trr(&store, "trr-1", json!("pov-1"));
        trr(&store, "trr-2", Value::Null);

        let report = repairer(&store).repair(&ProjectId::from("p1")).await.unwrap();

        assert_eq!(report.fixed, 2);
        assert!(report.errors.is_empty());
        assert!(report.after.valid);
        assert!(report.after.warnings.is_empty());
        assert_eq!(field(&store, Collection::Povs, "pov-1", "trrIds").await, json!(["trr-1"]));
    }

    #[tokio::test]
    async fn second_repair_is_a_no_op() {
        let store = Arc::new(MemoryStore::new());
        pov(&store, "pov-1", json!(["trr-1", "trr-1"]), json!([]));
        trr(&store, "trr-1", json!("pov-1"));
        trr(&store, "trr-2", json!("pov-1"));

        let project = ProjectId::from("p1");
        let first = repairer(&store).repair(&project).await.unwrap();
        assert_eq!(first.fixed, 2);

        let writes = store.write_count();
        let second = repairer(&store).repair(&project).await.unwrap();
        assert_eq!(second.fixed, 0);
        assert_eq!(store.write_count(), writes);
    }

    #[tokio::test]
    async fn scenario_link_fills_empty_side() {
        let store = Arc::new(MemoryStore::new());
        pov(&store, "pov-1", json!([]), json!(["s-1"]));
        scenario(&store, "s-1", json!([]));

        let report = repairer(&store).repair(&ProjectId::from("p1")).await.unwrap();

        assert_eq!(report.fixed, 1);
        assert_eq!(field(&store, Collection::Scenarios, "s-1", "povIds").await, json!(["pov-1"]));
        assert!(report.after.warnings.is_empty());
    }

    #[tokio::test]
    async fn disagreeing_non_empty_sides_are_a_conflict() {
        let store = Arc::new(MemoryStore::new());
        pov(&store, "pov-1", json!([]), json!(["s-1"]));
        pov(&store, "pov-2", json!([]), json!([]));
        scenario(&store, "s-1", json!(["pov-2"]));

        let report = repairer(&store).repair(&ProjectId::from("p1")).await.unwrap();

        // pov-2 had an empty scenarioIds, so it takes the link from s-1
        assert_eq!(report.fixed, 1);
        assert_eq!(report.conflicts().count(), 1);
        assert_eq!(field(&store, Collection::Scenarios, "s-1", "povIds").await, json!(["pov-2"]));
        assert_eq!(field(&store, Collection::Povs, "pov-2", "scenarioIds").await, json!(["s-1"]));
    }

    #[tokio::test]
    async fn conflicting_claim_is_never_auto_resolved() {
        let store = Arc::new(MemoryStore::new());
        pov(&store, "pov-a", json!([]), json!([]));
        pov(&store, "pov-b", json!(["trr-1"]), json!([]));
        trr(&store, "trr-1", json!("pov-a"));

        let report = repairer(&store).repair(&ProjectId::from("p1")).await.unwrap();

        assert_eq!(report.conflicts().count(), 1);
        // pov-a's missing back-reference is still fixed
        assert_eq!(report.fixed, 1);
        assert_eq!(field(&store, Collection::Povs, "pov-b", "trrIds").await, json!(["trr-1"]));
        assert!(!report.after.valid);
    }

    #[tokio::test]
    async fn dangling_references_are_carried_as_unresolved() {
        let store = Arc::new(MemoryStore::new());
        trr(&store, "trr-1", json!("ghost"));

        let report = repairer(&store).repair(&ProjectId::from("p1")).await.unwrap();

        assert_eq!(report.fixed, 0);
        assert!(matches!(report.errors[0], RepairIssue::Unresolved(_)));
    }

    #[tokio::test]
    async fn plan_merges_duplicate_warnings_per_field() {
        let graph = ProjectGraph::load(&MemoryStore::new(), &ProjectId::from("p1"))
            .await
            .unwrap();
        let warning = |target: &str| GraphWarning {
            kind: WarningKind::DuplicateLink,
            holder: EntityRef::new(relink_model::RecordKind::Pov, "pov-1"),
            field: RefField::POV_TRR_IDS,
            target: Some(EntityRef::new(relink_model::RecordKind::Trr, target)),
            detail: String::new(),
        };
        let report = ValidationReport::new(
            ProjectId::from("p1"),
            vec![],
            vec![warning("a"), warning("b")],
        );
        let plan = plan_repairs(&graph, &report);
        assert_eq!(
            plan.actions,
            vec![RepairAction::Dedupe {
                field: LinkField::PovTrrIds,
                owner: "pov-1".to_string()
            }]
        );
    }
}
