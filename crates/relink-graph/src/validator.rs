//! Graph validator
//!
//! Checks a [`ProjectGraph`] against the relationship invariants:
//! - every reference resolves to a record of the same project
//! - `TRR.povId` and `POV.trrIds` agree
//! - `POV.scenarioIds` and `Scenario.povIds` are symmetric
//! - relationship arrays hold no duplicates
//!
//! Issues come out in a fixed order (POVs, TRRs, scenarios, each by id,
//! then malformed documents) so reports can be diffed between runs.

use crate::links::RefField;
use crate::report::{
    EntityRef, GraphWarning, ReferenceError, ValidationReport, WarningKind,
};
use crate::snapshot::{ProjectGraph, Resolution};
use relink_model::{Pov, PovId, ProjectId, RecordKind, Scenario, ScenarioId, Trr, TrrId};
use relink_store::{EntityStore, StoreError};
use std::collections::HashSet;
use std::sync::Arc;

/// Read-only consistency checker for one project at a time
#[derive(Clone)]
pub struct GraphValidator {
    store: Arc<dyn EntityStore>,
}

impl std::fmt::Debug for GraphValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphValidator").finish_non_exhaustive()
    }
}

impl GraphValidator {
    #[inline]
    #[must_use]
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Load and check `project_id`
    ///
    /// # Errors
    /// Only store failures; graph problems are part of the report
    pub async fn validate(&self, project_id: &ProjectId) -> Result<ValidationReport, StoreError> {
        let graph = ProjectGraph::load(self.store.as_ref(), project_id).await?;
        let report = Self::check(&graph);
        tracing::info!(
            project = %project_id,
            valid = report.valid,
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "relationships validated"
        );
        Ok(report)
    }

    /// Check an already loaded snapshot
    #[must_use]
    pub fn check(graph: &ProjectGraph) -> ValidationReport {
        let mut pass = Pass {
            graph,
            errors: Vec::new(),
            warnings: Vec::new(),
        };
        graph.povs.values().for_each(|pov| pass.pov(pov));
        graph.trrs.values().for_each(|trr| pass.trr(trr));
        graph.scenarios.values().for_each(|s| pass.scenario(s));
        for m in &graph.malformed {
            pass.errors.push(ReferenceError::malformed(
                EntityRef::new(m.kind, m.id.clone()),
                m.reason.clone(),
            ));
        }
        ValidationReport::new(graph.project_id.clone(), pass.errors, pass.warnings)
    }
}

struct Pass<'g> {
    graph: &'g ProjectGraph,
    errors: Vec<ReferenceError>,
    warnings: Vec<GraphWarning>,
}

impl Pass<'_> {
    fn pov(&mut self, pov: &Pov) {
        let holder = EntityRef::new(RecordKind::Pov, pov.id.as_str());

        let trr_ids = self.distinct(&holder, RefField::POV_TRR_IDS, RecordKind::Trr, &pov.trr_ids);
        for trr_id in trr_ids {
            let target = EntityRef::new(RecordKind::Trr, trr_id);
            if !self.resolves_locally(&holder, RefField::POV_TRR_IDS, &target) {
                continue;
            }
            let Some(trr) = self.graph.trrs.get(&TrrId::from(trr_id)) else {
                continue;
            };
            match &trr.pov_id {
                Some(owner) if owner == &pov.id => {}
                Some(owner) => self.errors.push(ReferenceError::conflicting_claim(
                    holder.clone(),
                    target,
                    owner.as_str(),
                )),
                None => self.warnings.push(GraphWarning {
                    kind: WarningKind::StaleBackReference,
                    holder: holder.clone(),
                    field: RefField::POV_TRR_IDS,
                    detail: format!("`trrIds` lists {target}, whose `povId` is null"),
                    target: Some(target),
                }),
            }
        }

        let scenario_ids = self.distinct(
            &holder,
            RefField::POV_SCENARIO_IDS,
            RecordKind::Scenario,
            &pov.scenario_ids,
        );
        for scenario_id in scenario_ids {
            let target = EntityRef::new(RecordKind::Scenario, scenario_id);
            if !self.resolves_locally(&holder, RefField::POV_SCENARIO_IDS, &target) {
                continue;
            }
            let Some(scenario) = self.graph.scenarios.get(&ScenarioId::from(scenario_id)) else {
                continue;
            };
            if !scenario.pov_ids.contains(&pov.id) {
                self.missing_back_reference(target, RefField::SCENARIO_POV_IDS, holder.clone());
            }
        }
    }

    fn trr(&mut self, trr: &Trr) {
        let Some(pov_id) = &trr.pov_id else {
            return;
        };
        let holder = EntityRef::new(RecordKind::Trr, trr.id.as_str());
        let target = EntityRef::new(RecordKind::Pov, pov_id.as_str());
        if !self.resolves_locally(&holder, RefField::TrrPovId, &target) {
            return;
        }
        if let Some(pov) = self.graph.povs.get(pov_id) {
            if !pov.trr_ids.contains(&trr.id) {
                self.missing_back_reference(target, RefField::POV_TRR_IDS, holder);
            }
        }
    }

    fn scenario(&mut self, scenario: &Scenario) {
        let holder = EntityRef::new(RecordKind::Scenario, scenario.id.as_str());
        if scenario.pov_ids.is_empty() {
            self.warnings.push(GraphWarning {
                kind: WarningKind::EmptyScenario,
                holder,
                field: RefField::SCENARIO_POV_IDS,
                target: None,
                detail: "scenario is not linked to any POV".to_string(),
            });
            return;
        }

        let pov_ids = self.distinct(
            &holder,
            RefField::SCENARIO_POV_IDS,
            RecordKind::Pov,
            &scenario.pov_ids,
        );
        for pov_id in pov_ids {
            let target = EntityRef::new(RecordKind::Pov, pov_id);
            if !self.resolves_locally(&holder, RefField::SCENARIO_POV_IDS, &target) {
                continue;
            }
            if let Some(pov) = self.graph.povs.get(&PovId::from(pov_id)) {
                if !pov.scenario_ids.contains(&scenario.id) {
                    self.missing_back_reference(target, RefField::POV_SCENARIO_IDS, holder.clone());
                }
            }
        }
    }

    /// Unique ids of a relationship array in first-seen order; one
    /// duplicate warning per repeated id
    fn distinct<'a, I: AsRef<str>>(
        &mut self,
        holder: &EntityRef,
        field: RefField,
        target_kind: RecordKind,
        ids: &'a [I],
    ) -> Vec<&'a str> {
        let mut seen = HashSet::with_capacity(ids.len());
        let mut reported = HashSet::new();
        let mut unique = Vec::with_capacity(ids.len());
        for id in ids.iter().map(|id| id.as_ref()) {
            if seen.insert(id) {
                unique.push(id);
            } else if reported.insert(id) {
                let target = EntityRef::new(target_kind, id);
                self.warnings.push(GraphWarning {
                    kind: WarningKind::DuplicateLink,
                    holder: holder.clone(),
                    field,
                    detail: format!("`{field}` lists {target} more than once"),
                    target: Some(target),
                });
            }
        }
        unique
    }

    /// Record an error unless `target` is a decoded record of this project
    fn resolves_locally(&mut self, holder: &EntityRef, field: RefField, target: &EntityRef) -> bool {
        match self.graph.resolve(target.kind, &target.id) {
            Resolution::Local => true,
            // reported once as the malformed document itself
            Resolution::Malformed => false,
            Resolution::Foreign(owner) => {
                self.errors.push(ReferenceError::cross_project(
                    holder.clone(),
                    field,
                    target.clone(),
                    owner.as_ref(),
                ));
                false
            }
            Resolution::Missing => {
                self.errors.push(ReferenceError::dangling(
                    holder.clone(),
                    field,
                    target.clone(),
                ));
                false
            }
        }
    }

    /// `holder.field` should list `target` but does not
    fn missing_back_reference(&mut self, holder: EntityRef, field: RefField, target: EntityRef) {
        let detail = format!("`{field}` does not list {target}, which references it");
        self.warnings.push(GraphWarning {
            kind: WarningKind::MissingBackReference,
            holder,
            field,
            target: Some(target),
            detail,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ReferenceErrorKind;
    use pretty_assertions::assert_eq;
    use relink_store::{Collection, MemoryStore};
    use serde_json::{json, Value};

    const TS: &str = "2024-01-01T00:00:00Z";

    fn pov(store: &MemoryStore, id: &str, project: &str, trrs: Value, scenarios: Value) {
        store.put_raw(
            Collection::Povs,
            id,
            json!({"id": id, "projectId": project, "title": id, "trrIds": trrs,
                   "scenarioIds": scenarios, "createdAt": TS, "updatedAt": TS}),
        );
    }

    fn trr(store: &MemoryStore, id: &str, project: &str, pov_id: Value) {
        store.put_raw(
            Collection::Trrs,
            id,
            json!({"id": id, "projectId": project, "povId": pov_id, "title": id,
                   "createdAt": TS, "updatedAt": TS}),
        );
    }

    fn scenario(store: &MemoryStore, id: &str, project: &str, povs: Value) {
        store.put_raw(
            Collection::Scenarios,
            id,
            json!({"id": id, "projectId": project, "title": id, "povIds": povs,
                   "createdAt": TS, "updatedAt": TS}),
        );
    }

    async fn validate(store: MemoryStore, project: &str) -> ValidationReport {
        GraphValidator::new(Arc::new(store))
            .validate(&ProjectId::from(project))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn consistent_graph_is_valid() {
        let store = MemoryStore::new();
        pov(&store, "pov-1", "p1", json!(["trr-1"]), json!(["s-1"]));
        trr(&store, "trr-1", "p1", json!("pov-1"));
        scenario(&store, "s-1", "p1", json!(["pov-1"]));

        let report = validate(store, "p1").await;
        assert!(report.valid);
        assert!(report.errors.is_empty());
        assert!(report.warnings.is_empty());
    }

    #[tokio::test]
    async fn missing_back_reference_is_a_warning() {
        let store = MemoryStore::new();
        pov(&store, "pov-1", "p1", json!([]), json!([]));
        trr(&store, "trr-1", "p1", json!("pov-1"));

        let report = validate(store, "p1").await;
        assert!(report.valid);
        assert_eq!(report.warnings.len(), 1);
        let w = &report.warnings[0];
        assert_eq!(w.kind, WarningKind::MissingBackReference);
        assert_eq!(w.holder, EntityRef::new(RecordKind::Pov, "pov-1"));
        assert_eq!(w.field, RefField::POV_TRR_IDS);
        assert_eq!(w.target, Some(EntityRef::new(RecordKind::Trr, "trr-1")));
    }

    #[tokio::test]
    async fn cross_project_link_is_an_error() {
        let store = MemoryStore::new();
        pov(&store, "pov-2", "p2", json!([]), json!([]));
        trr(&store, "trr-1", "p1", json!("pov-2"));

        let report = validate(store, "p1").await;
        assert!(!report.valid);
        assert_eq!(report.count_errors(ReferenceErrorKind::CrossProject), 1);
        assert!(report.errors[0].detail.contains("p2"));
        assert!(report.warnings.is_empty());
    }

    #[tokio::test]
    async fn dangling_references_are_errors() {
        let store = MemoryStore::new();
        pov(&store, "pov-1", "p1", json!(["ghost-trr"]), json!(["ghost-s"]));
        trr(&store, "trr-1", "p1", json!("ghost-pov"));

        let report = validate(store, "p1").await;
        assert_eq!(report.count_errors(ReferenceErrorKind::Dangling), 3);
        // POV issues come before TRR issues
        assert_eq!(report.errors[0].holder.kind, RecordKind::Pov);
        assert_eq!(report.errors[2].holder.kind, RecordKind::Trr);
        assert_eq!(report.errors[2].field, Some(RefField::TrrPovId));
    }

    #[tokio::test]
    async fn conflicting_and_stale_claims() {
        let store = MemoryStore::new();
        pov(&store, "pov-a", "p1", json!(["trr-1"]), json!([]));
        pov(&store, "pov-b", "p1", json!(["trr-1", "trr-2"]), json!([]));
        trr(&store, "trr-1", "p1", json!("pov-a"));
        trr(&store, "trr-2", "p1", Value::Null);

        let report = validate(store, "p1").await;
        assert_eq!(report.count_errors(ReferenceErrorKind::ConflictingClaim), 1);
        assert_eq!(report.errors[0].holder.id, "pov-b");
        assert_eq!(report.count_warnings(WarningKind::StaleBackReference), 1);
    }

    #[tokio::test]
    async fn duplicates_and_empty_scenarios_are_warnings() {
        let store = MemoryStore::new();
        pov(&store, "pov-1", "p1", json!(["trr-1", "trr-1", "trr-1"]), json!([]));
        trr(&store, "trr-1", "p1", json!("pov-1"));
        scenario(&store, "s-1", "p1", json!([]));

        let report = validate(store, "p1").await;
        assert!(report.valid);
        assert_eq!(report.count_warnings(WarningKind::DuplicateLink), 1);
        assert_eq!(report.count_warnings(WarningKind::EmptyScenario), 1);
    }

    #[tokio::test]
    async fn asymmetric_scenario_links_warn_on_the_lacking_side() {
        let store = MemoryStore::new();
        pov(&store, "pov-1", "p1", json!([]), json!(["s-1"]));
        pov(&store, "pov-2", "p1", json!([]), json!([]));
        scenario(&store, "s-1", "p1", json!([]));
        scenario(&store, "s-2", "p1", json!(["pov-2"]));

        let report = validate(store, "p1").await;
        let missing: Vec<_> = report
            .warnings
            .iter()
            .filter(|w| w.kind == WarningKind::MissingBackReference)
            .map(|w| (w.holder.id.as_str(), w.field))
            .collect();
        assert_eq!(
            missing,
            vec![("s-1", RefField::SCENARIO_POV_IDS), ("pov-2", RefField::POV_SCENARIO_IDS)]
        );
    }

    #[tokio::test]
    async fn malformed_documents_are_errors() {
        let store = MemoryStore::new();
        pov(&store, "pov-1", "p1", json!(["trr-bad"]), json!([]));
        store.put_raw(
            Collection::Trrs,
            "trr-bad",
            json!({"id": "trr-bad", "projectId": "p1", "status": "Launched"}),
        );

        let report = validate(store, "p1").await;
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].kind, ReferenceErrorKind::Malformed);
        assert_eq!(report.errors[0].holder.id, "trr-bad");
    }
}
