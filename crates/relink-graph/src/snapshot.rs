//! Project graph snapshot
//!
//! One consistent-enough read of everything a project owns. Validation,
//! repair planning and the relationship graph view all work off a
//! [`ProjectGraph`] instead of issuing per-record reads.

use futures::future::try_join_all;
use relink_model::{
    Pov, PovId, ProjectId, RecordKind, Scenario, ScenarioId, StoredRecord, Trr, TrrId,
};
use relink_store::{Collection, Document, EntityStore, Filter, StoreError};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Document that matched the project but does not decode
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MalformedRecord {
    pub kind: RecordKind,
    pub id: String,
    pub reason: String,
}

/// Where a referenced id lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Decoded record in this project
    Local,
    /// Document in this project that failed to decode
    Malformed,
    /// Exists under another project (owner unknown if the document lacks `projectId`)
    Foreign(Option<ProjectId>),
    Missing,
}

/// Snapshot of one project's POVs, TRRs and scenarios
#[derive(Debug, Clone)]
pub struct ProjectGraph {
    pub project_id: ProjectId,
    pub povs: BTreeMap<PovId, Pov>,
    pub trrs: BTreeMap<TrrId, Trr>,
    pub scenarios: BTreeMap<ScenarioId, Scenario>,
    pub malformed: Vec<MalformedRecord>,
    external: HashMap<(RecordKind, String), Option<Option<ProjectId>>>,
}

impl ProjectGraph {
    /// Load every record of `project_id` and resolve outbound references
    ///
    /// Undecodable documents are collected in [`ProjectGraph::malformed`]
    /// rather than failing the load.
    ///
    /// # Errors
    /// Propagates store failures
    pub async fn load(store: &dyn EntityStore, project_id: &ProjectId) -> Result<Self, StoreError> {
        let filter = Filter::new().eq("projectId", project_id.as_str());
        let (pov_docs, trr_docs, scenario_docs) = futures::try_join!(
            store.query(Collection::Povs, &filter),
            store.query(Collection::Trrs, &filter),
            store.query(Collection::Scenarios, &filter),
        )?;

        let mut malformed = Vec::new();
        let mut graph = ProjectGraph {
            project_id: project_id.clone(),
            povs: split(pov_docs, &mut malformed),
            trrs: split(trr_docs, &mut malformed),
            scenarios: split(scenario_docs, &mut malformed),
            malformed,
            external: HashMap::new(),
        };
        graph.malformed.sort_by(|a, b| (a.kind, &a.id).cmp(&(b.kind, &b.id)));

        let wanted: Vec<(RecordKind, String)> = graph.outbound_references().into_iter().collect();
        let lookups = wanted.iter().map(|(kind, id)| async move {
            let doc = store.get(Collection::of(*kind), id).await?;
            Ok::<_, StoreError>(doc.map(|d| owner_of(&d)))
        });
        let resolved = try_join_all(lookups).await?;
        graph.external = wanted.into_iter().zip(resolved).collect();

        tracing::debug!(
            project = %project_id,
            povs = graph.povs.len(),
            trrs = graph.trrs.len(),
            scenarios = graph.scenarios.len(),
            malformed = graph.malformed.len(),
            external = graph.external.len(),
            "project graph loaded"
        );
        Ok(graph)
    }

    /// Resolve a referenced id of `kind`
    #[must_use]
    pub fn resolve(&self, kind: RecordKind, id: &str) -> Resolution {
        if self.contains_local(kind, id) {
            return Resolution::Local;
        }
        if self.is_malformed(kind, id) {
            return Resolution::Malformed;
        }
        match self.external.get(&(kind, id.to_string())) {
            Some(Some(owner)) => Resolution::Foreign(owner.clone()),
            Some(None) | None => Resolution::Missing,
        }
    }

    /// Total number of loaded records, malformed ones included
    #[must_use]
    pub fn len(&self) -> usize {
        self.povs.len() + self.trrs.len() + self.scenarios.len() + self.malformed.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forward and inverse link maps as stored, duplicates collapsed
    #[must_use]
    pub fn relationships(&self) -> Relationships {
        let mut rel = Relationships::default();
        for pov in self.povs.values() {
            rel.pov_to_trr.insert(pov.id.clone(), unique(&pov.trr_ids));
            rel.pov_to_scenario
                .insert(pov.id.clone(), unique(&pov.scenario_ids));
        }
        for trr in self.trrs.values() {
            if let Some(pov_id) = &trr.pov_id {
                rel.trr_to_pov.insert(trr.id.clone(), pov_id.clone());
            }
        }
        for scenario in self.scenarios.values() {
            rel.scenario_to_pov
                .insert(scenario.id.clone(), unique(&scenario.pov_ids));
        }
        rel
    }

    /// Owned view for API consumers
    #[must_use]
    pub fn into_relationship_graph(self) -> RelationshipGraph {
        let relationships = self.relationships();
        RelationshipGraph {
            project_id: self.project_id,
            povs: self.povs.into_values().collect(),
            trrs: self.trrs.into_values().collect(),
            scenarios: self.scenarios.into_values().collect(),
            relationships,
        }
    }

    fn contains_local(&self, kind: RecordKind, id: &str) -> bool {
        match kind {
            RecordKind::Pov => self.povs.contains_key(&PovId::from(id)),
            RecordKind::Trr => self.trrs.contains_key(&TrrId::from(id)),
            RecordKind::Scenario => self.scenarios.contains_key(&ScenarioId::from(id)),
            RecordKind::Project => id == self.project_id.as_str(),
        }
    }

    fn is_malformed(&self, kind: RecordKind, id: &str) -> bool {
        self.malformed.iter().any(|m| m.kind == kind && m.id == id)
    }

    fn outbound_references(&self) -> BTreeSet<(RecordKind, String)> {
        let mut refs = BTreeSet::new();
        let mut want = |kind: RecordKind, id: &str| {
            if !self.contains_local(kind, id) && !self.is_malformed(kind, id) {
                refs.insert((kind, id.to_string()));
            }
        };
        for pov in self.povs.values() {
            pov.trr_ids.iter().for_each(|id| want(RecordKind::Trr, id.as_str()));
            pov.scenario_ids
                .iter()
                .for_each(|id| want(RecordKind::Scenario, id.as_str()));
        }
        for trr in self.trrs.values() {
            if let Some(pov_id) = &trr.pov_id {
                want(RecordKind::Pov, pov_id.as_str());
            }
        }
        for scenario in self.scenarios.values() {
            scenario
                .pov_ids
                .iter()
                .for_each(|id| want(RecordKind::Pov, id.as_str()));
        }
        refs
    }
}

fn split<K, T>(docs: Vec<Document>, malformed: &mut Vec<MalformedRecord>) -> BTreeMap<K, T>
where
    K: Ord + From<String>,
    T: StoredRecord,
{
    let mut records = BTreeMap::new();
    for doc in docs {
        let id = doc
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        match serde_json::from_value::<T>(doc) {
            Ok(record) => {
                records.insert(K::from(record.record_id().to_string()), record);
            }
            Err(err) => {
                tracing::warn!(kind = %T::KIND, %id, error = %err, "skipping malformed document");
                malformed.push(MalformedRecord {
                    kind: T::KIND,
                    id,
                    reason: err.to_string(),
                });
            }
        }
    }
    records
}

fn owner_of(doc: &Document) -> Option<ProjectId> {
    doc.get("projectId")
        .and_then(|v| v.as_str())
        .map(ProjectId::from)
}

fn unique<T: Clone + Eq + std::hash::Hash>(ids: &[T]) -> Vec<T> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().filter(|id| seen.insert(*id)).cloned().collect()
}

/// Derived link maps of a project
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Relationships {
    #[serde(rename = "povToTRR")]
    pub pov_to_trr: BTreeMap<PovId, Vec<TrrId>>,
    #[serde(rename = "trrToPOV")]
    pub trr_to_pov: BTreeMap<TrrId, PovId>,
    #[serde(rename = "povToScenario")]
    pub pov_to_scenario: BTreeMap<PovId, Vec<ScenarioId>>,
    #[serde(rename = "scenarioToPOV")]
    pub scenario_to_pov: BTreeMap<ScenarioId, Vec<PovId>>,
}

/// Records of a project plus their link maps
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipGraph {
    pub project_id: ProjectId,
    pub povs: Vec<Pov>,
    pub trrs: Vec<Trr>,
    pub scenarios: Vec<Scenario>,
    pub relationships: Relationships,
}

#[cfg(test)]
mod tests {
    use super::*;
    use relink_store::MemoryStore;
    use serde_json::json;

    const TS: &str = "2024-01-01T00:00:00Z";

    fn seed(store: &MemoryStore) {
        store.put_raw(
            Collection::Povs,
            "pov-1",
            json!({"id": "pov-1", "projectId": "p1", "title": "POV", "trrIds": ["trr-1", "trr-1"],
                   "createdAt": TS, "updatedAt": TS}),
        );
        store.put_raw(
            Collection::Trrs,
            "trr-1",
            json!({"id": "trr-1", "projectId": "p1", "povId": "pov-1", "title": "TRR",
                   "createdAt": TS, "updatedAt": TS}),
        );
        store.put_raw(
            Collection::Trrs,
            "trr-x",
            json!({"id": "trr-x", "projectId": "p1", "povId": "pov-9", "title": "TRR",
                   "createdAt": TS, "updatedAt": TS}),
        );
        store.put_raw(
            Collection::Povs,
            "pov-9",
            json!({"id": "pov-9", "projectId": "p2", "title": "Other",
                   "createdAt": TS, "updatedAt": TS}),
        );
        store.put_raw(
            Collection::Scenarios,
            "s-bad",
            json!({"id": "s-bad", "projectId": "p1", "povIds": "pov-1"}),
        );
    }

    #[tokio::test]
    async fn load_splits_local_foreign_and_malformed() {
        let store = MemoryStore::new();
        seed(&store);

        let graph = ProjectGraph::load(&store, &ProjectId::from("p1")).await.unwrap();

        assert_eq!(graph.povs.len(), 1);
        assert_eq!(graph.trrs.len(), 2);
        assert!(graph.scenarios.is_empty());
        assert_eq!(graph.malformed.len(), 1);
        assert_eq!(graph.malformed[0].id, "s-bad");
        assert_eq!(graph.len(), 4);

        assert_eq!(graph.resolve(RecordKind::Pov, "pov-1"), Resolution::Local);
        assert_eq!(
            graph.resolve(RecordKind::Pov, "pov-9"),
            Resolution::Foreign(Some(ProjectId::from("p2")))
        );
        assert_eq!(graph.resolve(RecordKind::Scenario, "s-bad"), Resolution::Malformed);
        assert_eq!(graph.resolve(RecordKind::Trr, "nope"), Resolution::Missing);
    }

    #[tokio::test]
    async fn relationships_collapse_duplicates() {
        let store = MemoryStore::new();
        seed(&store);

        let graph = ProjectGraph::load(&store, &ProjectId::from("p1")).await.unwrap();
        let rel = graph.relationships();

        assert_eq!(rel.pov_to_trr[&PovId::from("pov-1")], vec![TrrId::from("trr-1")]);
        assert_eq!(rel.trr_to_pov[&TrrId::from("trr-x")], PovId::from("pov-9"));
        assert!(rel.pov_to_scenario[&PovId::from("pov-1")].is_empty());

        let json = serde_json::to_value(&rel).unwrap();
        assert_eq!(json["povToTRR"]["pov-1"], json!(["trr-1"]));
    }

    #[tokio::test]
    async fn empty_project_loads_empty_graph() {
        let store = MemoryStore::new();
        let graph = ProjectGraph::load(&store, &ProjectId::from("p1")).await.unwrap();
        assert!(graph.is_empty());
        assert!(graph.into_relationship_graph().povs.is_empty());
    }
}
