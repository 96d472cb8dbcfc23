//! Testing utilities for the relink workspace
//!
//! Shared fixtures: engine setup, raw document seeding for graphs the engine
//! would never write itself, and a store with injectable failures.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use relink_core::{EngineConfig, RelationshipEngine};
use relink_model::{NewPov, NewProject, PovId, ProjectId};
use relink_store::{Collection, Document, EntityStore, Filter, MemoryStore, Patch, StoreError};
use serde_json::{json, Value};
use std::sync::{Arc, Once};

/// Timestamp used by seeded documents
pub const SEED_TIMESTAMP: &str = "2024-01-01T00:00:00Z";

/// Install a test subscriber once; `RUST_LOG` overrides the `warn` default
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn setup_engine() -> (Arc<MemoryStore>, RelationshipEngine) {
    setup_engine_with(EngineConfig::default())
}

pub fn setup_engine_with(config: EngineConfig) -> (Arc<MemoryStore>, RelationshipEngine) {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let engine = RelationshipEngine::new(store.clone(), config);
    (store, engine)
}

/// Project "P1" for customer "Acme"
pub async fn seed_project(engine: &RelationshipEngine) -> ProjectId {
    engine
        .create_project(NewProject::new("P1", "Acme"))
        .await
        .unwrap()
}

pub async fn seed_pov(engine: &RelationshipEngine, project_id: &ProjectId, title: &str) -> PovId {
    engine
        .create_pov(NewPov::new(title), project_id, None)
        .await
        .unwrap()
        .id
}

pub fn project_doc(id: &str) -> Value {
    json!({
        "id": id, "name": id, "customer": "Acme", "status": "Active",
        "createdAt": SEED_TIMESTAMP, "updatedAt": SEED_TIMESTAMP,
    })
}

pub fn pov_doc(id: &str, project: &str, trr_ids: &[&str], scenario_ids: &[&str]) -> Value {
    json!({
        "id": id, "projectId": project, "title": id, "phase": "Planning",
        "trrIds": trr_ids, "scenarioIds": scenario_ids,
        "createdAt": SEED_TIMESTAMP, "updatedAt": SEED_TIMESTAMP,
    })
}

pub fn trr_doc(id: &str, project: &str, pov_id: Option<&str>) -> Value {
    json!({
        "id": id, "projectId": project, "povId": pov_id, "title": id, "status": "Pending",
        "createdAt": SEED_TIMESTAMP, "updatedAt": SEED_TIMESTAMP,
    })
}

pub fn scenario_doc(id: &str, project: &str, pov_ids: &[&str]) -> Value {
    json!({
        "id": id, "projectId": project, "title": id, "povIds": pov_ids,
        "createdAt": SEED_TIMESTAMP, "updatedAt": SEED_TIMESTAMP,
    })
}

/// Seed a raw document under its own `id`
pub fn put(store: &MemoryStore, collection: Collection, doc: Value) {
    let id = doc["id"].as_str().unwrap_or_default().to_string();
    store.put_raw(collection, id, doc);
}

/// Store operation a fault applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Create,
    Get,
    Query,
    Update,
}

#[derive(Debug)]
struct Fault {
    op: StoreOp,
    collection: Option<Collection>,
    skip: usize,
    remaining: usize,
}

/// [`MemoryStore`] wrapper that fails selected calls with a backend error
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    faults: Mutex<Vec<Fault>>,
}

impl FlakyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    /// Fail the next `times` calls of `op` on `collection` (any collection if `None`)
    pub fn fail_next(&self, op: StoreOp, collection: Option<Collection>, times: usize) {
        self.fail_after(op, collection, 0, times);
    }

    /// Let `skip` matching calls through, then fail the following `times`
    pub fn fail_after(&self, op: StoreOp, collection: Option<Collection>, skip: usize, times: usize) {
        self.faults.lock().push(Fault {
            op,
            collection,
            skip,
            remaining: times,
        });
    }

    fn check(&self, op: StoreOp, collection: Collection) -> Result<(), StoreError> {
        let mut faults = self.faults.lock();
        let hit = faults.iter_mut().find(|f| {
            f.op == op && f.remaining > 0 && f.collection.map_or(true, |c| c == collection)
        });
        match hit {
            Some(fault) if fault.skip > 0 => {
                fault.skip -= 1;
                Ok(())
            }
            Some(fault) => {
                fault.remaining -= 1;
                Err(StoreError::Backend(format!(
                    "injected {op:?} failure on {collection}"
                )))
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl EntityStore for FlakyStore {
    async fn create(&self, collection: Collection, doc: Document) -> Result<String, StoreError> {
        self.check(StoreOp::Create, collection)?;
        self.inner.create(collection, doc).await
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        self.check(StoreOp::Get, collection)?;
        self.inner.get(collection, id).await
    }

    async fn query(&self, collection: Collection, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        self.check(StoreOp::Query, collection)?;
        self.inner.query(collection, filter).await
    }

    async fn update(&self, collection: Collection, id: &str, patch: Patch) -> Result<(), StoreError> {
        self.check(StoreOp::Update, collection)?;
        self.inner.update(collection, id, patch).await
    }
}
