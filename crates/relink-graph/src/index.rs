//! Relationship index
//!
//! Reads forward and inverse links out of the records' embedded arrays and
//! maintains those arrays with set semantics. Every mutating call is
//! idempotent and reports whether it changed stored state, so concurrent
//! writers and repeated repair passes never apply a change twice.

use crate::links::LinkField;
use chrono::Utc;
use relink_model::{Pov, PovId, ProjectId, Scenario, ScenarioId, Trr, TrrId};
use relink_store::{typed, Collection, Document, EntityStore, Filter, Patch, StoreError};
use serde_json::Value;
use std::sync::Arc;

/// Link reader and set-semantics writer over an [`EntityStore`]
#[derive(Clone)]
pub struct RelationshipIndex {
    store: Arc<dyn EntityStore>,
}

impl std::fmt::Debug for RelationshipIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationshipIndex").finish_non_exhaustive()
    }
}

impl RelationshipIndex {
    #[inline]
    #[must_use]
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Underlying store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    pub async fn povs_for_project(&self, project_id: &ProjectId) -> Result<Vec<Pov>, StoreError> {
        let filter = Filter::new().eq("projectId", project_id.as_str());
        typed::fetch_where(self.store.as_ref(), &filter).await
    }

    /// TRRs whose authoritative `povId` names `pov_id`
    pub async fn trrs_for_pov(&self, pov_id: &PovId) -> Result<Vec<Trr>, StoreError> {
        let filter = Filter::new().eq("povId", pov_id.as_str());
        typed::fetch_where(self.store.as_ref(), &filter).await
    }

    /// TRRs of `project_id` whose `povId` names `pov_id`
    ///
    /// Documents that do not decode are logged and skipped.
    pub async fn project_trrs_for_pov(
        &self,
        project_id: &ProjectId,
        pov_id: &PovId,
    ) -> Result<Vec<Trr>, StoreError> {
        let filter = Filter::new()
            .eq("projectId", project_id.as_str())
            .eq("povId", pov_id.as_str());
        let docs = self.store.query(Collection::Trrs, &filter).await?;
        Ok(docs
            .into_iter()
            .filter_map(|doc| match typed::decode::<Trr>(doc) {
                Ok(trr) => Some(trr),
                Err(err) => {
                    tracing::warn!(pov = %pov_id, error = %err, "skipping malformed trr");
                    None
                }
            })
            .collect())
    }

    pub async fn pov_for_trr(&self, trr_id: &TrrId) -> Result<Option<Pov>, StoreError> {
        let Some(trr) = typed::fetch::<Trr>(self.store.as_ref(), trr_id.as_str()).await? else {
            return Ok(None);
        };
        match trr.pov_id {
            Some(pov_id) => typed::fetch(self.store.as_ref(), pov_id.as_str()).await,
            None => Ok(None),
        }
    }

    /// Scenarios whose `povIds` contain `pov_id`
    pub async fn scenarios_for_pov(&self, pov_id: &PovId) -> Result<Vec<Scenario>, StoreError> {
        let filter = Filter::new().contains("povIds", pov_id.as_str());
        typed::fetch_where(self.store.as_ref(), &filter).await
    }

    /// POVs named in a scenario's `povIds`; missing POVs are skipped
    pub async fn povs_for_scenario(&self, scenario_id: &ScenarioId) -> Result<Vec<Pov>, StoreError> {
        let Some(scenario) =
            typed::fetch::<Scenario>(self.store.as_ref(), scenario_id.as_str()).await?
        else {
            return Ok(Vec::new());
        };

        let mut povs: Vec<Pov> = Vec::with_capacity(scenario.pov_ids.len());
        for pov_id in &scenario.pov_ids {
            if povs.iter().any(|p| &p.id == pov_id) {
                continue;
            }
            if let Some(pov) = typed::fetch::<Pov>(self.store.as_ref(), pov_id.as_str()).await? {
                povs.push(pov);
            }
        }
        Ok(povs)
    }

    /// Add `target` to `owner.field` unless already present
    ///
    /// Returns `true` if the array was written.
    pub async fn add_link(&self, field: LinkField, owner: &str, target: &str) -> Result<bool, StoreError> {
        let mut ids = self.load_ids(field, owner).await?;
        if ids.iter().any(|v| v.as_str() == Some(target)) {
            tracing::debug!(%field, owner, target, "link already present");
            return Ok(false);
        }
        ids.push(Value::String(target.to_string()));
        self.write_ids(field, owner, ids).await?;
        tracing::debug!(%field, owner, target, "link added");
        Ok(true)
    }

    /// Remove every occurrence of `target` from `owner.field`
    pub async fn remove_link(&self, field: LinkField, owner: &str, target: &str) -> Result<bool, StoreError> {
        let ids = self.load_ids(field, owner).await?;
        let before = ids.len();
        let kept: Vec<Value> = ids
            .into_iter()
            .filter(|v| v.as_str() != Some(target))
            .collect();
        if kept.len() == before {
            return Ok(false);
        }
        self.write_ids(field, owner, kept).await?;
        tracing::debug!(%field, owner, target, "link removed");
        Ok(true)
    }

    /// Collapse duplicate ids in `owner.field`, keeping first occurrences
    pub async fn dedupe_links(&self, field: LinkField, owner: &str) -> Result<bool, StoreError> {
        let ids = self.load_ids(field, owner).await?;
        let before = ids.len();
        let mut unique: Vec<Value> = Vec::with_capacity(before);
        for id in ids {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        let removed = before - unique.len();
        if removed == 0 {
            return Ok(false);
        }
        self.write_ids(field, owner, unique).await?;
        tracing::debug!(%field, owner, removed, "duplicate links removed");
        Ok(true)
    }

    /// Set the authoritative `TRR.povId`
    pub async fn set_trr_pov(&self, trr_id: &TrrId, pov_id: Option<&PovId>) -> Result<bool, StoreError> {
        let doc = self.load(Collection::Trrs, trr_id.as_str()).await?;
        let desired = pov_id.map_or(Value::Null, |p| Value::String(p.to_string()));
        if doc.get("povId").unwrap_or(&Value::Null) == &desired {
            return Ok(false);
        }

        let mut patch = Patch::new();
        patch.insert("povId".to_string(), desired);
        patch.insert("updatedAt".to_string(), now_value());
        self.store.update(Collection::Trrs, trr_id.as_str(), patch).await?;
        tracing::debug!(trr = %trr_id, pov = ?pov_id.map(PovId::as_str), "trr pov set");
        Ok(true)
    }

    async fn load(&self, collection: Collection, id: &str) -> Result<Document, StoreError> {
        self.store
            .get(collection, id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                collection,
                id: id.to_string(),
            })
    }

    async fn load_ids(&self, field: LinkField, owner: &str) -> Result<Vec<Value>, StoreError> {
        let doc = self.load(field.collection(), owner).await?;
        Ok(doc
            .get(field.name())
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    async fn write_ids(&self, field: LinkField, owner: &str, ids: Vec<Value>) -> Result<(), StoreError> {
        let mut patch = Patch::new();
        patch.insert(field.name().to_string(), Value::Array(ids));
        patch.insert("updatedAt".to_string(), now_value());
        self.store.update(field.collection(), owner, patch).await
    }
}

fn now_value() -> Value {
    Value::String(Utc::now().to_rfc3339())
}
