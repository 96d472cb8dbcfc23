//! Auto-population orchestrator
//!
//! Creates the template TRRs a POV needs once it reaches Execution. The
//! existing-TRR check is re-read per template right before each create, so
//! repeated runs create nothing new. Two concurrent runs can still both
//! create the same template TRR; the duplicate is left for review.

use crate::config::TemplateCatalog;
use crate::error::EngineError;
use crate::factory::{CreateOptions, RecordFactory};
use relink_graph::RelationshipIndex;
use relink_model::{NewTrr, Pov, PovId, RecordKind, TrrId};
use relink_store::{typed, EntityStore};
use serde::Serialize;
use std::sync::Arc;

/// A template that could not be satisfied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateFailure {
    pub template_key: String,
    pub message: String,
}

/// Outcome of one auto-population run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoPopulateReport {
    pub pov_id: PovId,
    pub created: Vec<TrrId>,
    /// Template keys already satisfied by a linked TRR
    pub existing: Vec<String>,
    pub errors: Vec<TemplateFailure>,
}

impl AutoPopulateReport {
    fn new(pov_id: PovId) -> Self {
        Self {
            pov_id,
            created: Vec::new(),
            existing: Vec::new(),
            errors: Vec::new(),
        }
    }
}

#[derive(Clone)]
pub struct AutoPopulator {
    store: Arc<dyn EntityStore>,
    index: RelationshipIndex,
    factory: RecordFactory,
    templates: TemplateCatalog,
}

impl std::fmt::Debug for AutoPopulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoPopulator")
            .field("templates", &self.templates)
            .finish_non_exhaustive()
    }
}

impl AutoPopulator {
    #[must_use]
    pub fn new(store: Arc<dyn EntityStore>, factory: RecordFactory, templates: TemplateCatalog) -> Self {
        let index = RelationshipIndex::new(store.clone());
        Self {
            store,
            index,
            factory,
            templates,
        }
    }

    /// Create the missing template TRRs of `pov_id`
    ///
    /// # Errors
    /// Fails only if the POV cannot be loaded
    pub async fn populate(&self, pov_id: &PovId, actor_id: &str) -> Result<AutoPopulateReport, EngineError> {
        let pov: Pov = typed::fetch(self.store.as_ref(), pov_id.as_str())
            .await?
            .ok_or_else(|| EngineError::not_found(RecordKind::Pov, pov_id.as_str()))?;
        Ok(self.populate_pov(&pov, actor_id).await)
    }

    /// Create the missing template TRRs of an already loaded POV
    ///
    /// Per-template failures land in [`AutoPopulateReport::errors`] and do
    /// not stop the remaining templates. Only TRRs of the POV's own project
    /// satisfy a template.
    pub async fn populate_pov(&self, pov: &Pov, actor_id: &str) -> AutoPopulateReport {
        let templates = self.templates.for_category(pov.category.as_deref());
        let mut report = AutoPopulateReport::new(pov.id.clone());

        for template in templates {
            let linked = match self.index.project_trrs_for_pov(&pov.project_id, &pov.id).await {
                Ok(trrs) => trrs,
                Err(err) => {
                    report.errors.push(TemplateFailure {
                        template_key: template.key.clone(),
                        message: err.to_string(),
                    });
                    continue;
                }
            };
            if linked
                .iter()
                .any(|t| t.template_key.as_deref() == Some(template.key.as_str()))
            {
                tracing::debug!(pov = %pov.id, template = %template.key, "template already satisfied");
                report.existing.push(template.key.clone());
                continue;
            }

            let mut draft = NewTrr::new(template.title.clone()).with_template_key(template.key.clone());
            if let Some(description) = &template.description {
                draft = draft.with_description(description.clone());
            }

            match self
                .factory
                .create_trr(draft, &pov.project_id, Some(pov.id.clone()), CreateOptions::linked())
                .await
            {
                Ok((trr, _link)) => report.created.push(trr.id),
                Err(err) => {
                    tracing::warn!(pov = %pov.id, template = %template.key, error = %err, "template trr not created");
                    report.errors.push(TemplateFailure {
                        template_key: template.key.clone(),
                        message: err.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            pov = %pov.id,
            actor = actor_id,
            category = pov.category.as_deref().unwrap_or("default"),
            created = report.created.len(),
            existing = report.existing.len(),
            failed = report.errors.len(),
            "auto-population finished"
        );
        report
    }
}
