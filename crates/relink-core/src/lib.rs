//! Relink Core - Relationship & Lifecycle Consistency Engine
//!
//! Creates interlinked engagement records, drives their lifecycle state
//! machines and keeps the denormalized links between them consistent on a
//! document store without multi-document transactions:
//! - [`RecordFactory`]: validated creation with best-effort back-references
//! - [`AutoPopulator`]: template TRRs for POVs entering Execution
//! - [`RelationshipEngine`]: the API surface tying it together
//! - [`api`]: the `{ success, payload?, error? }` envelope
//!
//! # Example
//!
//! ```rust,ignore
//! use relink_core::prelude::*;
//! use relink_store::MemoryStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), EngineError> {
//! let engine = RelationshipEngine::with_defaults(Arc::new(MemoryStore::new()));
//!
//! let project = engine.create_project(NewProject::new("P1", "Acme")).await?;
//! let pov = engine.create_pov(NewPov::new("Zero Trust POV"), &project, None).await?;
//! engine
//!     .create_trr(NewTrr::new("Security Assessment"), &project, Some(pov.id.clone()), None)
//!     .await?;
//!
//! let report = engine.validate_relationships(&project).await?;
//! assert!(report.valid);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod factory;
pub mod populate;

pub use api::{ApiError, ApiResponse};
pub use config::{ConfigError, EngineConfig, TemplateCatalog, TrrTemplate, DEFAULT_CATEGORY};
pub use engine::{LinkOutcome, PhaseTransition, RelationshipEngine, StatusTransition};
pub use error::EngineError;
pub use factory::{CreateOptions, Created, LinkWrite, RecordFactory};
pub use populate::{AutoPopulateReport, AutoPopulator, TemplateFailure};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the engine
    pub use crate::{
        CreateOptions, Created, EngineConfig, EngineError, LinkWrite, RelationshipEngine,
    };
    pub use relink_graph::{RepairReport, ValidationReport};
    pub use relink_lifecycle::TrrEvent;
    pub use relink_model::{
        NewPov, NewProject, NewScenario, NewTrr, PovId, PovPhase, ProjectId, ScenarioId, TrrId,
        TrrStatus,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
