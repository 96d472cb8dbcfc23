//! Relink Model
//!
//! Typed records for the engagement platform:
//! - [`Project`]: tenancy boundary for every other record
//! - [`Pov`]: Proof of Value trial, owns links to TRRs and scenarios
//! - [`Trr`]: Technical Risk Review, points at its POV
//! - [`Scenario`]: demo script shared by many POVs
//!
//! Records are only built from validated drafts ([`NewPov`], [`NewTrr`], ...),
//! so a record in hand never needs re-validation.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod draft;
mod ids;
mod record;
mod validation;

pub use draft::{Draft, NewPov, NewProject, NewScenario, NewTrr};
pub use ids::{PovId, ProjectId, ScenarioId, TrrId};
pub use record::{
    Pov, PovPhase, Project, ProjectStatus, Record, RecordKind, Scenario, StoredRecord, Trr,
    TrrStatus, UnknownState,
};
pub use validation::{ValidationError, ValidationLimits};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
