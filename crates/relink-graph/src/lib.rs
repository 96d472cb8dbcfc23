//! Relink Graph
//!
//! Referential integrity for denormalized links between engagement records:
//! - [`RelationshipIndex`]: link queries and idempotent set-semantics writes
//! - [`ProjectGraph`]: snapshot of one project's records
//! - [`GraphValidator`]: invariant checks producing a [`ValidationReport`]
//! - [`GraphRepairer`]: canonical-direction fixes producing a [`RepairReport`]
//!
//! The store has no transactions, so the graph may be briefly inconsistent
//! after any write. Validate and repair converge it again.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod index;
mod links;
mod repairer;
mod report;
mod snapshot;
mod validator;

pub use index::RelationshipIndex;
pub use links::{LinkField, RefField};
pub use repairer::{plan_repairs, GraphRepairer, RepairAction, RepairPlan};
pub use report::{
    EntityRef, GraphWarning, ReferenceError, ReferenceErrorKind, RepairConflictError,
    RepairIssue, RepairReport, ValidationReport, WarningKind,
};
pub use snapshot::{MalformedRecord, ProjectGraph, RelationshipGraph, Relationships, Resolution};
pub use validator::GraphValidator;
