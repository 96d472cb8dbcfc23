//! Relationship fields
//!
//! A link between two records is stored on both ends. [`RefField`] names
//! every field that can carry a reference; [`LinkField`] is the subset that
//! holds an array and is maintained through the relationship index.

use relink_model::RecordKind;
use relink_store::Collection;
use serde::{Serialize, Serializer};
use std::fmt;

/// Array-valued relationship field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum LinkField {
    /// `POV.trrIds`, derived from `TRR.povId`
    PovTrrIds,
    /// `POV.scenarioIds`
    PovScenarioIds,
    /// `Scenario.povIds`
    ScenarioPovIds,
}

impl LinkField {
    /// Document field name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            LinkField::PovTrrIds => "trrIds",
            LinkField::PovScenarioIds => "scenarioIds",
            LinkField::ScenarioPovIds => "povIds",
        }
    }

    #[inline]
    #[must_use]
    pub fn owner_kind(&self) -> RecordKind {
        match self {
            LinkField::PovTrrIds | LinkField::PovScenarioIds => RecordKind::Pov,
            LinkField::ScenarioPovIds => RecordKind::Scenario,
        }
    }

    #[inline]
    #[must_use]
    pub fn target_kind(&self) -> RecordKind {
        match self {
            LinkField::PovTrrIds => RecordKind::Trr,
            LinkField::PovScenarioIds => RecordKind::Scenario,
            LinkField::ScenarioPovIds => RecordKind::Pov,
        }
    }

    #[inline]
    #[must_use]
    pub fn collection(&self) -> Collection {
        Collection::of(self.owner_kind())
    }
}

impl fmt::Display for LinkField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Any field that references another record
///
/// Serializes as the document field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RefField {
    /// `TRR.povId`, the authoritative side of POV <-> TRR
    TrrPovId,
    Link(LinkField),
}

impl RefField {
    pub const POV_TRR_IDS: RefField = RefField::Link(LinkField::PovTrrIds);
    pub const POV_SCENARIO_IDS: RefField = RefField::Link(LinkField::PovScenarioIds);
    pub const SCENARIO_POV_IDS: RefField = RefField::Link(LinkField::ScenarioPovIds);

    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            RefField::TrrPovId => "povId",
            RefField::Link(link) => link.name(),
        }
    }

    #[inline]
    #[must_use]
    pub fn as_link(&self) -> Option<LinkField> {
        match self {
            RefField::TrrPovId => None,
            RefField::Link(link) => Some(*link),
        }
    }
}

impl fmt::Display for RefField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for RefField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}
