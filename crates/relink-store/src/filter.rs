//! Query filters
//!
//! A [`Filter`] is a conjunction of field conditions. Hosted adapters
//! translate it to their native query; [`Filter::matches`] is the reference
//! semantics used by the in-memory adapter.

use serde_json::Value;

/// Single field condition
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field equals value
    Eq { field: String, value: Value },
    /// Array field contains value
    Contains { field: String, value: Value },
}

impl Condition {
    fn matches(&self, doc: &Value) -> bool {
        match self {
            Condition::Eq { field, value } => doc.get(field) == Some(value),
            Condition::Contains { field, value } => doc
                .get(field)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(value)),
        }
    }
}

/// Conjunction of conditions; the empty filter matches everything
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field == value`
    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Eq {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Require the array `field` to contain `value`
    #[must_use]
    pub fn contains(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Contains {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    #[inline]
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    #[must_use]
    pub fn matches(&self, doc: &Value) -> bool {
        self.conditions.iter().all(|c| c.matches(doc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_filter_matches_everything() {
        assert!(Filter::new().matches(&json!({"id": "x"})));
    }

    #[test]
    fn eq_and_contains_are_conjunctive() {
        let doc = json!({"projectId": "p1", "povIds": ["a", "b"]});
        assert!(Filter::new()
            .eq("projectId", "p1")
            .contains("povIds", "b")
            .matches(&doc));
        assert!(!Filter::new()
            .eq("projectId", "p1")
            .contains("povIds", "c")
            .matches(&doc));
        assert!(!Filter::new().eq("projectId", "p2").matches(&doc));
    }

    #[test]
    fn contains_on_non_array_never_matches() {
        let doc = json!({"povId": "a"});
        assert!(!Filter::new().contains("povId", "a").matches(&doc));
    }
}
