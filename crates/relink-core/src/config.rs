//! Engine configuration
//!
//! Everything is optional in TOML; missing keys take the defaults below.
//!
//! ```toml
//! create_relationships_by_default = true
//! auto_populate_on_execution = true
//!
//! [limits]
//! max_title_len = 200
//! max_description_len = 2000
//!
//! [[templates.default]]
//! key = "security-assessment"
//! title = "Security Assessment"
//! ```
//!
//! A `templates` table replaces the built-in catalog as a whole.

use relink_model::ValidationLimits;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Category used when a POV has none, or one without templates
pub const DEFAULT_CATEGORY: &str = "default";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot parse engine config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid engine config: {0}")]
    Invalid(String),
}

/// One TRR the orchestrator creates for a POV
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrrTemplate {
    /// Stable key stored as `TRR.templateKey`
    pub key: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TrrTemplate {
    #[must_use]
    pub fn new(key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            description: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// TRR templates keyed by POV category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateCatalog {
    categories: BTreeMap<String, Vec<TrrTemplate>>,
}

impl TemplateCatalog {
    /// Catalog with no categories at all
    #[must_use]
    pub fn empty() -> Self {
        Self {
            categories: BTreeMap::new(),
        }
    }

    /// Add or replace the templates of `category`
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>, templates: Vec<TrrTemplate>) -> Self {
        self.categories.insert(category.into(), templates);
        self
    }

    /// Templates for a POV category, falling back to [`DEFAULT_CATEGORY`]
    #[must_use]
    pub fn for_category(&self, category: Option<&str>) -> &[TrrTemplate] {
        category
            .and_then(|c| self.categories.get(c.trim()))
            .or_else(|| self.categories.get(DEFAULT_CATEGORY))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (category, templates) in &self.categories {
            let mut keys = HashSet::new();
            for template in templates {
                if template.key.trim().is_empty() || template.title.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "category `{category}` has a template with a blank key or title"
                    )));
                }
                if !keys.insert(template.key.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "category `{category}` repeats template key `{}`",
                        template.key
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self::empty().with_category(
            DEFAULT_CATEGORY,
            vec![
                TrrTemplate::new("security-assessment", "Security Assessment")
                    .with_description("Threat model, control gaps and security findings"),
                TrrTemplate::new("architecture-review", "Architecture Review")
                    .with_description("Fit of the proposed architecture with the customer estate"),
                TrrTemplate::new("operational-readiness", "Operational Readiness")
                    .with_description("Runbooks, monitoring and support handover"),
            ],
        )
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Text length limits for new records
    pub limits: ValidationLimits,
    /// Default of `CreateOptions::create_relationships`
    pub create_relationships_by_default: bool,
    /// Run auto-population when a POV enters Execution
    pub auto_populate_on_execution: bool,
    pub templates: TemplateCatalog,
}

impl EngineConfig {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document
    ///
    /// # Errors
    /// Returns [`ConfigError`] on malformed TOML or inconsistent values
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Check limits and templates
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] describing the first problem
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_title_len == 0 || self.limits.max_description_len == 0 {
            return Err(ConfigError::Invalid(
                "length limits must be greater than zero".to_string(),
            ));
        }
        self.templates.validate()
    }

    #[inline]
    #[must_use]
    pub fn with_limits(mut self, limits: ValidationLimits) -> Self {
        self.limits = limits;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_create_relationships_by_default(mut self, enabled: bool) -> Self {
        self.create_relationships_by_default = enabled;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_auto_populate_on_execution(mut self, enabled: bool) -> Self {
        self.auto_populate_on_execution = enabled;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_templates(mut self, templates: TemplateCatalog) -> Self {
        self.templates = templates;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            limits: ValidationLimits::default(),
            create_relationships_by_default: true,
            auto_populate_on_execution: true,
            templates: TemplateCatalog::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.limits.max_title_len, 200);
        assert_eq!(config.templates.for_category(None).len(), 3);
    }

    #[test]
    fn toml_overrides_limits_and_templates() {
        let config = EngineConfig::from_toml_str(
            r#"
            auto_populate_on_execution = false

            [limits]
            max_title_len = 80

            [[templates.cloud]]
            key = "landing-zone"
            title = "Landing Zone Review"

            [[templates.default]]
            key = "kickoff"
            title = "Kickoff Review"
            "#,
        )
        .unwrap();

        assert!(!config.auto_populate_on_execution);
        assert!(config.create_relationships_by_default);
        assert_eq!(config.limits.max_title_len, 80);
        assert_eq!(config.limits.max_description_len, 2000);
        assert_eq!(config.templates.for_category(Some("cloud"))[0].key, "landing-zone");
        assert_eq!(config.templates.for_category(Some("unknown"))[0].key, "kickoff");
    }

    #[test]
    fn unknown_category_falls_back_to_default() {
        let catalog = TemplateCatalog::default();
        let keys: Vec<_> = catalog
            .for_category(Some("data-platform"))
            .iter()
            .map(|t| t.key.as_str())
            .collect();
        assert_eq!(
            keys,
            ["security-assessment", "architecture-review", "operational-readiness"]
        );
        assert!(TemplateCatalog::empty().for_category(None).is_empty());
    }

    #[test]
    fn duplicate_template_keys_are_rejected() {
        let err = EngineConfig::from_toml_str(
            r#"
            [[templates.default]]
            key = "a"
            title = "A"

            [[templates.default]]
            key = "a"
            title = "Again"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_limits_are_rejected() {
        let err = EngineConfig::from_toml_str("[limits]\nmax_title_len = 0\n").unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = EngineConfig::from_toml_str("limits = 5").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
