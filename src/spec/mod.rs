//! Design review specifications.
//!
//! A [`Spec`] is a named, versioned collection of [`Pillar`]s, each holding
//! [`Check`]s. Specs are authored as markdown files with a YAML frontmatter
//! block (see [`markdown`]) and may `extends` a parent spec, in which case
//! checks are merged by id and a dedicated `## Overrides` section can patch
//! severity/config on inherited checks (§4.1).

mod loader;
mod markdown;

pub use loader::{SpecCache, SpecLoader};

use crate::error::{Error, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A fully-resolved specification: every inherited check merged in,
/// overrides applied, ready to drive a review.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Spec {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    #[serde(default)]
    pub pillars: Vec<Pillar>,
    /// Provenance chain this spec was resolved from, most-derived first.
    /// Populated by the loader; absent on freshly-constructed specs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resolved_from: Vec<String>,
    /// Non-fatal issues surfaced during resolution (e.g. a dangling override).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// A named grouping of related checks, e.g. "Quality Craft".
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Pillar {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub checks: Vec<Check>,
}

/// One reviewable property.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Check {
    /// Stable, kebab-case, unique within the resolved spec.
    pub id: String,
    pub severity: Severity,
    #[serde(default)]
    pub description: String,
    /// Opaque scalar/list config knobs (§3.1).
    #[serde(default)]
    pub config: HashMap<String, ConfigValue>,
    /// Free-form human guidance. Never executed (§1 Non-goals).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub how_to_check: Option<String>,
    /// Tokens accepted for lookup-style checks (colors, fonts, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_values: Option<Vec<String>>,
}

impl Check {
    pub fn config_str(&self, key: &str) -> Option<&str> {
        match self.config.get(key)? {
            ConfigValue::Scalar(s) => Some(s.as_str()),
            ConfigValue::List(_) => None,
        }
    }

    pub fn config_f64(&self, key: &str, default: f64) -> f64 {
        self.config_str(key).and_then(|s| s.parse().ok()).unwrap_or(default)
    }

    pub fn config_u32(&self, key: &str, default: u32) -> u32 {
        self.config_str(key).and_then(|s| s.parse().ok()).unwrap_or(default)
    }

    pub fn config_list(&self, key: &str) -> Vec<String> {
        match self.config.get(key) {
            Some(ConfigValue::List(items)) => items.clone(),
            Some(ConfigValue::Scalar(s)) => vec![s.clone()],
            None => Vec::new(),
        }
    }
}

/// A single config value: either a scalar token or a list of tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ConfigValue {
    Scalar(String),
    List(Vec<String>),
}

/// Check severity. Out-of-vocabulary tokens are a load-time error (§3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Minor,
    Major,
    Blocking,
}

impl Severity {
    pub fn parse(token: &str) -> Result<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "blocking" => Ok(Severity::Blocking),
            "major" => Ok(Severity::Major),
            "minor" => Ok(Severity::Minor),
            other => Err(Error::SpecInvalidSeverity(other.to_string())),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Blocking => write!(f, "blocking"),
            Severity::Major => write!(f, "major"),
            Severity::Minor => write!(f, "minor"),
        }
    }
}

impl Spec {
    /// Parse a standalone (non-inheriting) spec from its markdown source.
    /// Used directly by tests; real loads go through [`SpecLoader`] so
    /// `extends` is resolved.
    pub fn from_markdown(source: &str) -> Result<Self> {
        markdown::parse(source)
    }

    /// All checks across all pillars, in spec order (pillar order, then
    /// check order within the pillar). This is the order issue ids follow (§4.2 step 5).
    pub fn checks_in_order(&self) -> impl Iterator<Item = (&Pillar, &Check)> {
        self.pillars.iter().flat_map(|p| p.checks.iter().map(move |c| (p, c)))
    }

    pub fn get_check(&self, id: &str) -> Option<(&Pillar, &Check)> {
        self.checks_in_order().find(|(_, c)| c.id == id)
    }

    /// Validate spec-level invariants (§3.1): unique check ids, valid severities
    /// (already enforced at parse time), non-empty id.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.name.is_empty() {
            errors.push("spec name is required".to_string());
        }
        let mut seen = std::collections::HashSet::new();
        for (_, check) in self.checks_in_order() {
            if !seen.insert(check.id.as_str()) {
                errors.push(format!("duplicate check id: {}", check.id));
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_parses_vocabulary() {
        assert_eq!(Severity::parse("blocking").unwrap(), Severity::Blocking);
        assert_eq!(Severity::parse("Major").unwrap(), Severity::Major);
        assert!(Severity::parse("catastrophic").is_err());
    }

    #[test]
    fn checks_in_order_flattens_pillars() {
        let spec = Spec {
            name: "s".into(),
            version: "1.0".into(),
            extends: None,
            pillars: vec![
                Pillar {
                    name: "A".into(),
                    description: None,
                    checks: vec![mk_check("a1"), mk_check("a2")],
                },
                Pillar { name: "B".into(), description: None, checks: vec![mk_check("b1")] },
            ],
            resolved_from: vec![],
            warnings: vec![],
        };
        let ids: Vec<_> = spec.checks_in_order().map(|(_, c)| c.id.clone()).collect();
        assert_eq!(ids, vec!["a1", "a2", "b1"]);
    }

    fn mk_check(id: &str) -> Check {
        Check {
            id: id.into(),
            severity: Severity::Minor,
            description: String::new(),
            config: HashMap::new(),
            how_to_check: None,
            approved_values: None,
        }
    }
}
