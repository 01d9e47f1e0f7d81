//! Page capture: the read-only snapshot of a reviewed page (§3.2).
//!
//! Everything downstream (checks, selector synthesis, annotation) reads
//! from a [`PageCapture`] taken once per review; nothing re-enters the
//! browser after capture completes (§4.3 contract boundary, §9 element
//! handle indirection).

mod driver;

pub use driver::BrowserDriver;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A capture-scoped integer index into [`PageCapture::elements`]. Never a
/// live DOM reference — safe to serialize and to outlive the browser.
pub type ElementHandle = usize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn min_dimension(&self) -> f64 {
        self.width.min(self.height)
    }
}

/// A minimal ancestor descriptor used both by selector synthesis (§4.4)
/// and the bounded DOM tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AncestorInfo {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub classes: Vec<String>,
    /// Computed `background-color`, used to walk up to an opaque
    /// background when the element itself is transparent (§4.3).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
}

/// Per-element data captured once at review time (§3.2).
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ElementInfo {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub classes: Vec<String>,
    /// Selected computed style properties relevant to checks (color,
    /// background-color, outline-style, box-shadow, font-size, ...).
    #[serde(default)]
    pub computed_styles: HashMap<String, String>,
    pub bounding_box: BoundingBox,
    /// Ancestor chain, closest first, truncated to 3 (§3.2).
    #[serde(default)]
    pub parent_chain: Vec<AncestorInfo>,
    /// Truncated to 100 chars (full mode) / 50 (compact mode, §3.2).
    #[serde(default)]
    pub text_content: String,
}

impl ElementInfo {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.computed_styles.get(key).map(String::as_str)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.attr("role").map(|r| r.eq_ignore_ascii_case(role)).unwrap_or(false)
    }
}

/// A bounded DOM node, depth/children/text capped per §3.2.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct DomNode {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub children: Vec<DomNode>,
}

/// A11y violation impact, ordered for weighting (§4.3 `accessibility-grade`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum A11yImpact {
    Critical,
    Serious,
    Moderate,
    Minor,
}

impl A11yImpact {
    pub fn weight(self) -> u32 {
        match self {
            A11yImpact::Critical => 4,
            A11yImpact::Serious => 2,
            A11yImpact::Moderate => 1,
            A11yImpact::Minor => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct A11yNode {
    pub html: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct A11yViolation {
    pub id: String,
    pub impact: A11yImpact,
    pub description: String,
    #[serde(default)]
    pub nodes: Vec<A11yNode>,
}

/// Outcome of the in-page accessibility engine scan (§6.1). `Skipped`
/// when the scan itself failed to run (§4.2 failure semantics).
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct A11yReport {
    pub violations: Vec<A11yViolation>,
    #[serde(default)]
    pub skipped: bool,
}

impl A11yReport {
    /// `critical*4 + serious*2 + moderate*1` (§4.3).
    pub fn weighted_score(&self) -> u32 {
        self.violations.iter().map(|v| v.impact.weight()).sum()
    }
}

/// The full read-only snapshot of a page at review time (§3.2).
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PageCapture {
    pub url: String,
    pub viewport: Viewport,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub screenshot_path: String,
    #[serde(default)]
    pub dom_tree: Option<DomNode>,
    #[serde(default)]
    pub a11y_report: A11yReport,
    #[serde(default)]
    pub elements: Vec<ElementInfo>,
}

impl PageCapture {
    pub fn element(&self, handle: ElementHandle) -> Option<&ElementInfo> {
        self.elements.get(handle)
    }

    pub fn iter_elements(&self) -> impl Iterator<Item = (ElementHandle, &ElementInfo)> {
        self.elements.iter().enumerate()
    }
}
