//! Check registry & evaluators (§4.3).
//!
//! A check-id names a pure function `evaluator(capture, config) -> [ProtoIssue]`.
//! The registry maps built-in ids to evaluators; unknown ids produce a
//! single `Skipped` diagnostic, never an error — consumers register
//! additional evaluators before invoking the orchestrator (§9 "Check
//! extensibility"): there is no dynamic-dispatch evaluator hierarchy, only
//! data (`config`) driving a shared function signature.

mod a11y_grade;
mod alt_text;
mod contrast;
mod focus;
mod touch_targets;

use crate::capture::{BoundingBox, ElementHandle, PageCapture};
use crate::spec::Check;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A check's verdict before its element handle has been resolved to a
/// `cssSelector` (§3.3) — that resolution happens once, centrally, in the
/// orchestrator (§4.2 step 5), not inside each evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtoIssue {
    pub check_id: String,
    pub severity: crate::spec::Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_handle: Option<ElementHandle>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    #[serde(default)]
    pub details: serde_json::Value,
}

/// A fully-assembled issue (§3.3): sequential id and resolved selector
/// attached by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Issue {
    pub id: usize,
    pub check_id: String,
    pub pillar: String,
    pub severity: crate::spec::Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css_selector: Option<String>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    #[serde(default)]
    pub details: serde_json::Value,
}

/// A non-fatal per-check failure recorded instead of aborting the review
/// (§4.2 failure semantics, §7 `EvaluatorError`).
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Diagnostic {
    pub check_id: String,
    pub kind: String,
    pub message: String,
}

impl Diagnostic {
    pub fn skipped(check_id: &str) -> Self {
        Self {
            check_id: check_id.to_string(),
            kind: "Skipped".to_string(),
            message: format!("no evaluator registered for check `{check_id}`"),
        }
    }
}

type EvaluatorFn = Box<dyn Fn(&PageCapture, &Check) -> (Vec<ProtoIssue>, Option<Diagnostic>) + Send + Sync>;

/// Maps check ids to evaluator functions. Built with [`Registry::with_builtins`]
/// and extended via [`Registry::register`] before being handed to the
/// orchestrator.
pub struct Registry {
    evaluators: HashMap<String, EvaluatorFn>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl Registry {
    pub fn empty() -> Self {
        Self { evaluators: HashMap::new() }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("color-contrast", contrast::evaluate);
        registry.register("touch-targets", touch_targets::evaluate);
        registry.register("focus-indicators", focus::evaluate);
        registry.register("alt-text", alt_text::evaluate);
        registry.register("accessibility-grade", a11y_grade::evaluate);
        registry
    }

    pub fn register(
        &mut self,
        check_id: &str,
        evaluator: impl Fn(&PageCapture, &Check) -> (Vec<ProtoIssue>, Option<Diagnostic>) + Send + Sync + 'static,
    ) {
        self.evaluators.insert(check_id.to_string(), Box::new(evaluator));
    }

    /// Evaluate `check` against `capture`. A missing evaluator yields a
    /// `Skipped` diagnostic rather than an error (§4.3 "Model"); a
    /// registered evaluator may emit its own diagnostic (e.g. a capture
    /// precondition it depends on failed) alongside or instead of issues.
    pub fn evaluate(&self, capture: &PageCapture, check: &Check) -> (Vec<ProtoIssue>, Option<Diagnostic>) {
        match self.evaluators.get(&check.id) {
            Some(eval) => eval(capture, check),
            None => (Vec::new(), Some(Diagnostic::skipped(&check.id))),
        }
    }
}
