//! `alt-text` evaluator (§4.3).

use super::ProtoIssue;
use crate::capture::PageCapture;
use crate::spec::{Check, Severity};

const MIN_ALT_LENGTH: usize = 5;

pub fn evaluate(capture: &PageCapture, check: &Check) -> (Vec<ProtoIssue>, Option<super::Diagnostic>) {
    let mut issues = Vec::new();

    for (handle, element) in capture.iter_elements() {
        if element.tag != "img" {
            continue;
        }
        match element.attr("alt") {
            None => issues.push(ProtoIssue {
                check_id: check.id.clone(),
                severity: Severity::Blocking,
                element_handle: Some(handle),
                description: "Image is missing an alt attribute".to_string(),
                recommendation: Some("Add a descriptive alt attribute".to_string()),
                bounding_box: Some(element.bounding_box),
                details: serde_json::json!({}),
            }),
            Some(alt) if alt.trim().chars().count() < MIN_ALT_LENGTH => issues.push(ProtoIssue {
                check_id: check.id.clone(),
                severity: Severity::Minor,
                element_handle: Some(handle),
                description: format!("Image alt text \"{alt}\" is likely too short to be descriptive"),
                recommendation: Some("Use a more descriptive alt attribute".to_string()),
                bounding_box: Some(element.bounding_box),
                details: serde_json::json!({ "alt": alt }),
            }),
            Some(_) => {}
        }
    }

    (issues, None)
}
