//! `focus-indicators` evaluator (§4.3).

use super::ProtoIssue;
use crate::capture::PageCapture;
use crate::spec::Check;

const FOCUSABLE_TAGS: &[&str] = &["a", "button", "input", "select", "textarea"];

fn is_focusable(element: &crate::capture::ElementInfo) -> bool {
    FOCUSABLE_TAGS.contains(&element.tag.as_str()) || element.attr("tabindex").is_some()
}

fn is_none(value: Option<&str>) -> bool {
    matches!(value, None | Some("none"))
}

pub fn evaluate(capture: &PageCapture, check: &Check) -> (Vec<ProtoIssue>, Option<super::Diagnostic>) {
    let mut issues = Vec::new();

    for (handle, element) in capture.iter_elements() {
        if !is_focusable(element) {
            continue;
        }
        let outline_none = is_none(element.attr("outline-style"));
        let shadow_none = is_none(element.attr("box-shadow"));
        if outline_none && shadow_none {
            issues.push(ProtoIssue {
                check_id: check.id.clone(),
                severity: check.severity,
                element_handle: Some(handle),
                description: "Focusable element has no visible focus indicator".to_string(),
                recommendation: Some("Add a visible :focus-visible outline or box-shadow".to_string()),
                bounding_box: Some(element.bounding_box),
                details: serde_json::json!({}),
            });
        }
    }

    (issues, None)
}
