//! `touch-targets` evaluator (§4.3).

use super::ProtoIssue;
use crate::capture::PageCapture;
use crate::spec::Check;

const INTERACTIVE_TAGS: &[&str] = &["button", "a", "select"];
const INTERACTIVE_ROLES: &[&str] = &["button", "link", "menuitem"];

fn is_interactive(element: &crate::capture::ElementInfo) -> bool {
    if INTERACTIVE_TAGS.contains(&element.tag.as_str()) {
        return true;
    }
    if element.tag == "input" {
        return matches!(element.attr("type"), Some("button") | Some("submit"));
    }
    INTERACTIVE_ROLES.iter().any(|role| element.has_role(role))
}

pub fn evaluate(capture: &PageCapture, check: &Check) -> (Vec<ProtoIssue>, Option<super::Diagnostic>) {
    let minimum = check.config_f64("minimum_size", 44.0);
    let mut issues = Vec::new();

    for (handle, element) in capture.iter_elements() {
        if !is_interactive(element) {
            continue;
        }
        let (width, height) = (element.bounding_box.width, element.bounding_box.height);
        if element.bounding_box.min_dimension() < minimum {
            issues.push(ProtoIssue {
                check_id: check.id.clone(),
                severity: check.severity,
                element_handle: Some(handle),
                description: format!(
                    "Touch target is {width:.0}x{height:.0}px, below the required {minimum:.0}px minimum"
                ),
                recommendation: Some("Increase the element's hit area to at least the minimum size".to_string()),
                bounding_box: Some(element.bounding_box),
                details: serde_json::json!({ "width": width, "height": height, "minimum": minimum }),
            });
        }
    }

    (issues, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{BoundingBox, ElementInfo};
    use std::collections::HashMap;

    fn check() -> Check {
        let mut config = HashMap::new();
        config.insert("minimum_size".to_string(), crate::spec::ConfigValue::Scalar("44".to_string()));
        Check {
            id: "touch-targets".into(),
            severity: crate::spec::Severity::Major,
            description: String::new(),
            config,
            how_to_check: None,
            approved_values: None,
        }
    }

    #[test]
    fn small_button_is_flagged() {
        let element = ElementInfo {
            tag: "button".into(),
            bounding_box: BoundingBox { x: 0.0, y: 0.0, width: 24.0, height: 24.0 },
            ..Default::default()
        };
        let capture = PageCapture { elements: vec![element], ..Default::default() };
        let (issues, _) = evaluate(&capture, &check());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].details["width"], 24.0);
        assert_eq!(issues[0].details["height"], 24.0);
        assert_eq!(issues[0].details["minimum"], 44.0);
    }

    #[test]
    fn non_interactive_element_is_ignored() {
        let element = ElementInfo {
            tag: "div".into(),
            bounding_box: BoundingBox { x: 0.0, y: 0.0, width: 5.0, height: 5.0 },
            ..Default::default()
        };
        let capture = PageCapture { elements: vec![element], ..Default::default() };
        assert!(evaluate(&capture, &check()).0.is_empty());
    }

    #[test]
    fn large_enough_button_passes() {
        let element = ElementInfo {
            tag: "button".into(),
            bounding_box: BoundingBox { x: 0.0, y: 0.0, width: 48.0, height: 48.0 },
            ..Default::default()
        };
        let capture = PageCapture { elements: vec![element], ..Default::default() };
        assert!(evaluate(&capture, &check()).0.is_empty());
    }
}
