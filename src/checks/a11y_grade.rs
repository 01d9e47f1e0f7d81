//! `accessibility-grade` evaluator (§4.3).

use super::{Diagnostic, ProtoIssue};
use crate::capture::PageCapture;
use crate::spec::Check;

/// Letter grade from the weighted a11y violation score: `critical*4 +
/// serious*2 + moderate*1` (moderate/minor below the weight threshold
/// don't move the needle on their own).
pub fn grade_for_score(score: u32) -> &'static str {
    match score {
        0 => "A",
        1..=3 => "B",
        4..=10 => "C",
        _ => "F",
    }
}

fn grade_rank(grade: &str) -> u8 {
    match grade {
        "A" => 0,
        "B" => 1,
        "C" => 2,
        _ => 3,
    }
}

pub fn evaluate(capture: &PageCapture, check: &Check) -> (Vec<ProtoIssue>, Option<Diagnostic>) {
    if capture.a11y_report.skipped {
        return (Vec::new(), Some(Diagnostic {
            check_id: check.id.clone(),
            kind: "Skipped".to_string(),
            message: "a11y scan did not complete; grade cannot be computed".to_string(),
        }));
    }

    let score = capture.a11y_report.weighted_score();
    let grade = grade_for_score(score);
    let minimum_grade = check.config_str("minimum_grade").unwrap_or("C");

    if grade_rank(grade) > grade_rank(minimum_grade) {
        (
            vec![ProtoIssue {
                check_id: check.id.clone(),
                severity: check.severity,
                element_handle: None,
                description: format!(
                    "Accessibility grade {grade} (score {score}) is worse than the required {minimum_grade}"
                ),
                recommendation: Some("Resolve the accessibility violations reported by the a11y scan".to_string()),
                bounding_box: None,
                details: serde_json::json!({
                    "grade": grade,
                    "score": score,
                    "minimum_grade": minimum_grade,
                    "violations": capture.a11y_report.violations.len(),
                }),
            }],
            None,
        )
    } else {
        (Vec::new(), None)
    }
}
