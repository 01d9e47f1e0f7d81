//! Review orchestrator (§4.2): runs the full pipeline for one URL.

use crate::annotate;
use crate::budget::Budgeter;
use crate::capture::{BrowserDriver, PageCapture, Viewport};
use crate::checks::{Diagnostic, Issue, Registry};
use crate::compare::{self, CompareMethod as InnerCompareMethod, ComparisonResult, DiffStyle};
use crate::error::{Error, Result};
use crate::events::{Event, EventBus};
use crate::selector;
use crate::session::{
    Artifacts, IssueSummary, PillarGrade, Report, SessionManifest, SessionStore, SpecSummary, Summary,
    SCHEMA_VERSION,
};
use crate::spec::{Severity, Spec, SpecLoader};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ReviewOptions {
    pub scope_selector: Option<String>,
    pub annotate: bool,
    pub compact: bool,
    pub generate_tasks: bool,
    pub generate_markdown: bool,
    pub session_id: Option<String>,
    pub viewport: Viewport,
    pub navigation_timeout: Duration,
}

impl Default for ReviewOptions {
    fn default() -> Self {
        Self {
            scope_selector: None,
            annotate: false,
            compact: false,
            generate_tasks: false,
            generate_markdown: false,
            session_id: None,
            viewport: Viewport { width: 1280, height: 800 },
            navigation_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReviewResult {
    pub ok: bool,
    pub session_id: String,
    pub summary: Summary,
    pub pillar_grades: std::collections::HashMap<String, PillarGrade>,
    pub issues: Vec<Issue>,
    pub diagnostics: Vec<Diagnostic>,
    pub session_dir: PathBuf,
}

/// Run the review pipeline end-to-end for one URL (§4.2 "Algorithm (review)").
pub async fn review(
    url: &str,
    spec_id: &str,
    loader: &SpecLoader,
    registry: &Registry,
    store: &SessionStore,
    options: ReviewOptions,
) -> Result<ReviewResult> {
    review_with_bus(url, spec_id, loader, registry, store, options, None).await
}

pub async fn review_with_bus(
    url: &str,
    spec_id: &str,
    loader: &SpecLoader,
    registry: &Registry,
    store: &SessionStore,
    options: ReviewOptions,
    bus: Option<&EventBus>,
) -> Result<ReviewResult> {
    let spec = loader.load(spec_id)?;
    let start_time = chrono::Utc::now();
    let session_id = options
        .session_id
        .clone()
        .unwrap_or_else(|| crate::session::new_review_session_id(start_time.timestamp_subsec_millis()));

    if let Some(bus) = bus {
        bus.emit(Event::ReviewStarted { url: url.to_string(), session_id: session_id.clone(), spec: spec.name.clone() });
    }

    let session_dir = store.create_session_dir(&session_id)?;

    let outcome = run_review_pipeline(url, &spec, registry, store, &session_dir, &options, bus).await;

    match outcome {
        Ok((mut issues, mut diagnostics, summary, pillar_grades, artifacts)) => {
            if options.compact {
                for issue in &mut issues {
                    issue.details = serde_json::Value::Null;
                    issue.recommendation = None;
                }
                let dropped = enforce_compact_budget(&mut issues);
                if dropped > 0 {
                    diagnostics.push(Diagnostic {
                        check_id: "*".to_string(),
                        kind: "BudgetTruncated".to_string(),
                        message: format!(
                            "compact mode dropped {dropped} lowest-severity issue(s) to stay within the compact-mode token budget"
                        ),
                    });
                }
            }

            let manifest = SessionManifest {
                schema_version: SCHEMA_VERSION.to_string(),
                session_id: session_id.clone(),
                url: url.to_string(),
                start_time,
                end_time: chrono::Utc::now(),
                spec: SpecSummary {
                    name: spec.name.clone(),
                    version: spec.version.clone(),
                    resolved_from: spec.resolved_from.clone(),
                },
                summary: summary.clone(),
                pillar_grades: pillar_grades.clone(),
                issues: issues.iter().map(IssueSummary::from).collect(),
                artifacts: artifacts.clone(),
            };
            store.write_manifest(&session_dir, &manifest)?;
            store.write_report(&session_dir, &Report { issues: issues.clone(), diagnostics: diagnostics.clone() })?;

            if let Some(bus) = bus {
                bus.emit(Event::ReviewCompleted {
                    session_id: session_id.clone(),
                    summary: serde_json::to_value(&summary)?,
                    pillar_grades: serde_json::to_value(&pillar_grades)?,
                });
            }

            Ok(ReviewResult {
                ok: true,
                session_id,
                summary,
                pillar_grades,
                issues,
                diagnostics,
                session_dir,
            })
        }
        Err(err) => {
            store.discard(&session_dir);
            Err(err)
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_review_pipeline(
    url: &str,
    spec: &Spec,
    registry: &Registry,
    store: &SessionStore,
    session_dir: &std::path::Path,
    options: &ReviewOptions,
    bus: Option<&EventBus>,
) -> Result<(
    Vec<Issue>,
    Vec<Diagnostic>,
    Summary,
    std::collections::HashMap<String, PillarGrade>,
    Artifacts,
)> {
    let driver = BrowserDriver::launch(options.viewport).await?;
    let page = driver.navigate(url, Some(options.navigation_timeout)).await?;
    let capture = driver.capture(&page, session_dir, options.scope_selector.as_deref()).await?;

    let (mut proto_issues, diagnostics) = run_checks(&capture, spec, registry);

    let mut issues: Vec<Issue> = Vec::with_capacity(proto_issues.len());
    for (position, proto) in proto_issues.drain(..).enumerate() {
        let (pillar, _) =
            spec.get_check(&proto.check_id).ok_or_else(|| Error::EvaluatorError {
                check_id: proto.check_id.clone(),
                message: "issue references unknown check".to_string(),
            })?;
        let element = proto.element_handle.and_then(|h| capture.element(h));
        let css_selector = element.map(selector::synthesize);
        let issue = Issue {
            id: position + 1,
            check_id: proto.check_id,
            pillar: pillar.name.clone(),
            severity: proto.severity,
            element: element.map(|e| e.tag.clone()),
            css_selector,
            description: proto.description,
            recommendation: proto.recommendation,
            bounding_box: proto.bounding_box,
            details: proto.details,
        };
        if let Some(bus) = bus {
            bus.emit(Event::ReviewIssueFound { issue: issue.clone() });
        }
        issues.push(issue);
    }

    let summary = summarize(spec, &issues);
    let pillar_grades = grade_pillars(spec, &issues, &diagnostics);

    let mut artifacts = Artifacts { screenshot: Some(capture.screenshot_path.clone()), ..Default::default() };

    if options.annotate {
        match render_annotation(&capture, &issues, store, session_dir) {
            Ok(path) => artifacts.annotated = Some(path.to_string_lossy().to_string()),
            Err(_) => artifacts.annotated = None,
        }
    }

    if options.generate_markdown {
        let path = store.write_markdown(session_dir, &issues)?;
        artifacts.markdown = Some(path.to_string_lossy().to_string());
    }

    artifacts.report = Some(session_dir.join("report.json").to_string_lossy().to_string());

    Ok((issues, diagnostics, summary, pillar_grades, artifacts))
}

fn run_checks(capture: &PageCapture, spec: &Spec, registry: &Registry) -> (Vec<crate::checks::ProtoIssue>, Vec<Diagnostic>) {
    let mut all_issues = Vec::new();
    let mut diagnostics = Vec::new();

    for (_, check) in spec.checks_in_order() {
        let (issues, diagnostic) = registry.evaluate(capture, check);
        all_issues.extend(issues);
        diagnostics.extend(diagnostic);
    }

    (all_issues, diagnostics)
}

/// Annotator failures are recoverable (§7 `AnnotationError`): the review
/// still succeeds, just without `annotated.png`.
fn render_annotation(
    capture: &PageCapture,
    issues: &[Issue],
    store: &SessionStore,
    session_dir: &std::path::Path,
) -> Result<PathBuf> {
    let screenshot = image::open(&capture.screenshot_path)
        .map_err(|e| Error::AnnotationError(e.to_string()))?
        .to_rgba8();
    let annotated = annotate::annotate(&screenshot, issues)?;
    store.write_image(session_dir, "annotated.png", &annotated)
}

/// Drop the lowest-severity issues first until the compact-mode payload
/// fits the token budget (§4.7, §8 scenario F). Blocking issues are never
/// dropped; if minor+major removal alone can't close the gap, the payload
/// is handed back over budget rather than hiding a blocking finding.
fn enforce_compact_budget(issues: &mut Vec<Issue>) -> usize {
    let mut dropped = 0;
    loop {
        let mut budgeter = Budgeter::compact_default();
        if let Ok(text) = serde_json::to_string(issues) {
            budgeter.record(&text);
        }
        if !budgeter.exceeded() {
            break;
        }
        let drop_at = issues
            .iter()
            .position(|i| i.severity == Severity::Minor)
            .or_else(|| issues.iter().position(|i| i.severity == Severity::Major));
        match drop_at {
            Some(idx) => {
                issues.remove(idx);
                dropped += 1;
            }
            None => break,
        }
    }
    dropped
}

fn summarize(spec: &Spec, issues: &[Issue]) -> Summary {
    let mut summary = Summary::default();
    for issue in issues {
        match issue.severity {
            Severity::Blocking => summary.blocking += 1,
            Severity::Major => summary.major += 1,
            Severity::Minor => summary.minor += 1,
        }
    }
    let total_checks = spec.checks_in_order().count();
    summary.passing = total_checks.saturating_sub(issues.len());
    summary
}

/// Pillar grade (§4.2 step 6): no blocking + no major → A if all pass else
/// B; any major without blocking → C; any blocking → F.
fn grade_pillars(
    spec: &Spec,
    issues: &[Issue],
    diagnostics: &[Diagnostic],
) -> std::collections::HashMap<String, PillarGrade> {
    let mut grades = std::collections::HashMap::new();

    for pillar in &spec.pillars {
        let check_ids: std::collections::HashSet<_> = pillar.checks.iter().map(|c| c.id.as_str()).collect();
        let pillar_issues: Vec<_> = issues.iter().filter(|i| check_ids.contains(i.check_id.as_str())).collect();

        let blocking = pillar_issues.iter().filter(|i| i.severity == Severity::Blocking).count();
        let major = pillar_issues.iter().filter(|i| i.severity == Severity::Major).count();
        let minor = pillar_issues.iter().filter(|i| i.severity == Severity::Minor).count();
        let attention = major + minor;

        let has_diagnostic = pillar.checks.iter().any(|c| diagnostics.iter().any(|d| d.check_id == c.id));
        let all_pass = pillar_issues.is_empty() && !has_diagnostic;

        let grade = if blocking > 0 {
            "F"
        } else if major > 0 {
            "C"
        } else if all_pass {
            "A"
        } else {
            "B"
        };

        let passing = pillar.checks.len().saturating_sub(pillar_issues.len());
        grades.insert(
            pillar.name.clone(),
            PillarGrade { grade: grade.to_string(), passing, attention, blocking },
        );
    }

    grades
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareDiffStyle {
    Overlay,
    SideBySide,
    Heatmap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareMethod {
    Pixel,
    Ssim,
    Hybrid,
}

#[derive(Debug, Clone, Copy)]
pub struct CompareOptions {
    pub pixel_threshold: f64,
    pub ssim_threshold: f64,
    pub diff_style: CompareDiffStyle,
    pub viewport_only: bool,
    pub method: CompareMethod,
    pub viewport: Viewport,
    pub navigation_timeout: Duration,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            pixel_threshold: 5.0,
            ssim_threshold: 0.95,
            diff_style: CompareDiffStyle::Overlay,
            viewport_only: false,
            method: CompareMethod::Hybrid,
            viewport: Viewport { width: 1280, height: 800 },
            navigation_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompareResult {
    pub session_id: String,
    pub comparison: ComparisonResult,
    pub session_dir: PathBuf,
    pub diff_image_path: Option<PathBuf>,
}

/// Capture a live page and compare it to a reference image (§4.2 "Data
/// flow (compare mode)").
pub async fn compare(
    url: &str,
    reference_path: &std::path::Path,
    store: &SessionStore,
    options: CompareOptions,
) -> Result<CompareResult> {
    let reference_bytes = std::fs::read(reference_path)
        .map_err(|_| Error::ReferenceNotFound(reference_path.to_string_lossy().to_string()))?;
    let reference = image::load_from_memory(&reference_bytes)
        .map_err(|e| Error::ReferenceUnreadable(e.to_string()))?
        .to_rgba8();

    let session_id = crate::session::new_compare_session_id(url.as_bytes());
    let session_dir = store.create_session_dir(&session_id)?;

    let driver = BrowserDriver::launch(options.viewport).await?;
    let page = driver.navigate(url, Some(options.navigation_timeout)).await?;
    let capture = driver.capture(&page, &session_dir, None).await?;
    let current = image::open(&capture.screenshot_path)
        .map_err(|e| Error::NavigationError(e.to_string()))?
        .to_rgba8();

    let inner_method = match options.method {
        CompareMethod::Pixel => InnerCompareMethod::Pixel,
        CompareMethod::Ssim => InnerCompareMethod::Ssim,
        CompareMethod::Hybrid => InnerCompareMethod::Hybrid,
    };
    let comparison = compare::compare(
        &reference,
        &current,
        compare::CompareOptions {
            pixel_threshold: options.pixel_threshold,
            ssim_threshold: options.ssim_threshold,
            method: inner_method,
        },
    );

    let style = match options.diff_style {
        CompareDiffStyle::Overlay => DiffStyle::Overlay,
        CompareDiffStyle::SideBySide => DiffStyle::SideBySide,
        CompareDiffStyle::Heatmap => DiffStyle::Heatmap,
    };
    let diff_image = compare::visualize(&reference, &current, &comparison, style);
    let diff_image_path = store.write_image(&session_dir, "diff.png", &diff_image).ok();

    Ok(CompareResult { session_id, comparison, session_dir, diff_image_path })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{Check, ConfigValue, Pillar};
    use std::collections::HashMap;

    fn mk_check(id: &str, severity: Severity) -> Check {
        Check {
            id: id.into(),
            severity,
            description: String::new(),
            config: HashMap::new(),
            how_to_check: None,
            approved_values: None,
        }
    }

    fn mk_issue(id: usize, check_id: &str, severity: Severity) -> Issue {
        Issue {
            id,
            check_id: check_id.into(),
            pillar: "P".into(),
            severity,
            element: None,
            css_selector: None,
            description: String::new(),
            recommendation: None,
            bounding_box: None,
            details: serde_json::Value::Null,
        }
    }

    #[test]
    fn grade_a_when_all_pass() {
        let spec = Spec {
            name: "s".into(),
            version: "1.0".into(),
            extends: None,
            pillars: vec![Pillar {
                name: "P".into(),
                description: None,
                checks: vec![mk_check("c1", Severity::Minor)],
            }],
            resolved_from: vec![],
            warnings: vec![],
        };
        let grades = grade_pillars(&spec, &[], &[]);
        assert_eq!(grades["P"].grade, "A");
    }

    #[test]
    fn grade_f_when_any_blocking() {
        let spec = Spec {
            name: "s".into(),
            version: "1.0".into(),
            extends: None,
            pillars: vec![Pillar {
                name: "P".into(),
                description: None,
                checks: vec![mk_check("c1", Severity::Blocking)],
            }],
            resolved_from: vec![],
            warnings: vec![],
        };
        let issues = vec![mk_issue(1, "c1", Severity::Blocking)];
        let grades = grade_pillars(&spec, &issues, &[]);
        assert_eq!(grades["P"].grade, "F");
    }

    #[test]
    fn compact_budget_drops_minor_before_major_and_stays_under_bound() {
        // Scenario F (§8): a review producing up to 50 issues must still
        // serialize to a compact payload under 80,000 characters.
        let mut issues = Vec::new();
        let long_description = "x".repeat(2_000);
        for i in 0..40 {
            let mut issue = mk_issue(i, "c1", Severity::Minor);
            issue.description = long_description.clone();
            issues.push(issue);
        }
        for i in 40..49 {
            let mut issue = mk_issue(i, "c2", Severity::Major);
            issue.description = long_description.clone();
            issues.push(issue);
        }
        issues.push(mk_issue(49, "c3", Severity::Blocking));

        let unenforced = serde_json::to_string(&issues).unwrap().len();
        assert!(unenforced >= 80_000, "test fixture should exceed the budget before enforcement ({unenforced} chars)");

        let dropped = enforce_compact_budget(&mut issues);
        assert!(dropped > 0);
        assert!(issues.iter().any(|i| i.severity == Severity::Blocking), "blocking issue must survive truncation");

        let serialized = serde_json::to_string(&issues).unwrap();
        assert!(serialized.len() < 80_000, "compact payload was {} chars", serialized.len());
    }

    #[test]
    fn summary_counts_by_severity() {
        let spec = Spec {
            name: "s".into(),
            version: "1.0".into(),
            extends: None,
            pillars: vec![Pillar {
                name: "P".into(),
                description: None,
                checks: vec![
                    mk_check("c1", Severity::Blocking),
                    mk_check("c2", Severity::Major),
                    mk_check("c3", Severity::Major),
                    mk_check("c4", Severity::Minor),
                    mk_check("c5", Severity::Minor),
                    mk_check("c6", Severity::Minor),
                ],
            }],
            resolved_from: vec![],
            warnings: vec![],
        };
        let issues = vec![
            mk_issue(1, "c1", Severity::Blocking),
            mk_issue(2, "c2", Severity::Major),
            mk_issue(3, "c3", Severity::Major),
            mk_issue(4, "c4", Severity::Minor),
        ];
        let summary = summarize(&spec, &issues);
        assert_eq!(summary.blocking, 1);
        assert_eq!(summary.major, 2);
        assert_eq!(summary.minor, 1);
        assert_eq!(summary.passing, 2);
    }

    #[test]
    fn check_config_survives_roundtrip() {
        let mut config = HashMap::new();
        config.insert("minimum_ratio".to_string(), ConfigValue::Scalar("4.5".to_string()));
        let check = Check {
            id: "color-contrast".into(),
            severity: Severity::Major,
            description: String::new(),
            config,
            how_to_check: None,
            approved_values: None,
        };
        assert_eq!(check.config_f64("minimum_ratio", 0.0), 4.5);
    }
}
