//! End-to-end scenario tests (§8) exercised through the public API.
//!
//! Scenarios A, B and E describe a live browser capturing a real page;
//! there's no headless browser in this environment, so these construct the
//! `PageCapture`/image fixtures a real capture would have produced and feed
//! them straight into the same evaluators/comparator the browser-driven
//! path calls. Scenario F (compact-mode budget enforcement) exercises a
//! private orchestrator helper and stays in `orchestrator`'s own
//! `#[cfg(test)]` module; it isn't duplicated here.

use canvas_review::capture::{BoundingBox, ElementInfo, PageCapture};
use canvas_review::checks::Registry;
use canvas_review::compare::{self, CompareOptions, DiffSeverity};
use canvas_review::selector;
use canvas_review::spec::{ConfigValue, Severity, SpecLoader};
use image::{Rgba, RgbaImage};
use std::collections::HashMap;
use std::io::Write;

fn check(id: &str, severity: Severity, config: &[(&str, &str)]) -> canvas_review::spec::Check {
    let mut map = HashMap::new();
    for (k, v) in config {
        map.insert(k.to_string(), ConfigValue::Scalar(v.to_string()));
    }
    canvas_review::spec::Check {
        id: id.to_string(),
        severity,
        description: String::new(),
        config: map,
        how_to_check: None,
        approved_values: None,
    }
}

/// Scenario A (§8): a paragraph with low-contrast text is flagged with the
/// correct ratio, severity, and a synthesizable selector.
#[test]
fn scenario_a_single_contrast_failure() {
    let mut styles = HashMap::new();
    styles.insert("color".to_string(), "#bbbbbb".to_string());
    styles.insert("background-color".to_string(), "#ffffff".to_string());
    let element = ElementInfo {
        tag: "p".into(),
        text_content: "Body copy".into(),
        computed_styles: styles,
        bounding_box: BoundingBox { x: 0.0, y: 0.0, width: 300.0, height: 20.0 },
        ..Default::default()
    };
    let capture = PageCapture { elements: vec![element.clone()], ..Default::default() };
    let check = check("color-contrast", Severity::Major, &[("minimum_ratio", "4.5")]);

    let registry = Registry::with_builtins();
    let (issues, diagnostic) = registry.evaluate(&capture, &check);
    assert!(diagnostic.is_none());
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].severity, Severity::Major);
    assert!(issues[0].description.contains("1.9"), "got: {}", issues[0].description);

    assert_eq!(selector::synthesize(&element), "p");
}

/// Scenario B (§8): an undersized interactive control is flagged with its
/// actual and required dimensions.
#[test]
fn scenario_b_undersized_touch_target() {
    let element = ElementInfo {
        tag: "button".into(),
        bounding_box: BoundingBox { x: 0.0, y: 0.0, width: 24.0, height: 24.0 },
        ..Default::default()
    };
    let capture = PageCapture { elements: vec![element], ..Default::default() };
    let check = check("touch-targets", Severity::Major, &[("minimum_size", "44")]);

    let registry = Registry::with_builtins();
    let (issues, diagnostic) = registry.evaluate(&capture, &check);
    assert!(diagnostic.is_none());
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].details["width"], 24.0);
    assert_eq!(issues[0].details["height"], 24.0);
    assert_eq!(issues[0].details["minimum"], 44.0);
}

/// Scenario C (§8): a child spec overrides a check it inherits from its
/// parent without redeclaring it; the override must land on the merged
/// check rather than being dropped as dangling.
#[test]
fn scenario_c_override_survives_extends_merge() {
    let dir = tempfile::tempdir().unwrap();
    let write = |name: &str, contents: &str| {
        let mut f = std::fs::File::create(dir.path().join(format!("{name}.md"))).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    };
    write(
        "parent",
        "---\nname: parent\n---\n\n## Pillar A\n\n#### accessibility-grade\n- **Severity**: major\n- **Config**: minimum_grade=C\n",
    );
    write(
        "child",
        "---\nname: child\nextends: parent\n---\n\n## Overrides\n\n#### accessibility-grade\n- **Config**: minimum_grade=B\n",
    );

    let loader = SpecLoader::with_search_roots(vec![dir.path().to_path_buf()]);
    let spec = loader.load("child").unwrap();

    assert!(spec.warnings.is_empty());
    let (_, resolved) = spec.get_check("accessibility-grade").unwrap();
    assert_eq!(resolved.severity, Severity::Major);
    assert_eq!(resolved.config_str("minimum_grade"), Some("B"));
}

fn solid(width: u32, height: u32, color: Rgba<u8>) -> RgbaImage {
    RgbaImage::from_pixel(width, height, color)
}

/// Scenario D (§8): comparing a page against an identical reference image
/// is a perfect match with no diff regions.
#[test]
fn scenario_d_compare_identical_images() {
    let reference = solid(800, 600, Rgba([30, 30, 30, 255]));
    let result = compare::compare(&reference, &reference, CompareOptions::default());

    assert_eq!(result.pixel_diff_percent, 0.0);
    assert_eq!(result.ssim_score, 1.0);
    assert!(result.r#match);
    assert!(result.diff_regions.is_empty());
}

/// Scenario E (§8): a single rectangular region of drift between reference
/// and current is reported as one bounded, moderate-severity diff region.
#[test]
fn scenario_e_compare_single_drift_region() {
    let reference = solid(200, 200, Rgba([0, 0, 255, 255]));
    let mut current = reference.clone();
    for y in 10..60 {
        for x in 10..110 {
            current.put_pixel(x, y, Rgba([255, 0, 0, 255]));
        }
    }

    let result = compare::compare(&reference, &current, CompareOptions::default());

    assert!(!result.r#match);
    assert_eq!(result.diff_regions.len(), 1);
    let region = &result.diff_regions[0];
    assert_eq!((region.x, region.y, region.w, region.h), (10, 10, 100, 50));
    assert_eq!(region.severity, DiffSeverity::Moderate);
}
