//! `color-contrast` evaluator (§4.3).

use super::ProtoIssue;
use crate::capture::PageCapture;
use crate::spec::Check;

/// Parse a CSS color string (`rgb(r, g, b)`, `rgba(r, g, b, a)`, or
/// `#rrggbb`) into sRGB components. Unparseable colors default to opaque
/// white, matching how an unstyled background would read to the eye.
fn parse_color(value: &str) -> (u8, u8, u8, f64) {
    let value = value.trim();
    if let Some(hex) = value.strip_prefix('#') {
        if hex.len() >= 6 {
            let r = u8::from_str_radix(&hex[0..2], 16).unwrap_or(255);
            let g = u8::from_str_radix(&hex[2..4], 16).unwrap_or(255);
            let b = u8::from_str_radix(&hex[4..6], 16).unwrap_or(255);
            return (r, g, b, 1.0);
        }
    }
    if let Some(inner) = value
        .strip_prefix("rgba(")
        .or_else(|| value.strip_prefix("rgb("))
        .and_then(|s| s.strip_suffix(')'))
    {
        let parts: Vec<f64> = inner.split(',').filter_map(|p| p.trim().parse().ok()).collect();
        if parts.len() >= 3 {
            let alpha = parts.get(3).copied().unwrap_or(1.0);
            return (parts[0] as u8, parts[1] as u8, parts[2] as u8, alpha);
        }
    }
    (255, 255, 255, 1.0)
}

fn relative_luminance((r, g, b, _): (u8, u8, u8, f64)) -> f64 {
    let chan = |c: u8| {
        let c = c as f64 / 255.0;
        if c <= 0.03928 { c / 12.92 } else { ((c + 0.055) / 1.055).powf(2.4) }
    };
    0.2126 * chan(r) + 0.7152 * chan(g) + 0.0722 * chan(b)
}

/// WCAG contrast ratio between two colors, the larger luminance always the
/// numerator (ratio ≥ 1.0).
pub fn contrast_ratio(fg: (u8, u8, u8, f64), bg: (u8, u8, u8, f64)) -> f64 {
    let (l1, l2) = (relative_luminance(fg), relative_luminance(bg));
    let (hi, lo) = if l1 >= l2 { (l1, l2) } else { (l2, l1) };
    (hi + 0.05) / (lo + 0.05)
}

/// Walk the ancestor chain until an opaque background is found; a fully
/// transparent element is treated as its parent's background (§4.3).
fn effective_background(element: &crate::capture::ElementInfo) -> (u8, u8, u8, f64) {
    let own = parse_color(element.attr("background-color").unwrap_or("rgb(255, 255, 255)"));
    if own.3 > 0.0 {
        return own;
    }
    for ancestor in &element.parent_chain {
        let Some(bg) = ancestor.background_color.as_deref() else { continue };
        let parsed = parse_color(bg);
        if parsed.3 > 0.0 {
            return parsed;
        }
    }
    (255, 255, 255, 1.0)
}

pub fn evaluate(capture: &PageCapture, check: &Check) -> (Vec<ProtoIssue>, Option<super::Diagnostic>) {
    let minimum = check.config_f64("minimum_ratio", 4.5);
    let mut issues = Vec::new();

    for (handle, element) in capture.iter_elements() {
        if element.text_content.trim().is_empty() {
            continue;
        }
        let fg = parse_color(element.attr("color").unwrap_or("rgb(0, 0, 0)"));
        let bg = effective_background(element);
        let ratio = contrast_ratio(fg, bg);
        if ratio < minimum {
            issues.push(ProtoIssue {
                check_id: check.id.clone(),
                severity: check.severity,
                element_handle: Some(handle),
                description: format!(
                    "Text contrast ratio {ratio:.1}:1 is below the required {minimum:.1}:1"
                ),
                recommendation: Some("Increase foreground/background contrast".to_string()),
                bounding_box: Some(element.bounding_box),
                details: serde_json::json!({
                    "ratio": (ratio * 100.0).round() / 100.0,
                    "minimum": minimum,
                    "fg": format!("#{:02x}{:02x}{:02x}", fg.0, fg.1, fg.2),
                    "bg": format!("#{:02x}{:02x}{:02x}", bg.0, bg.1, bg.2),
                }),
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

    fn check(minimum: &str) -> Check {
        let mut config = HashMap::new();
        config.insert("minimum_ratio".to_string(), crate::spec::ConfigValue::Scalar(minimum.to_string()));
        Check {
            id: "color-contrast".into(),
            severity: crate::spec::Severity::Major,
            description: String::new(),
            config,
            how_to_check: None,
            approved_values: None,
        }
    }

    #[test]
    fn low_contrast_text_is_flagged() {
        let mut styles = HashMap::new();
        styles.insert("color".to_string(), "#bbbbbb".to_string());
        styles.insert("background-color".to_string(), "#ffffff".to_string());
        let element = ElementInfo {
            tag: "p".into(),
            text_content: "hi".into(),
            computed_styles: styles,
            bounding_box: BoundingBox { x: 0.0, y: 0.0, width: 10.0, height: 10.0 },
            ..Default::default()
        };
        let capture = PageCapture { elements: vec![element], ..Default::default() };
        let (issues, _) = evaluate(&capture, &check("4.5"));
        assert_eq!(issues.len(), 1);
        assert!(issues[0].description.contains("1.9"));
    }

    #[test]
    fn high_contrast_text_passes() {
        let mut styles = HashMap::new();
        styles.insert("color".to_string(), "#000000".to_string());
        styles.insert("background-color".to_string(), "#ffffff".to_string());
        let element = ElementInfo { tag: "p".into(), text_content: "hi".into(), computed_styles: styles, ..Default::default() };
        let capture = PageCapture { elements: vec![element], ..Default::default() };
        assert!(evaluate(&capture, &check("4.5")).0.is_empty());
    }

    #[test]
    fn ratio_is_symmetric() {
        assert_eq!(
            contrast_ratio((0, 0, 0, 1.0), (255, 255, 255, 1.0)),
            contrast_ratio((255, 255, 255, 1.0), (0, 0, 0, 1.0))
        );
    }
}
