//! Screenshot annotator (§4.5): numbered markers + legend over a screenshot.

use crate::checks::Issue;
use crate::error::{Error, Result};
use crate::spec::Severity;
use ab_glyph::{FontRef, PxScale};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

const MARKER_DIAMETER: i32 = 32;
const MARKER_RADIUS: i32 = MARKER_DIAMETER / 2;
const BORDER_WIDTH: i32 = 3;
const LEGEND_PADDING: u32 = 20;
const LEGEND_LINE_HEIGHT: u32 = 28;
const CLAMP_MARGIN: i32 = 5;
const STACK_OFFSET: i32 = 20;

const BLOCKING_COLOR: Rgba<u8> = Rgba([0xDC, 0x35, 0x45, 0xFF]);
const MAJOR_COLOR: Rgba<u8> = Rgba([0xFF, 0x91, 0x00, 0xFF]);
const MINOR_COLOR: Rgba<u8> = Rgba([0xFF, 0xC1, 0x07, 0xFF]);
const FALLBACK_COLOR: Rgba<u8> = Rgba([0x00, 0x00, 0x00, 0xFF]);
const WHITE: Rgba<u8> = Rgba([0xFF, 0xFF, 0xFF, 0xFF]);
const LEGEND_BG: Rgba<u8> = Rgba([0xF8, 0xF9, 0xFA, 0xFF]);

static FONT_BOLD: &[u8] = include_bytes!("../assets/fonts/DejaVuSans-Bold.ttf");
static FONT_MONO: &[u8] = include_bytes!("../assets/fonts/DejaVuSansMono.ttf");

fn severity_color(severity: Severity) -> Rgba<u8> {
    match severity {
        Severity::Blocking => BLOCKING_COLOR,
        Severity::Major => MAJOR_COLOR,
        Severity::Minor => MINOR_COLOR,
    }
}

fn luminance(c: Rgba<u8>) -> f64 {
    let chan = |v: u8| {
        let v = v as f64 / 255.0;
        if v <= 0.03928 { v / 12.92 } else { ((v + 0.055) / 1.055).powf(2.4) }
    };
    0.2126 * chan(c[0]) + 0.7152 * chan(c[1]) + 0.0722 * chan(c[2])
}

fn wcag_contrast(a: Rgba<u8>, b: Rgba<u8>) -> f64 {
    let (l1, l2) = (luminance(a), luminance(b));
    let (hi, lo) = if l1 >= l2 { (l1, l2) } else { (l2, l1) };
    (hi + 0.05) / (lo + 0.05)
}

fn sample_background(image: &RgbaImage, x: i32, y: i32) -> Rgba<u8> {
    let (width, height) = image.dimensions();
    let x = x.clamp(0, width as i32 - 1) as u32;
    let y = y.clamp(0, height as i32 - 1) as u32;
    *image.get_pixel(x, y)
}

/// Per-marker contrast fallback (§9): sample the element's background and
/// substitute black if the marker color reads with contrast < 3.0 against it.
fn marker_color(image: &RgbaImage, severity: Severity, x: i32, y: i32) -> Rgba<u8> {
    let color = severity_color(severity);
    let background = sample_background(image, x, y);
    if wcag_contrast(color, background) < 3.0 {
        FALLBACK_COLOR
    } else {
        color
    }
}

fn ellipsize(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut truncated: String = text.chars().take(max_chars.saturating_sub(1)).collect();
        truncated.push('…');
        truncated
    }
}

/// Render markers + an outline over each issue's bounding box, append a
/// legend, and return the composited PNG bytes.
pub fn annotate(screenshot: &RgbaImage, issues: &[Issue]) -> Result<RgbaImage> {
    let bold = FontRef::try_from_slice(FONT_BOLD).map_err(|e| Error::AnnotationError(e.to_string()))?;
    let mono = FontRef::try_from_slice(FONT_MONO).map_err(|e| Error::AnnotationError(e.to_string()))?;

    let (width, height) = screenshot.dimensions();
    let legend_height = if issues.is_empty() {
        0
    } else {
        LEGEND_PADDING * 2 + LEGEND_LINE_HEIGHT * issues.len() as u32
    };

    let mut canvas = RgbaImage::from_pixel(width, height + legend_height, LEGEND_BG);
    image::imageops::overlay(&mut canvas, screenshot, 0, 0);

    let mut placed_centers: Vec<(i32, i32)> = Vec::new();

    for issue in issues {
        let Some(bbox) = issue.bounding_box else { continue };
        let rect_x = bbox.x.round() as i32;
        let rect_y = bbox.y.round() as i32;
        let rect_w = bbox.width.round().max(1.0) as u32;
        let rect_h = bbox.height.round().max(1.0) as u32;

        let mut center_x = rect_x + rect_w as i32 - MARKER_RADIUS;
        let mut center_y = rect_y - MARKER_RADIUS;
        while placed_centers.iter().any(|(px, py)| {
            ((px - center_x).pow(2) + (py - center_y).pow(2)) < (MARKER_DIAMETER * MARKER_DIAMETER)
        }) {
            center_x += STACK_OFFSET;
            center_y += STACK_OFFSET;
        }
        center_x = center_x.clamp(CLAMP_MARGIN + MARKER_RADIUS, width as i32 - CLAMP_MARGIN - MARKER_RADIUS);
        center_y = center_y.clamp(CLAMP_MARGIN + MARKER_RADIUS, height as i32 - CLAMP_MARGIN - MARKER_RADIUS);
        placed_centers.push((center_x, center_y));

        let color = marker_color(&canvas, issue.severity, rect_x, rect_y);

        draw_hollow_rect_mut(
            &mut canvas,
            Rect::at(rect_x, rect_y).of_size(rect_w.max(1), rect_h.max(1)),
            color,
        );
        for w in 1..BORDER_WIDTH {
            draw_hollow_rect_mut(
                &mut canvas,
                Rect::at(rect_x - w, rect_y - w).of_size(rect_w + (w as u32) * 2, rect_h + (w as u32) * 2),
                color,
            );
        }

        draw_filled_circle_mut(&mut canvas, (center_x, center_y), MARKER_RADIUS, WHITE);
        draw_filled_circle_mut(&mut canvas, (center_x, center_y), MARKER_RADIUS - 2, color);

        let label = if issue.id > 20 { format!("({})", issue.id) } else { issue.id.to_string() };
        let scale = PxScale::from(18.0);
        let text_x = center_x - (label.len() as i32 * 5);
        let text_y = center_y - 9;
        draw_text_mut(&mut canvas, WHITE, text_x, text_y, scale, &bold, &label);
    }

    if !issues.is_empty() {
        render_legend(&mut canvas, issues, width, height, &bold, &mono);
    }

    Ok(canvas)
}

fn render_legend(
    canvas: &mut RgbaImage,
    issues: &[Issue],
    width: u32,
    screenshot_height: u32,
    bold: &FontRef,
    mono: &FontRef,
) {
    draw_hollow_rect_mut(
        canvas,
        Rect::at(0, screenshot_height as i32).of_size(width, 2),
        Rgba([0xCE, 0xCE, 0xCE, 0xFF]),
    );

    const SWATCH_RADIUS: i32 = 6;
    const TEXT_INSET: i32 = LEGEND_PADDING as i32 + SWATCH_RADIUS * 2 + 8;

    let title_scale = PxScale::from(16.0);
    let selector_scale = PxScale::from(13.0);
    let mut y = screenshot_height as i32 + LEGEND_PADDING as i32;

    for issue in issues {
        let swatch_center = (LEGEND_PADDING as i32 + SWATCH_RADIUS, y + title_scale.y as i32 / 2 - SWATCH_RADIUS / 2);
        draw_filled_circle_mut(canvas, swatch_center, SWATCH_RADIUS, severity_color(issue.severity));

        let description = ellipsize(&issue.description, 60);
        let line = format!("#{}: {description}", issue.id);
        draw_text_mut(canvas, severity_color(issue.severity), TEXT_INSET, y, title_scale, bold, &line);

        if let Some(selector) = &issue.css_selector {
            draw_text_mut(
                canvas,
                Rgba([0x6C, 0x75, 0x7D, 0xFF]),
                TEXT_INSET + 24,
                y + 16,
                selector_scale,
                mono,
                &format!("-> {selector}"),
            );
        }

        y += LEGEND_LINE_HEIGHT as i32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::BoundingBox;

    fn issue(id: usize, severity: Severity, bbox: BoundingBox) -> Issue {
        Issue {
            id,
            check_id: "x".into(),
            pillar: "P".into(),
            severity,
            element: None,
            css_selector: Some("div.foo".into()),
            description: "An issue".into(),
            recommendation: None,
            bounding_box: Some(bbox),
            details: serde_json::json!({}),
        }
    }

    #[test]
    fn marker_count_matches_issue_count() {
        let screenshot = RgbaImage::from_pixel(200, 100, Rgba([255, 255, 255, 255]));
        let issues = vec![
            issue(1, Severity::Major, BoundingBox { x: 10.0, y: 10.0, width: 20.0, height: 20.0 }),
            issue(2, Severity::Blocking, BoundingBox { x: 50.0, y: 50.0, width: 20.0, height: 20.0 }),
        ];
        let annotated = annotate(&screenshot, &issues).unwrap();
        assert!(annotated.height() > screenshot.height());
    }

    #[test]
    fn empty_issues_preserves_image_and_adds_no_legend() {
        let screenshot = RgbaImage::from_pixel(50, 30, Rgba([10, 20, 30, 255]));
        let annotated = annotate(&screenshot, &[]).unwrap();
        assert_eq!(annotated.dimensions(), screenshot.dimensions());
        assert_eq!(*annotated.get_pixel(0, 0), *screenshot.get_pixel(0, 0));
    }

    #[test]
    fn red_marker_on_red_background_falls_back_to_black() {
        let red_bg = RgbaImage::from_pixel(100, 100, BLOCKING_COLOR);
        let color = marker_color(&red_bg, Severity::Blocking, 10, 10);
        assert_eq!(color, FALLBACK_COLOR);
    }

    #[test]
    fn ellipsize_truncates_long_text() {
        let text = "x".repeat(100);
        let shortened = ellipsize(&text, 60);
        assert_eq!(shortened.chars().count(), 60);
        assert!(shortened.ends_with('…'));
    }
}
