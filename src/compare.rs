//! Reference-image comparator (§4.6): pixel + SSIM hybrid diff, connected
//! diff-region extraction, and visualization styles.

use image::{imageops::FilterType, Rgba, RgbaImage};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CompareMethod {
    Pixel,
    Ssim,
    Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DiffSeverity {
    Minor,
    Moderate,
    Major,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
pub struct DiffRegion {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    pub pixel_count: u32,
    pub severity: DiffSeverity,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ComparisonResult {
    pub method: CompareMethod,
    pub pixel_diff_percent: f64,
    pub ssim_score: f64,
    pub pixel_threshold: f64,
    pub ssim_threshold: f64,
    pub size_mismatch: bool,
    pub diff_regions: Vec<DiffRegion>,
    pub r#match: bool,
}

const CHANGED_DELTA_THRESHOLD: f64 = 0.1;
const MIN_REGION_PIXELS: u32 = 100;
const MAJOR_REGION_PIXELS: u32 = 10_000;
const MODERATE_REGION_PIXELS: u32 = 1_000;

/// Resize `current` onto `reference`'s dimensions if they differ, using a
/// fixed high-quality filter (§4.6 "Resize rule").
fn align(reference: &RgbaImage, current: &RgbaImage) -> (RgbaImage, bool) {
    if reference.dimensions() == current.dimensions() {
        (current.clone(), false)
    } else {
        let resized = image::imageops::resize(
            current,
            reference.width(),
            reference.height(),
            FilterType::Lanczos3,
        );
        (resized, true)
    }
}

/// Per-pixel absolute delta summed across RGB channels, normalized to
/// [0,1]. Returns the per-pixel delta grid alongside the changed-fraction.
fn pixel_diff(reference: &RgbaImage, current: &RgbaImage) -> (Vec<f64>, f64) {
    let (width, height) = reference.dimensions();
    let mut deltas = Vec::with_capacity((width * height) as usize);
    let mut changed = 0usize;

    for y in 0..height {
        for x in 0..width {
            let a = reference.get_pixel(x, y);
            let b = current.get_pixel(x, y);
            let delta = channel_delta(a, b);
            if delta > CHANGED_DELTA_THRESHOLD {
                changed += 1;
            }
            deltas.push(delta);
        }
    }

    let fraction = changed as f64 / (width as u64 * height as u64).max(1) as f64;
    (deltas, fraction * 100.0)
}

fn channel_delta(a: &Rgba<u8>, b: &Rgba<u8>) -> f64 {
    let sum: u32 = (0..3).map(|i| (a[i] as i32 - b[i] as i32).unsigned_abs()).sum();
    sum as f64 / (3.0 * 255.0)
}

fn luminance_grid(image: &RgbaImage) -> Vec<f64> {
    image
        .pixels()
        .map(|p| 0.2126 * p[0] as f64 + 0.7152 * p[1] as f64 + 0.0722 * p[2] as f64)
        .collect()
}

/// SSIM on the luminance channel with an 11x11 Gaussian window (§4.6).
fn ssim(reference: &RgbaImage, current: &RgbaImage) -> f64 {
    const WINDOW: i32 = 11;
    const SIGMA: f64 = 1.5;
    const C1: f64 = (0.01 * 255.0) * (0.01 * 255.0);
    const C2: f64 = (0.03 * 255.0) * (0.03 * 255.0);

    let (width, height) = reference.dimensions();
    if width == 0 || height == 0 {
        return 1.0;
    }
    let ref_lum = luminance_grid(reference);
    let cur_lum = luminance_grid(current);

    let kernel = gaussian_kernel(WINDOW, SIGMA);
    let half = WINDOW / 2;

    let mut total = 0.0;
    let mut count = 0usize;

    let step = ((width * height) as f64 / 4096.0).sqrt().ceil().max(1.0) as i32;

    let mut cy = half;
    while cy < height as i32 - half {
        let mut cx = half;
        while cx < width as i32 - half {
            let (mut mean_x, mut mean_y) = (0.0, 0.0);
            for wy in -half..=half {
                for wx in -half..=half {
                    let w = kernel[(wy + half) as usize][(wx + half) as usize];
                    let idx = ((cy + wy) * width as i32 + (cx + wx)) as usize;
                    mean_x += w * ref_lum[idx];
                    mean_y += w * cur_lum[idx];
                }
            }
            let (mut var_x, mut var_y, mut cov) = (0.0, 0.0, 0.0);
            for wy in -half..=half {
                for wx in -half..=half {
                    let w = kernel[(wy + half) as usize][(wx + half) as usize];
                    let idx = ((cy + wy) * width as i32 + (cx + wx)) as usize;
                    let dx = ref_lum[idx] - mean_x;
                    let dy = cur_lum[idx] - mean_y;
                    var_x += w * dx * dx;
                    var_y += w * dy * dy;
                    cov += w * dx * dy;
                }
            }
            let numerator = (2.0 * mean_x * mean_y + C1) * (2.0 * cov + C2);
            let denominator = (mean_x * mean_x + mean_y * mean_y + C1) * (var_x + var_y + C2);
            total += numerator / denominator;
            count += 1;
            cx += step;
        }
        cy += step;
    }

    if count == 0 {
        1.0
    } else {
        (total / count as f64).clamp(0.0, 1.0)
    }
}

fn gaussian_kernel(size: i32, sigma: f64) -> Vec<Vec<f64>> {
    let half = size / 2;
    let mut kernel = vec![vec![0.0; size as usize]; size as usize];
    let mut sum = 0.0;
    for y in -half..=half {
        for x in -half..=half {
            let value = (-((x * x + y * y) as f64) / (2.0 * sigma * sigma)).exp();
            kernel[(y + half) as usize][(x + half) as usize] = value;
            sum += value;
        }
    }
    for row in &mut kernel {
        for v in row {
            *v /= sum;
        }
    }
    kernel
}

/// 4-connectivity connected-component labelling over the binary change
/// mask, filtered to components ≥100px² (§4.6).
fn diff_regions(deltas: &[f64], width: u32, height: u32) -> Vec<DiffRegion> {
    let (width, height) = (width as usize, height as usize);
    let mask: Vec<bool> = deltas.iter().map(|&d| d > CHANGED_DELTA_THRESHOLD).collect();
    let mut labels = vec![0i32; mask.len()];
    let mut next_label = 1i32;
    let mut stack = Vec::new();
    let mut regions = Vec::new();

    for start in 0..mask.len() {
        if !mask[start] || labels[start] != 0 {
            continue;
        }
        let label = next_label;
        next_label += 1;
        labels[start] = label;
        stack.push(start);

        let (mut min_x, mut min_y) = (width, height);
        let (mut max_x, mut max_y) = (0usize, 0usize);
        let mut pixel_count = 0u32;

        while let Some(idx) = stack.pop() {
            let (x, y) = (idx % width, idx / width);
            pixel_count += 1;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);

            let neighbors = [
                (x.checked_sub(1), Some(y)),
                (Some(x + 1).filter(|&v| v < width), Some(y)),
                (Some(x), y.checked_sub(1)),
                (Some(x), Some(y + 1).filter(|&v| v < height)),
            ];
            for (nx, ny) in neighbors {
                let (Some(nx), Some(ny)) = (nx, ny) else { continue };
                let nidx = ny * width + nx;
                if mask[nidx] && labels[nidx] == 0 {
                    labels[nidx] = label;
                    stack.push(nidx);
                }
            }
        }

        if pixel_count >= MIN_REGION_PIXELS {
            let severity = if pixel_count > MAJOR_REGION_PIXELS {
                DiffSeverity::Major
            } else if pixel_count > MODERATE_REGION_PIXELS {
                DiffSeverity::Moderate
            } else {
                DiffSeverity::Minor
            };
            regions.push(DiffRegion {
                x: min_x as u32,
                y: min_y as u32,
                w: (max_x - min_x + 1) as u32,
                h: (max_y - min_y + 1) as u32,
                pixel_count,
                severity,
            });
        }
    }

    regions
}

#[derive(Debug, Clone, Copy)]
pub struct CompareOptions {
    pub pixel_threshold: f64,
    pub ssim_threshold: f64,
    pub method: CompareMethod,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self { pixel_threshold: 5.0, ssim_threshold: 0.95, method: CompareMethod::Hybrid }
    }
}

pub fn compare(reference: &RgbaImage, current: &RgbaImage, options: CompareOptions) -> ComparisonResult {
    let (aligned_current, size_mismatch) = align(reference, current);
    let (deltas, pixel_diff_percent) = pixel_diff(reference, &aligned_current);
    let ssim_score = match options.method {
        CompareMethod::Pixel => 1.0,
        _ => ssim(reference, &aligned_current),
    };

    let pixel_ok = pixel_diff_percent <= options.pixel_threshold;
    let ssim_ok = ssim_score >= options.ssim_threshold;
    let matched = match options.method {
        CompareMethod::Pixel => pixel_ok,
        CompareMethod::Ssim => ssim_ok,
        CompareMethod::Hybrid => pixel_ok && ssim_ok,
    };

    ComparisonResult {
        method: options.method,
        pixel_diff_percent,
        ssim_score,
        pixel_threshold: options.pixel_threshold,
        ssim_threshold: options.ssim_threshold,
        size_mismatch,
        diff_regions: diff_regions(&deltas, reference.width(), reference.height()),
        r#match: matched,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffStyle {
    Overlay,
    SideBySide,
    Heatmap,
}

/// Render a visualization of the diff per `style` (§4.6).
pub fn visualize(
    reference: &RgbaImage,
    current: &RgbaImage,
    result: &ComparisonResult,
    style: DiffStyle,
) -> RgbaImage {
    let (aligned_current, _) = align(reference, current);
    match style {
        DiffStyle::Overlay => overlay_regions(&aligned_current, &result.diff_regions),
        DiffStyle::SideBySide => side_by_side(reference, &aligned_current),
        DiffStyle::Heatmap => heatmap(reference, &aligned_current),
    }
}

fn overlay_regions(current: &RgbaImage, regions: &[DiffRegion]) -> RgbaImage {
    let mut canvas = current.clone();
    for region in regions {
        for y in region.y..(region.y + region.h).min(canvas.height()) {
            for x in region.x..(region.x + region.w).min(canvas.width()) {
                let is_border =
                    x == region.x || y == region.y || x == region.x + region.w - 1 || y == region.y + region.h - 1;
                let pixel = canvas.get_pixel_mut(x, y);
                if is_border {
                    *pixel = Rgba([0xDC, 0x35, 0x45, 0xFF]);
                } else {
                    let blend = |c: u8, overlay: u8| ((c as u32 * 3 + overlay as u32 * 7) / 10) as u8;
                    *pixel = Rgba([blend(pixel[0], 220), blend(pixel[1], 53), blend(pixel[2], 69), 255]);
                }
            }
        }
    }
    canvas
}

fn side_by_side(reference: &RgbaImage, current: &RgbaImage) -> RgbaImage {
    let (width, height) = reference.dimensions();
    let mut canvas = RgbaImage::new(width * 3, height);
    image::imageops::replace(&mut canvas, reference, 0, 0);
    image::imageops::replace(&mut canvas, &diff_mask_image(reference, current), width as i64, 0);
    image::imageops::replace(&mut canvas, current, (width * 2) as i64, 0);
    canvas
}

fn diff_mask_image(reference: &RgbaImage, current: &RgbaImage) -> RgbaImage {
    let (width, height) = reference.dimensions();
    let mut mask = RgbaImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let delta = channel_delta(reference.get_pixel(x, y), current.get_pixel(x, y));
            let value = if delta > CHANGED_DELTA_THRESHOLD { 255 } else { 0 };
            mask.put_pixel(x, y, Rgba([value, value, value, 255]));
        }
    }
    mask
}

fn heatmap(reference: &RgbaImage, current: &RgbaImage) -> RgbaImage {
    let (width, height) = reference.dimensions();
    let mut canvas = RgbaImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let delta = channel_delta(reference.get_pixel(x, y), current.get_pixel(x, y)).clamp(0.0, 1.0);
            let r = (delta * 255.0) as u8;
            let b = ((1.0 - delta) * 255.0) as u8;
            canvas.put_pixel(x, y, Rgba([r, 0, b, 255]));
        }
    }
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, color: Rgba<u8>) -> RgbaImage {
        RgbaImage::from_pixel(width, height, color)
    }

    #[test]
    fn identical_images_match_perfectly() {
        let img = solid(64, 64, Rgba([0, 0, 255, 255]));
        let result = compare(&img, &img, CompareOptions::default());
        assert_eq!(result.pixel_diff_percent, 0.0);
        assert_eq!(result.ssim_score, 1.0);
        assert!(result.r#match);
        assert!(result.diff_regions.is_empty());
    }

    #[test]
    fn drifted_region_is_detected() {
        let reference = solid(200, 200, Rgba([0, 0, 255, 255]));
        let mut current = reference.clone();
        for y in 10..60 {
            for x in 10..110 {
                current.put_pixel(x, y, Rgba([255, 0, 0, 255]));
            }
        }
        let result = compare(&reference, &current, CompareOptions::default());
        assert!(!result.r#match);
        assert_eq!(result.diff_regions.len(), 1);
        let region = &result.diff_regions[0];
        assert_eq!((region.x, region.y, region.w, region.h), (10, 10, 100, 50));
        assert_eq!(region.pixel_count, 5000);
        assert_eq!(region.severity, DiffSeverity::Moderate);
    }

    #[test]
    fn size_mismatch_triggers_resize() {
        let reference = solid(50, 50, Rgba([10, 10, 10, 255]));
        let current = solid(100, 100, Rgba([10, 10, 10, 255]));
        let result = compare(&reference, &current, CompareOptions::default());
        assert!(result.size_mismatch);
    }

    #[test]
    fn determinism_same_inputs_same_output() {
        let reference = solid(40, 40, Rgba([1, 2, 3, 255]));
        let mut current = reference.clone();
        current.put_pixel(5, 5, Rgba([250, 250, 250, 255]));
        let a = compare(&reference, &current, CompareOptions::default());
        let b = compare(&reference, &current, CompareOptions::default());
        assert_eq!(a.pixel_diff_percent, b.pixel_diff_percent);
        assert_eq!(a.ssim_score, b.ssim_score);
    }
}
