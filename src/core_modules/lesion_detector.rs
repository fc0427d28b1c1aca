// THEORY:
// The `LesionDetector` is the region proposer of the lesion layer. It finds
// small, roughly round, locally dark patches and hands them to the classifier.
// It is a recall-oriented heuristic, not a segmenter: false positives are
// expected, and rejecting them is the classifier's job.
//
// Algorithm steps:
// 1.  **Grayscale**: moles differ from the surrounding skin mainly in
//     brightness, so colour is dropped for the search.
// 2.  **Adaptive threshold**: each pixel is compared against a Gaussian-weighted
//     mean of its `block_size` neighbourhood. A pixel at least `offset` levels
//     darker than its surroundings becomes foreground. Comparing against the
//     local rather than the global mean keeps the search robust to uneven
//     lighting across the face.
// 3.  **Outer contours**: borders of the foreground components are traced and
//     only the outermost ones are kept; holes and nested borders are ignored.
// 4.  **Shape filter**: a contour survives when its enclosed area is strictly
//     between `min_area` and `max_area` and its bounding box aspect ratio is
//     strictly between `min_aspect` and `max_aspect`. This rejects dust-sized
//     noise, large shadows and long streaks such as hairs or wrinkles.
// 5.  **Bounded output**: accepted regions are emitted in contour scan order and
//     the scan stops at `max_regions`. The cap bounds the classifier's worst-case
//     cost and makes the output deterministic for a given image.

use crate::config::LesionConfig;
use crate::core_modules::frame::Frame;
use crate::core_modules::lesion::{LesionRegion, Position};
use crate::error::Result;
use image::{GrayImage, Luma, RgbImage};
use imageproc::contours::{find_contours, BorderType, Contour};
use tracing::debug;

const FOREGROUND: u8 = 255;

pub struct LesionDetector {
    config: LesionConfig,
    kernel: Vec<f64>,
}

impl LesionDetector {
    pub fn new(config: LesionConfig) -> Self {
        let kernel = gaussian_kernel(config.block_size.max(1) as usize);
        Self { config, kernel }
    }

    /// Proposes at most `max_regions` candidate lesions from the image.
    pub fn propose(&self, image: &RgbImage) -> Result<Vec<LesionRegion>> {
        let frame = Frame::new(image)?;
        self.propose_in_frame(&frame)
    }

    pub fn propose_in_frame(&self, frame: &Frame) -> Result<Vec<LesionRegion>> {
        // --- 1. Grayscale & 2. Adaptive threshold ---
        let gray = frame.to_gray();
        let binary = self.adaptive_threshold(&gray);

        // --- 3. Outer contours ---
        let contours = find_contours::<i32>(&binary);
        let outer = contours
            .iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none());

        // --- 4. Shape filter & 5. Bounded output ---
        let mut regions = Vec::new();
        for contour in outer {
            if regions.len() >= self.config.max_regions {
                break;
            }
            let Some(position) = bounding_box(contour) else {
                continue;
            };
            let area = contour_area(contour);
            let aspect = position.aspect_ratio();
            if !(area > self.config.min_area && area < self.config.max_area) {
                continue;
            }
            if !(aspect > self.config.min_aspect && aspect < self.config.max_aspect) {
                continue;
            }
            let pixels = frame.crop(position.x, position.y, position.width, position.height)?;
            regions.push(LesionRegion { position, pixels });
        }

        debug!(
            contours = contours.len(),
            accepted = regions.len(),
            "lesion regions proposed"
        );
        Ok(regions)
    }

    /// Marks pixels that are at least `ceil(threshold_offset)` levels darker
    /// than their Gaussian-weighted neighbourhood mean.
    pub fn adaptive_threshold(&self, gray: &GrayImage) -> GrayImage {
        let means = gaussian_local_mean(gray, &self.kernel);
        let offset = self.config.threshold_offset.ceil() as i32;
        let mut binary = GrayImage::new(gray.width(), gray.height());
        for ((source, mean), target) in gray.pixels().zip(means.pixels()).zip(binary.pixels_mut()) {
            let difference = source[0] as i32 - mean[0] as i32;
            *target = Luma([if difference <= -offset { FOREGROUND } else { 0 }]);
        }
        binary
    }
}

impl Default for LesionDetector {
    fn default() -> Self {
        Self::new(LesionConfig::default())
    }
}

/// Normalised 1D Gaussian of the given odd size, with sigma derived from it.
fn gaussian_kernel(size: usize) -> Vec<f64> {
    let sigma = 0.3 * ((size as f64 - 1.0) * 0.5 - 1.0) + 0.8;
    let center = (size as f64 - 1.0) / 2.0;
    let weights: Vec<f64> = (0..size)
        .map(|i| {
            let d = i as f64 - center;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// Separable Gaussian blur with replicated borders, rounded back to 8 bits.
fn gaussian_local_mean(gray: &GrayImage, kernel: &[f64]) -> GrayImage {
    let (width, height) = gray.dimensions();
    let (w, h) = (width as i64, height as i64);
    let radius = (kernel.len() / 2) as i64;
    let at = |x: i64, y: i64| gray.get_pixel(x.clamp(0, w - 1) as u32, y.clamp(0, h - 1) as u32)[0] as f64;

    let mut horizontal = vec![0.0f64; (width * height) as usize];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                acc += weight * at(x + k as i64 - radius, y);
            }
            horizontal[(y * w + x) as usize] = acc;
        }
    }

    let mut output = GrayImage::new(width, height);
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = (y + k as i64 - radius).clamp(0, h - 1);
                acc += weight * horizontal[(sy * w + x) as usize];
            }
            output.put_pixel(x as u32, y as u32, Luma([acc.round().clamp(0.0, 255.0) as u8]));
        }
    }
    output
}

/// Inclusive bounding box of the traced border pixels.
fn bounding_box(contour: &Contour<i32>) -> Option<Position> {
    let first = contour.points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for point in &contour.points {
        min_x = min_x.min(point.x);
        min_y = min_y.min(point.y);
        max_x = max_x.max(point.x);
        max_y = max_y.max(point.y);
    }
    Some(Position::new(
        min_x as u32,
        min_y as u32,
        (max_x - min_x + 1) as u32,
        (max_y - min_y + 1) as u32,
    ))
}

/// Area enclosed by the border polygon (shoelace formula).
fn contour_area(contour: &Contour<i32>) -> f64 {
    let points = &contour.points;
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0i64;
    for (i, current) in points.iter().enumerate() {
        let next = &points[(i + 1) % points.len()];
        twice_area += current.x as i64 * next.y as i64 - next.x as i64 * current.y as i64;
    }
    twice_area.abs() as f64 / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    const BACKGROUND: Rgb<u8> = Rgb([220, 200, 190]);
    const MOLE: Rgb<u8> = Rgb([60, 40, 30]);

    fn paint_disk(image: &mut RgbImage, cx: f64, cy: f64, radius: f64, color: Rgb<u8>) {
        for (x, y, pixel) in image.enumerate_pixels_mut() {
            let (dx, dy) = (x as f64 - cx, y as f64 - cy);
            if dx * dx + dy * dy <= radius * radius {
                *pixel = color;
            }
        }
    }

    #[test]
    fn kernel_is_normalised_and_symmetric() {
        let kernel = gaussian_kernel(11);
        assert_eq!(kernel.len(), 11);
        assert!((kernel.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((kernel[0] - kernel[10]).abs() < 1e-12);
        assert!(kernel[5] > kernel[4]);
    }

    #[test]
    fn uniform_image_has_no_foreground() {
        let gray = GrayImage::from_pixel(40, 30, Luma([128]));
        let binary = LesionDetector::default().adaptive_threshold(&gray);
        assert!(binary.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn dark_dot_is_foreground() {
        let mut gray = GrayImage::from_pixel(21, 21, Luma([200]));
        gray.put_pixel(10, 10, Luma([20]));
        let binary = LesionDetector::default().adaptive_threshold(&gray);
        assert_eq!(binary.get_pixel(10, 10)[0], FOREGROUND);
        assert_eq!(binary.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn shoelace_area_of_square_border() {
        let contour = Contour {
            points: vec![
                imageproc::point::Point::new(0, 0),
                imageproc::point::Point::new(10, 0),
                imageproc::point::Point::new(10, 10),
                imageproc::point::Point::new(0, 10),
            ],
            border_type: BorderType::Outer,
            parent: None,
        };
        assert_eq!(contour_area(&contour), 100.0);
        assert_eq!(bounding_box(&contour), Some(Position::new(0, 0, 11, 11)));
    }

    #[test]
    fn single_round_mole_gives_one_region() {
        let mut image = RgbImage::from_pixel(100, 100, BACKGROUND);
        paint_disk(&mut image, 49.5, 49.5, 15.0, MOLE);
        let regions = LesionDetector::default().propose(&image).expect("valid image");
        assert_eq!(regions.len(), 1);
        let position = regions[0].position;
        assert_eq!(position, Position::new(35, 35, 30, 30));
        assert_eq!(regions[0].pixels.dimensions(), (30, 30));
    }

    #[test]
    fn tiny_specks_and_long_streaks_are_rejected() {
        let mut image = RgbImage::from_pixel(120, 120, BACKGROUND);
        // 2x2 speck: area far below the minimum.
        for (x, y) in [(10, 10), (11, 10), (10, 11), (11, 11)] {
            image.put_pixel(x, y, MOLE);
        }
        // 60x4 streak: aspect ratio far above the maximum.
        for y in 80..84 {
            for x in 20..80 {
                image.put_pixel(x, y, MOLE);
            }
        }
        let regions = LesionDetector::default().propose(&image).expect("valid image");
        assert!(regions.is_empty());
    }

    #[test]
    fn proposals_are_capped() {
        let mut image = RgbImage::from_pixel(400, 400, BACKGROUND);
        for row in 0..5 {
            for col in 0..5 {
                paint_disk(&mut image, 40.0 + col as f64 * 75.0, 40.0 + row as f64 * 75.0, 12.0, MOLE);
            }
        }
        let regions = LesionDetector::default().propose(&image).expect("valid image");
        assert_eq!(regions.len(), 10);

        let config = LesionConfig { max_regions: 3, ..LesionConfig::default() };
        let regions = LesionDetector::new(config).propose(&image).expect("valid image");
        assert_eq!(regions.len(), 3);
    }

    #[test]
    fn zero_area_image_is_rejected() {
        let error = LesionDetector::default().propose(&RgbImage::new(0, 0)).unwrap_err();
        assert!(error.is_image_unreadable());
    }
}
