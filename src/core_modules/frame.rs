// THEORY:
// A `Frame` is the validated view of the caller's image that every analysis
// stage works on. It is the single place where the "image must have pixels"
// rule is enforced: constructing a `Frame` from a zero-area buffer fails with
// `ImageUnreadable`, so no stage below it ever has to guard a division by the
// pixel count.
//
// The frame borrows the caller's buffer rather than copying it. Derived planes
// (grayscale, HSV) are produced on demand and owned by the stage that asked
// for them, which keeps concurrent analyses of the same image free of shared
// mutable state.

use crate::core_modules::pixel::{Hsv, Pixel};
use crate::error::{AnalysisError, Result};
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbImage};
use std::path::Path;

/// Decodes an encoded image (PNG, JPEG, ...) held in memory into RGB.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage> {
    if bytes.is_empty() {
        return Err(AnalysisError::ImageUnreadable("encoded buffer is empty".into()));
    }
    let decoded = image::load_from_memory(bytes)?;
    Ok(decoded.to_rgb8())
}

/// Opens and decodes an image file into RGB.
pub fn load_image(path: impl AsRef<Path>) -> Result<RgbImage> {
    let path = path.as_ref();
    let decoded = image::open(path).map_err(|error| {
        AnalysisError::ImageUnreadable(format!("{}: {}", path.display(), error))
    })?;
    Ok(decoded.to_rgb8())
}

/// The three HSV channels of an image, one byte per pixel, row-major.
#[derive(Debug, Clone)]
pub struct HsvPlanes {
    pub hue: Vec<u8>,
    pub saturation: Vec<u8>,
    pub value: Vec<u8>,
}

/// A borrowed, non-empty RGB image.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    image: &'a RgbImage,
}

impl<'a> Frame<'a> {
    pub fn new(image: &'a RgbImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(AnalysisError::ImageUnreadable(format!(
                "image has zero area ({}x{})",
                width, height
            )));
        }
        Ok(Self { image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Number of pixels; never zero.
    pub fn area(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    pub fn image(&self) -> &'a RgbImage {
        self.image
    }

    pub fn pixel(&self, x: u32, y: u32) -> Pixel {
        Pixel::from(self.image.get_pixel(x, y))
    }

    /// All pixels in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = Pixel> + 'a {
        self.image.pixels().map(Pixel::from)
    }

    pub fn to_gray(&self) -> GrayImage {
        to_gray(self.image)
    }

    pub fn hsv_planes(&self) -> HsvPlanes {
        hsv_planes(self.image)
    }

    /// Copies out the rectangle at `(x, y)` of size `width` x `height`.
    /// The rectangle is clipped to the frame; a clip with no pixels left fails.
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Result<RgbImage> {
        let x_end = x.saturating_add(width).min(self.width());
        let y_end = y.saturating_add(height).min(self.height());
        if x >= x_end || y >= y_end {
            return Err(AnalysisError::ImageUnreadable(format!(
                "crop ({}, {}, {}, {}) lies outside the {}x{} frame",
                x,
                y,
                width,
                height,
                self.width(),
                self.height()
            )));
        }
        Ok(imageops::crop_imm(self.image, x, y, x_end - x, y_end - y).to_image())
    }
}

/// Grayscale conversion for any RGB buffer (empty buffers give empty output).
pub fn to_gray(image: &RgbImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut gray = GrayImage::new(width, height);
    for (source, target) in image.pixels().zip(gray.pixels_mut()) {
        *target = Luma([Pixel::from(source).gray()]);
    }
    gray
}

/// Splits any RGB buffer into its 8-bit HSV planes.
pub fn hsv_planes(image: &RgbImage) -> HsvPlanes {
    let count = image.width() as usize * image.height() as usize;
    let mut planes = HsvPlanes {
        hue: Vec::with_capacity(count),
        saturation: Vec::with_capacity(count),
        value: Vec::with_capacity(count),
    };
    for rgb in image.pixels() {
        let Hsv { hue, saturation, value } = Pixel::from(rgb).hsv();
        planes.hue.push(hue);
        planes.saturation.push(saturation);
        planes.value.push(value);
    }
    planes
}

/// Resamples an RGB buffer to exactly `width` x `height`.
pub fn resize(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    imageops::resize(image, width, height, FilterType::Triangle)
}

/// Mean and population standard deviation of a byte plane.
pub fn mean_and_std_dev(values: &[u8]) -> (f64, f64) {
    let count = values.len() as f64;
    if count < 1.0 {
        return (0.0, 0.0);
    }
    let sum: f64 = values.iter().map(|&v| v as f64).sum();
    let mean = sum / count;
    let variance = values.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / count;
    (mean, variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::io::Cursor;

    #[test]
    fn zero_area_images_are_unreadable() {
        let empty = RgbImage::new(0, 0);
        let error = Frame::new(&empty).unwrap_err();
        assert!(error.is_image_unreadable());

        let no_rows = RgbImage::new(12, 0);
        assert!(Frame::new(&no_rows).is_err());
    }

    #[test]
    fn crop_clips_to_frame() {
        let image = RgbImage::from_pixel(10, 8, Rgb([10, 20, 30]));
        let frame = Frame::new(&image).expect("non-empty");
        let crop = frame.crop(6, 4, 10, 10).expect("partially inside");
        assert_eq!(crop.dimensions(), (4, 4));
        assert!(frame.crop(10, 0, 2, 2).is_err());
    }

    #[test]
    fn decode_round_trips_png_and_rejects_garbage() {
        let image = RgbImage::from_pixel(4, 3, Rgb([200, 160, 125]));
        let mut encoded = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut encoded), image::ImageFormat::Png)
            .expect("png encodes");

        let decoded = decode_image(&encoded).expect("png decodes");
        assert_eq!(decoded.dimensions(), (4, 3));
        assert_eq!(decoded.get_pixel(2, 1), &Rgb([200, 160, 125]));

        assert!(decode_image(&[]).unwrap_err().is_image_unreadable());
        assert!(decode_image(b"not an image at all").unwrap_err().is_image_unreadable());
    }

    #[test]
    fn load_image_reports_missing_files_as_unreadable() {
        let error = load_image("/no/such/face.png").unwrap_err();
        assert!(error.is_image_unreadable());
    }

    #[test]
    fn std_dev_of_constant_plane_is_zero() {
        let (mean, std_dev) = mean_and_std_dev(&[7, 7, 7, 7]);
        assert_eq!(mean, 7.0);
        assert_eq!(std_dev, 0.0);

        let (mean, std_dev) = mean_and_std_dev(&[0, 10]);
        assert_eq!(mean, 5.0);
        assert_eq!(std_dev, 5.0);
    }
}
