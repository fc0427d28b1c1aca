// THEORY:
// The skin region extractor isolates skin-coloured pixels with a fixed window
// on the two chroma channels of YCrCb. Luma is deliberately left unconstrained:
// the chroma of skin is remarkably stable across tones and lighting, while its
// brightness is not.
//
// The raw threshold is speckled (isolated matches in hair, clothing or the
// background) and holed (specular highlights, pores). One opening pass removes
// the specks, one closing pass fills the holes, both with a small elliptical
// element.
//
// An all-zero mask is a normal outcome ("no skin detected"), not an error. The
// consumers of the mask are responsible for turning that into their own
// neutral result.

use crate::config::SkinMaskConfig;
use crate::core_modules::frame::Frame;
use crate::core_modules::morphology::{self, StructuringElement};
use crate::core_modules::pixel::Pixel;
use image::{GrayImage, Luma};
use tracing::debug;

const SKIN: u8 = 255;
const BACKGROUND: u8 = 0;

/// Binary grid with the same dimensions as its source image; 255 marks skin.
#[derive(Debug, Clone, PartialEq)]
pub struct SkinMask {
    mask: GrayImage,
    skin_pixel_count: usize,
}

impl SkinMask {
    pub fn from_gray(mask: GrayImage) -> Self {
        let skin_pixel_count = mask.pixels().filter(|p| p[0] != BACKGROUND).count();
        Self { mask, skin_pixel_count }
    }

    pub fn width(&self) -> u32 {
        self.mask.width()
    }

    pub fn height(&self) -> u32 {
        self.mask.height()
    }

    pub fn is_skin(&self, x: u32, y: u32) -> bool {
        self.mask.get_pixel(x, y)[0] != BACKGROUND
    }

    pub fn skin_pixel_count(&self) -> usize {
        self.skin_pixel_count
    }

    /// True when no pixel survived thresholding and clean-up.
    pub fn is_empty(&self) -> bool {
        self.skin_pixel_count == 0
    }

    /// Fraction of the image classified as skin, in [0, 1].
    pub fn coverage(&self) -> f64 {
        let total = self.mask.width() as usize * self.mask.height() as usize;
        if total == 0 {
            return 0.0;
        }
        self.skin_pixel_count as f64 / total as f64
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.mask
    }

    /// The frame's pixels under the mask, in row-major order.
    pub fn skin_pixels<'a>(&'a self, frame: Frame<'a>) -> impl Iterator<Item = Pixel> + 'a {
        frame
            .image()
            .pixels()
            .zip(self.mask.pixels())
            .filter(|(_, mask)| mask[0] != BACKGROUND)
            .map(|(rgb, _)| Pixel::from(rgb))
    }
}

/// Stateless extractor configured with the chroma window.
#[derive(Debug, Clone)]
pub struct SkinExtractor {
    config: SkinMaskConfig,
    element: StructuringElement,
}

impl SkinExtractor {
    pub fn new(config: SkinMaskConfig) -> Self {
        let element = StructuringElement::ellipse(config.kernel_radius);
        Self { config, element }
    }

    /// Whether a single pixel's chroma falls in the skin window.
    pub fn is_skin_color(&self, pixel: &Pixel) -> bool {
        let ycrcb = pixel.ycrcb();
        (self.config.cr_min..=self.config.cr_max).contains(&ycrcb.cr)
            && (self.config.cb_min..=self.config.cb_max).contains(&ycrcb.cb)
    }

    pub fn extract(&self, frame: &Frame) -> SkinMask {
        // --- 1. Chroma threshold ---
        let mut raw = GrayImage::new(frame.width(), frame.height());
        for (rgb, target) in frame.image().pixels().zip(raw.pixels_mut()) {
            let value = if self.is_skin_color(&Pixel::from(rgb)) { SKIN } else { BACKGROUND };
            *target = Luma([value]);
        }

        // --- 2. Clean-up: open removes specks, close fills holes ---
        let opened = morphology::open(&raw, &self.element);
        let cleaned = morphology::close(&opened, &self.element);

        let mask = SkinMask::from_gray(cleaned);
        debug!(
            skin_pixels = mask.skin_pixel_count(),
            coverage = mask.coverage(),
            "skin mask extracted"
        );
        mask
    }
}

impl Default for SkinExtractor {
    fn default() -> Self {
        Self::new(SkinMaskConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    const SKIN_TONE: Rgb<u8> = Rgb([200, 160, 125]);

    #[test]
    fn black_image_has_no_skin() {
        let image = RgbImage::new(32, 32);
        let frame = Frame::new(&image).expect("non-empty");
        let mask = SkinExtractor::default().extract(&frame);
        assert!(mask.is_empty());
        assert_eq!((mask.width(), mask.height()), (32, 32));
        assert_eq!(mask.coverage(), 0.0);
    }

    #[test]
    fn uniform_skin_is_fully_masked() {
        let image = RgbImage::from_pixel(24, 18, SKIN_TONE);
        let frame = Frame::new(&image).expect("non-empty");
        let mask = SkinExtractor::default().extract(&frame);
        assert_eq!(mask.skin_pixel_count(), 24 * 18);
        assert_eq!(mask.coverage(), 1.0);
        assert_eq!(mask.skin_pixels(frame).count(), 24 * 18);
    }

    #[test]
    fn isolated_skin_speck_is_removed() {
        let mut image = RgbImage::from_pixel(20, 20, Rgb([20, 60, 200]));
        image.put_pixel(10, 10, SKIN_TONE);
        let frame = Frame::new(&image).expect("non-empty");
        let mask = SkinExtractor::default().extract(&frame);
        assert!(mask.is_empty());
    }

    #[test]
    fn skin_patch_is_kept_and_background_rejected() {
        let mut image = RgbImage::from_pixel(40, 40, Rgb([30, 90, 30]));
        for y in 10..30 {
            for x in 10..30 {
                image.put_pixel(x, y, SKIN_TONE);
            }
        }
        let frame = Frame::new(&image).expect("non-empty");
        let mask = SkinExtractor::default().extract(&frame);
        assert!(mask.is_skin(20, 20));
        assert!(!mask.is_skin(2, 2));
        assert!(mask.skin_pixels(frame).all(|p| p == Pixel::from(&SKIN_TONE)));
    }
}
