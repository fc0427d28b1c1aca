// THEORY:
// Grayscale mathematical morphology over a small structuring element. Two
// primitives do all the work:
// - erosion replaces each pixel with the minimum under the element,
// - dilation replaces it with the maximum.
// The compound operators follow from them: opening (erode then dilate) removes
// bright features smaller than the element, closing (dilate then erode) fills
// dark holes smaller than the element, and the top-hat (original minus its
// opening) isolates exactly the small bright features the opening removed.
//
// The min/max filters themselves come from `imageproc`, which skips element
// positions that fall outside the image, so borders neither erode nor grow.
// What this module owns is the shape of the elements: the skin clean-up uses
// the classic 5x5 ellipse (a plus-shaped cap on the top and bottom rows), which
// differs from imageproc's own `Mask::disk`.

use image::{GrayImage, Luma};
use imageproc::morphology::{Mask, grayscale_close, grayscale_open};

/// A structuring element with the radius it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuringElement {
    radius: u8,
    mask: Mask,
}

/// Whether `(dx, dy)` lies in the ellipse inscribed in a `(2r+1)` square.
fn in_ellipse(dx: i32, dy: i32, r: i32) -> bool {
    if r == 0 {
        return dx == 0 && dy == 0;
    }
    let ratio = 1.0 - (dy * dy) as f64 / (r * r) as f64;
    let half_width = (r as f64 * ratio.max(0.0).sqrt()).round() as i32;
    dx.abs() <= half_width
}

impl StructuringElement {
    /// An ellipse inscribed in a `(2r+1)` square; radius 2 gives the familiar
    /// 5x5 disk with only the centre pixel on the top and bottom rows.
    pub fn ellipse(radius: u8) -> Self {
        let r = radius as i32;
        let side = 2 * radius as u32 + 1;
        let shape = GrayImage::from_fn(side, side, |x, y| {
            let inside = in_ellipse(x as i32 - r, y as i32 - r, r);
            Luma([if inside { u8::MAX } else { 0 }])
        });
        Self {
            radius,
            mask: Mask::from_image(&shape, radius, radius),
        }
    }

    /// A full `(2r+1)` x `(2r+1)` square.
    pub fn square(radius: u8) -> Self {
        Self {
            radius,
            mask: Mask::square(radius),
        }
    }

    pub fn radius(&self) -> u8 {
        self.radius
    }

    pub fn mask(&self) -> &Mask {
        &self.mask
    }
}

/// Erosion then dilation: removes small bright specks.
pub fn open(image: &GrayImage, element: &StructuringElement) -> GrayImage {
    grayscale_open(image, element.mask())
}

/// Dilation then erosion: fills small dark holes.
pub fn close(image: &GrayImage, element: &StructuringElement) -> GrayImage {
    grayscale_close(image, element.mask())
}

/// Original minus its opening.
pub fn top_hat(image: &GrayImage, element: &StructuringElement) -> GrayImage {
    let mut output = open(image, element);
    for (original, target) in image.pixels().zip(output.pixels_mut()) {
        *target = Luma([original[0].saturating_sub(target[0])]);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::morphology::{grayscale_dilate, grayscale_erode};

    fn count_set(image: &GrayImage) -> usize {
        image.pixels().filter(|p| p[0] > 0).count()
    }

    #[test]
    fn ellipse_radius_two_is_the_5x5_disk() {
        #[rustfmt::skip]
        let expected = [
            0, 0, 1, 0, 0,
            1, 1, 1, 1, 1,
            1, 1, 1, 1, 1,
            1, 1, 1, 1, 1,
            0, 0, 1, 0, 0,
        ];
        let shape = GrayImage::from_fn(5, 5, |x, y| Luma([expected[(y * 5 + x) as usize] * 255]));
        let element = StructuringElement::ellipse(2);
        assert_eq!(element.mask(), &Mask::from_image(&shape, 2, 2));
        assert_eq!(element.radius(), 2);

        // Dilating a single point paints the element itself.
        let mut point = GrayImage::new(5, 5);
        point.put_pixel(2, 2, Luma([255]));
        assert_eq!(count_set(&grayscale_dilate(&point, element.mask())), 17);
    }

    #[test]
    fn square_matches_the_full_block() {
        assert_eq!(StructuringElement::square(1).mask(), &Mask::square(1));
        assert_eq!(StructuringElement::ellipse(0), StructuringElement::square(0));
    }

    #[test]
    fn borders_neither_erode_nor_grow() {
        let image = GrayImage::from_pixel(6, 4, Luma([255]));
        let element = StructuringElement::ellipse(2);
        assert_eq!(grayscale_erode(&image, element.mask()), image);
    }

    #[test]
    fn opening_removes_isolated_speck() {
        let mut image = GrayImage::new(15, 15);
        image.put_pixel(7, 7, Luma([255]));
        let opened = open(&image, &StructuringElement::ellipse(2));
        assert_eq!(count_set(&opened), 0);
    }

    #[test]
    fn closing_fills_small_hole() {
        let mut image = GrayImage::from_pixel(15, 15, Luma([255]));
        image.put_pixel(7, 7, Luma([0]));
        let closed = close(&image, &StructuringElement::ellipse(2));
        assert_eq!(count_set(&closed), 15 * 15);
    }

    #[test]
    fn full_mask_survives_open_and_close() {
        let image = GrayImage::from_pixel(6, 4, Luma([255]));
        let element = StructuringElement::ellipse(2);
        assert_eq!(close(&open(&image, &element), &element), image);
    }

    #[test]
    fn top_hat_isolates_small_bright_structure() {
        let mut image = GrayImage::from_pixel(9, 9, Luma([100]));
        image.put_pixel(4, 4, Luma([180]));
        let response = top_hat(&image, &StructuringElement::square(1));
        assert_eq!(response.get_pixel(4, 4)[0], 80);
        assert_eq!(response.get_pixel(0, 0)[0], 0);
        assert_eq!(count_set(&response), 1);
    }

    #[test]
    fn top_hat_of_uniform_image_is_zero() {
        let image = GrayImage::from_pixel(20, 20, Luma([128]));
        let response = top_hat(&image, &StructuringElement::square(1));
        assert_eq!(count_set(&response), 0);
    }
}
