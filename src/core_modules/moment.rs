// THEORY:
// Raw and central image moments of a grayscale region, treating each pixel's
// intensity as mass. The lesion classifier only needs one shape statistic from
// them: the mixed central moment `mu11` normalised by the total mass `m00`.
// For a region that is symmetric about either axis through its centroid,
// `mu11` vanishes; a lopsided, diagonally smeared mole gives a non-zero value.
//
// A region with no mass (all black) has no centroid; every statistic is then
// reported as zero instead of dividing by zero.

use image::GrayImage;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ImageMoments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
    pub m11: f64,
}

impl ImageMoments {
    pub fn from_gray(image: &GrayImage) -> Self {
        let mut moments = ImageMoments::default();
        for (x, y, pixel) in image.enumerate_pixels() {
            let mass = pixel[0] as f64;
            if mass == 0.0 {
                continue;
            }
            let (x, y) = (x as f64, y as f64);
            moments.m00 += mass;
            moments.m10 += x * mass;
            moments.m01 += y * mass;
            moments.m11 += x * y * mass;
        }
        moments
    }

    pub fn centroid(&self) -> Option<(f64, f64)> {
        if self.m00 == 0.0 {
            return None;
        }
        Some((self.m10 / self.m00, self.m01 / self.m00))
    }

    /// Mixed central moment about the centroid.
    pub fn mu11(&self) -> f64 {
        if self.m00 == 0.0 {
            return 0.0;
        }
        self.m11 - self.m10 * self.m01 / self.m00
    }

    /// `mu11 / m00`, or 0 for a massless region.
    pub fn asymmetry(&self) -> f64 {
        if self.m00 == 0.0 {
            return 0.0;
        }
        self.mu11() / self.m00
    }
}
