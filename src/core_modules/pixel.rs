// THEORY (1D Pixel Heuristics):
// The `Pixel` module is the most fundamental unit of the skin engine. It is a
// "dumb" data container for a single RGB pixel plus the single-pixel colour
// transforms every higher stage relies on. Nothing here looks at neighbours;
// anything spatial (filters, morphology, contours) lives in the 2D modules.
//
// Colour spaces provided (all using the common 8-bit conventions so thresholds
// calibrated on 8-bit images carry over unchanged):
// - Gray / luma:  Rec. 601 weighted sum, rounded to a byte.
// - YCrCb:        luma plus the red and blue chroma offsets around 128. The
//                 chroma pair is largely independent of brightness, which is
//                 what makes it useful for skin segmentation.
// - HSV:          hue in [0, 180) (degrees halved to fit a byte), saturation and
//                 value in [0, 255].
//
// Pairwise helpers (distance between two colours) sit here as well; they are
// the only comparison the engine needs and do not warrant a separate module.

use image::Rgb;

pub type Channel = u8;
pub type Luma = f64;
pub type Hue = u8;
pub type Saturation = u8;
pub type Value = u8;
pub type ColorDistance = f64;

/// A "dumb" data container representing a single RGB pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pixel {
    /// The red channel value (0-255).
    pub red: Channel,
    /// The green channel value (0-255).
    pub green: Channel,
    /// The blue channel value (0-255).
    pub blue: Channel,
}

/// A pixel expressed in the 8-bit YCrCb space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YCrCb {
    pub luma: u8,
    pub cr: u8,
    pub cb: u8,
}

/// A pixel expressed in the 8-bit HSV space (hue halved into [0, 180)).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hsv {
    pub hue: Hue,
    pub saturation: Saturation,
    pub value: Value,
}

impl Pixel {
    pub fn new(red: Channel, green: Channel, blue: Channel) -> Self {
        Self { red, green, blue }
    }

    #[inline]
    fn saturate(value: f64) -> u8 {
        value.round().clamp(0.0, 255.0) as u8
    }

    // ================================= Heuristics =================================

    /// Luminance estimate (Rec. 601 luma) on the 0..255 scale, unrounded.
    pub fn luma(&self) -> Luma {
        0.299_f64 * self.red as f64 + 0.587_f64 * self.green as f64 + 0.114_f64 * self.blue as f64
    }

    /// Grayscale intensity: the luma rounded to a byte.
    pub fn gray(&self) -> u8 {
        Self::saturate(self.luma())
    }

    /// Converts to YCrCb. Cr and Cb are centred on 128.
    pub fn ycrcb(&self) -> YCrCb {
        let luma = self.luma();
        YCrCb {
            luma: Self::saturate(luma),
            cr: Self::saturate((self.red as f64 - luma) * 0.713 + 128.0),
            cb: Self::saturate((self.blue as f64 - luma) * 0.564 + 128.0),
        }
    }

    /// HSV value: brightness defined as max(R, G, B).
    pub fn value(&self) -> Value {
        self.red.max(self.green.max(self.blue))
    }

    /// HSV saturation scaled to [0, 255]; zero for black.
    pub fn saturation(&self) -> Saturation {
        let maximum_channel = self.value();
        if maximum_channel == 0 {
            return 0;
        }
        let minimum_channel = self.red.min(self.green.min(self.blue));
        let chroma = (maximum_channel - minimum_channel) as f64;
        Self::saturate(255.0 * chroma / maximum_channel as f64)
    }

    /// Hue angle in degrees [0, 360). Gray pixels have hue 0.
    pub fn hue_degrees(&self) -> f64 {
        let red = self.red as f64;
        let green = self.green as f64;
        let blue = self.blue as f64;
        let maximum_channel = red.max(green.max(blue));
        let minimum_channel = red.min(green.min(blue));
        let chroma = maximum_channel - minimum_channel;

        if chroma <= 1e-9 {
            return 0.0;
        }

        let (base_difference, sector_offset) = if maximum_channel == red {
            (green - blue, 0.0)
        } else if maximum_channel == green {
            (blue - red, 120.0)
        } else {
            (red - green, 240.0)
        };

        let mut hue_degrees = 60.0 * base_difference / chroma + sector_offset;
        if hue_degrees < 0.0 {
            hue_degrees += 360.0;
        }
        hue_degrees
    }

    /// Full 8-bit HSV triple. Hue 360° wraps back to 0.
    pub fn hsv(&self) -> Hsv {
        let half_hue = Self::saturate(self.hue_degrees() / 2.0);
        Hsv {
            hue: if half_hue >= 180 { 0 } else { half_hue },
            saturation: self.saturation(),
            value: self.value(),
        }
    }

    /// Euclidean distance across the three RGB channels.
    pub fn distance(&self, other: &Pixel) -> ColorDistance {
        let dr = self.red as f64 - other.red as f64;
        let dg = self.green as f64 - other.green as f64;
        let db = self.blue as f64 - other.blue as f64;
        (dr * dr + dg * dg + db * db).sqrt()
    }

    pub fn as_tuple(&self) -> (u8, u8, u8) {
        (self.red, self.green, self.blue)
    }
}

impl From<&Rgb<u8>> for Pixel {
    fn from(rgb: &Rgb<u8>) -> Self {
        Pixel::new(rgb[0], rgb[1], rgb[2])
    }
}

impl From<(u8, u8, u8)> for Pixel {
    fn from((red, green, blue): (u8, u8, u8)) -> Self {
        Pixel::new(red, green, blue)
    }
}

impl From<Pixel> for Rgb<u8> {
    fn from(pixel: Pixel) -> Self {
        Rgb([pixel.red, pixel.green, pixel.blue])
    }
}
