//! Single-frame luminance mapping.
//!
//! A frame is mapped pixel by pixel: the 16-bit RGB sample is reduced to an
//! 8-bit luminance, which selects a glyph from the [`Gradient`]. Every glyph
//! is written twice so that the output keeps roughly the aspect ratio of the
//! source on a terminal, where cells are about twice as tall as they are wide.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

use crate::error::GradientError;

/// Gradient used when nothing else is configured, densest glyph first.
pub const DEFAULT_GRADIENT: &str = "@@#$S%?xoa*+-)/|!;:,.";

/// Ordered glyph set, densest first.
///
/// Only printable ASCII is accepted: every glyph has to occupy exactly one
/// byte and one terminal cell, and must never collide with the newline that
/// ends a row or the delimiter of the frame cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gradient {
    glyphs: String,
}

impl Gradient {
    pub fn new(glyphs: &str) -> Result<Self, GradientError> {
        if glyphs.is_empty() {
            return Err(GradientError::Empty);
        }
        if let Some(c) = glyphs.chars().find(|c| !c.is_ascii()) {
            return Err(GradientError::NonAscii(c));
        }
        if let Some(c) = glyphs.chars().find(|c| c.is_ascii_control()) {
            return Err(GradientError::Control(c));
        }
        Ok(Self {
            glyphs: glyphs.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.glyphs
    }

    /// Position in the gradient selected for `luma`.
    pub fn index_for(&self, luma: u8) -> usize {
        gradient_index(luma, self.len())
    }

    pub fn glyph_for(&self, luma: u8) -> char {
        char::from(self.glyphs.as_bytes()[self.index_for(luma)])
    }
}

impl Default for Gradient {
    fn default() -> Self {
        Self {
            glyphs: DEFAULT_GRADIENT.to_string(),
        }
    }
}

impl FromStr for Gradient {
    type Err = GradientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for Gradient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.glyphs)
    }
}

/// Perceptual luminance of a 16-bit RGB sample, scaled to 8 bits.
///
/// Full white rounds up to 256 and is clamped back to 255.
pub fn luminance(r: u16, g: u16, b: u16) -> u8 {
    let weighted = 0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b);
    (weighted / 256.0).round().min(255.0) as u8
}

/// Maps a luminance onto a gradient of `len` glyphs.
///
/// Bright pixels pick dense glyphs: 255 maps to index 0 and 0 maps to
/// `len - 1`. `(255 - luma) * len` is at most `255 * len`, so the quotient
/// never reaches `len`.
pub fn gradient_index(luma: u8, len: usize) -> usize {
    (255 - usize::from(luma)) * len / 256
}

/// Turns decoded rasters into mapped frames.
#[derive(Debug, Clone, Default)]
pub struct FrameMapper {
    gradient: Gradient,
    size: Option<(u32, u32)>,
}

impl FrameMapper {
    pub fn new(gradient: Gradient) -> Self {
        Self {
            gradient,
            size: None,
        }
    }

    /// Resize rasters that do not already match `width` x `height` before
    /// mapping them.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = Some((width.max(1), height.max(1)));
        self
    }

    pub fn gradient(&self) -> &Gradient {
        &self.gradient
    }

    pub fn size(&self) -> Option<(u32, u32)> {
        self.size
    }

    pub fn map_image(&self, img: &DynamicImage) -> String {
        let resized;
        let img = match self.size {
            Some((w, h)) if (w, h) != img.dimensions() => {
                resized = img.resize_exact(w, h, FilterType::Lanczos3);
                &resized
            }
            _ => img,
        };

        let rgb = img.to_rgb16();
        let (w, h) = rgb.dimensions();
        let mut out = String::with_capacity((w as usize * 2 + 1) * h as usize);
        for y in 0..h {
            for x in 0..w {
                let px = rgb.get_pixel(x, y);
                let glyph = self.gradient.glyph_for(luminance(px[0], px[1], px[2]));
                out.push(glyph);
                out.push(glyph);
            }
            out.push('\n');
        }
        out
    }

    pub fn map_file(&self, path: &Path) -> Result<String, image::ImageError> {
        let img = image::open(path)?;
        Ok(self.map_image(&img))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn uniform(width: u32, height: u32, value: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([value, value, value])))
    }

    #[test]
    fn test_luminance_extremes() {
        assert_eq!(luminance(0, 0, 0), 0);
        assert_eq!(luminance(u16::MAX, u16::MAX, u16::MAX), 255);
        // Pure green outweighs pure red and blue
        assert!(luminance(0, u16::MAX, 0) > luminance(u16::MAX, 0, 0));
        assert!(luminance(u16::MAX, 0, 0) > luminance(0, 0, u16::MAX));
    }

    #[test]
    fn test_gradient_index_in_range_and_monotone() {
        for len in 1..=70 {
            let mut previous = 0;
            for luma in (0..=255u8).rev() {
                let idx = gradient_index(luma, len);
                assert!(idx < len, "len {len} luma {luma} gave {idx}");
                assert!(idx >= previous, "index decreased at len {len} luma {luma}");
                previous = idx;
            }
            assert_eq!(gradient_index(255, len), 0);
            assert_eq!(gradient_index(0, len), len - 1);
        }
    }

    #[test]
    fn test_gradient_validation() {
        assert_eq!(Gradient::new(""), Err(GradientError::Empty));
        assert_eq!(Gradient::new("ab\rc"), Err(GradientError::Control('\r')));
        assert_eq!(Gradient::new("a\n"), Err(GradientError::Control('\n')));
        assert_eq!(Gradient::new("aé"), Err(GradientError::NonAscii('é')));
        assert_eq!(Gradient::new("#. ").unwrap().len(), 3);
        assert_eq!(Gradient::default().as_str(), DEFAULT_GRADIENT);
    }

    #[test]
    fn test_uniform_frames_with_three_glyphs() {
        let mapper = FrameMapper::new(Gradient::new("#. ").unwrap());

        let dark = mapper.map_image(&uniform(2, 2, 0));
        let mid = mapper.map_image(&uniform(2, 2, 128));
        let bright = mapper.map_image(&uniform(2, 2, 255));

        assert_eq!(dark, "    \n    \n");
        assert_eq!(mid, "....\n....\n");
        assert_eq!(bright, "####\n####\n");
        for frame in [&dark, &mid, &bright] {
            assert_eq!(frame.lines().count(), 2);
            assert_eq!(frame.chars().filter(|c| *c != '\n').count(), 8);
        }
    }

    #[test]
    fn test_each_pixel_is_doubled() {
        let mut img = RgbImage::new(3, 1);
        img.put_pixel(0, 0, Rgb([255, 255, 255]));
        img.put_pixel(1, 0, Rgb([0, 0, 0]));
        img.put_pixel(2, 0, Rgb([255, 255, 255]));
        let mapper = FrameMapper::new(Gradient::new("@.").unwrap());

        assert_eq!(mapper.map_image(&DynamicImage::ImageRgb8(img)), "@@..@@\n");
    }

    #[test]
    fn test_resize_to_configured_size() {
        let mapper = FrameMapper::new(Gradient::new("#. ").unwrap()).with_size(4, 3);
        let frame = mapper.map_image(&uniform(16, 9, 255));

        let lines: Vec<&str> = frame.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|l| *l == "########"));
    }

    #[test]
    fn test_map_file_reads_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame-1.png");
        RgbImage::from_pixel(2, 1, Rgb([0, 0, 0])).save(&path).unwrap();

        let mapper = FrameMapper::new(Gradient::new("#. ").unwrap());
        assert_eq!(mapper.map_file(&path).unwrap(), "    \n");
        assert!(mapper.map_file(&dir.path().join("missing.png")).is_err());
    }
}
