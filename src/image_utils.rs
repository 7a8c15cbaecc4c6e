use image::DynamicImage;

use crate::errors::{ChromaError, Result};

/// Intensity raster sampled by profile extraction.
///
/// Samples are stored row-major with channels interleaved, so the value of
/// channel `c` at pixel `(x, y)` lives at `(y * width + x) * channels + c`.
/// A single channel is a plain 2-D raster.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    width: usize,
    height: usize,
    channels: usize,
    samples: Vec<f64>,
}

impl Raster {
    /// Wrap raw samples, checking that the buffer matches the dimensions
    pub fn new(width: usize, height: usize, channels: usize, samples: Vec<f64>) -> Result<Self> {
        if channels == 0 {
            return Err(ChromaError::Extraction(
                "raster must have at least one channel".to_string(),
            ));
        }
        let expected = width * height * channels;
        if samples.len() != expected {
            return Err(ChromaError::Extraction(format!(
                "raster of {}x{}x{} needs {} samples, got {}",
                width, height, channels, expected, samples.len()
            )));
        }

        Ok(Self { width, height, channels, samples })
    }

    /// Build a single-channel raster from a per-pixel function
    pub fn from_fn<F>(width: usize, height: usize, f: F) -> Self
    where
        F: Fn(usize, usize) -> f64,
    {
        let mut samples = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                samples.push(f(x, y));
            }
        }
        Self { width, height, channels: 1, samples }
    }

    /// Convert a decoded image.
    ///
    /// Grayscale images keep one channel (16-bit depth is preserved), colour
    /// images become three RGB channels. Alpha is dropped.
    pub fn from_dynamic_image(img: &DynamicImage) -> Self {
        let color = img.color();

        if !color.has_color() {
            if color.bytes_per_pixel() / color.channel_count() > 1 {
                let buf = img.to_luma16();
                let (w, h) = buf.dimensions();
                let samples = buf.into_raw().into_iter().map(f64::from).collect();
                return Self { width: w as usize, height: h as usize, channels: 1, samples };
            }

            let buf = img.to_luma8();
            let (w, h) = buf.dimensions();
            let samples = buf.into_raw().into_iter().map(f64::from).collect();
            return Self { width: w as usize, height: h as usize, channels: 1, samples };
        }

        let buf = img.to_rgb8();
        let (w, h) = buf.dimensions();
        let samples = buf.into_raw().into_iter().map(f64::from).collect();
        Self { width: w as usize, height: h as usize, channels: 3, samples }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Intensity at a pixel: the raw value for one channel, else the channel mean
    #[inline]
    pub fn intensity(&self, x: usize, y: usize) -> f64 {
        let base = (y * self.width + x) * self.channels;
        let pixel = &self.samples[base..base + self.channels];
        if self.channels == 1 {
            pixel[0]
        } else {
            pixel.iter().sum::<f64>() / self.channels as f64
        }
    }

    /// Brightness/contrast adjustment with 8-bit saturation.
    ///
    /// Each sample becomes `|contrast * v + brightness * 127|`, rounded and
    /// clamped to `0..=255`. Brightness is expected in `[-1, 1]` and contrast
    /// in `[0.5, 2]`.
    pub fn adjusted(&self, brightness: f64, contrast: f64) -> Raster {
        let beta = brightness * 127.0;
        let samples = self
            .samples
            .iter()
            .map(|&v| (contrast * v + beta).abs().round().clamp(0.0, 255.0))
            .collect();

        Raster {
            width: self.width,
            height: self.height,
            channels: self.channels,
            samples,
        }
    }
}

/// Check if a point is inside the image bounds
#[inline]
pub fn in_bounds(x: i64, y: i64, width: usize, height: usize) -> bool {
    x >= 0 && y >= 0 && (x as usize) < width && (y as usize) < height
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};

    #[test]
    fn new_rejects_mismatched_buffers() {
        assert!(Raster::new(2, 2, 1, vec![0.0; 3]).is_err());
        assert!(Raster::new(2, 2, 0, Vec::new()).is_err());
        assert!(Raster::new(2, 2, 3, vec![0.0; 12]).is_ok());
    }

    #[test]
    fn multi_channel_intensity_is_channel_mean() {
        let raster = Raster::new(1, 1, 3, vec![30.0, 60.0, 90.0]).unwrap();
        assert_eq!(raster.intensity(0, 0), 60.0);
    }

    #[test]
    fn converts_gray_and_colour_images() {
        let mut gray = GrayImage::new(2, 1);
        gray.put_pixel(1, 0, Luma([200]));
        let raster = Raster::from_dynamic_image(&DynamicImage::ImageLuma8(gray));
        assert_eq!(raster.channels(), 1);
        assert_eq!(raster.intensity(1, 0), 200.0);

        let mut rgb = RgbImage::new(1, 2);
        rgb.put_pixel(0, 1, Rgb([10, 20, 30]));
        let raster = Raster::from_dynamic_image(&DynamicImage::ImageRgb8(rgb));
        assert_eq!(raster.channels(), 3);
        assert_eq!((raster.width(), raster.height()), (1, 2));
        assert_eq!(raster.intensity(0, 1), 20.0);
    }

    #[test]
    fn adjustment_saturates_to_eight_bits() {
        let raster = Raster::new(3, 1, 1, vec![0.0, 100.0, 200.0]).unwrap();
        let brighter = raster.adjusted(0.5, 2.0);
        assert_eq!(brighter.intensity(0, 0), 64.0);
        assert_eq!(brighter.intensity(1, 0), 255.0);
        assert_eq!(brighter.intensity(2, 0), 255.0);

        let darker = raster.adjusted(-1.0, 1.0);
        // |0 - 127| folds back to positive like an absolute scale.
        assert_eq!(darker.intensity(0, 0), 127.0);
        assert_eq!(darker.intensity(2, 0), 73.0);
    }

    #[test]
    fn bounds_check_handles_negatives() {
        assert!(in_bounds(0, 0, 1, 1));
        assert!(!in_bounds(-1, 0, 5, 5));
        assert!(!in_bounds(5, 0, 5, 5));
    }
}
