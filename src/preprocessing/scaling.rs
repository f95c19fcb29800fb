//! # Image Scaling Module
//!
//! Upscales narrow photographs so that Tesseract sees characters at a usable size.
//! Images that are already wide enough pass through untouched.

use image::{imageops::FilterType, DynamicImage, GenericImageView};

use super::types::{PreprocessingError, ScaledImageResult};

/// Configuration for minimum-width scaling.
#[derive(Debug, Clone)]
pub struct ImageScaler {
    /// Images narrower than this are upscaled to exactly this width.
    min_width: u32,
}

impl ImageScaler {
    /// Default minimum width for OCR input.
    pub const DEFAULT_MIN_WIDTH: u32 = 800;

    /// Upper bound for a configured minimum width.
    const MAX_MIN_WIDTH: u32 = 10_000;

    /// Creates a new ImageScaler with the default minimum width (800 pixels).
    ///
    /// # Examples
    ///
    /// ```
    /// use careguide_scan::preprocessing::ImageScaler;
    ///
    /// let scaler = ImageScaler::new();
    /// assert_eq!(scaler.min_width(), 800);
    /// ```
    pub fn new() -> Self {
        Self {
            min_width: Self::DEFAULT_MIN_WIDTH,
        }
    }

    /// Creates a new ImageScaler with a custom minimum width.
    ///
    /// # Errors
    ///
    /// Returns `PreprocessingError::InvalidParameter` if the width is 0 or above 10000.
    pub fn with_min_width(min_width: u32) -> Result<Self, PreprocessingError> {
        if !(1..=Self::MAX_MIN_WIDTH).contains(&min_width) {
            return Err(PreprocessingError::InvalidParameter {
                name: "min_width",
                value: f64::from(min_width),
            });
        }

        Ok(Self { min_width })
    }

    /// Returns the configured minimum width.
    pub fn min_width(&self) -> u32 {
        self.min_width
    }

    /// Computes the output dimensions for an input of `width` x `height`.
    ///
    /// The height is scaled by the same ratio as the width and truncated,
    /// never dropping below one pixel.
    ///
    /// ```
    /// use careguide_scan::preprocessing::ImageScaler;
    ///
    /// let scaler = ImageScaler::new();
    /// assert_eq!(scaler.target_dimensions(400, 300), (800, 600));
    /// assert_eq!(scaler.target_dimensions(1200, 900), (1200, 900));
    /// ```
    pub fn target_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        if width >= self.min_width || width == 0 {
            return (width, height);
        }

        let ratio = f64::from(self.min_width) / f64::from(width);
        let new_height = ((f64::from(height) * ratio) as u32).max(1);
        (self.min_width, new_height)
    }

    /// Scales an image up to the minimum width using Lanczos resampling.
    ///
    /// Aspect ratio is preserved; images at or above the minimum width are returned as-is.
    ///
    /// # Errors
    ///
    /// Returns `PreprocessingError::EmptyImage` for a zero-sized image.
    pub fn scale(&self, image: &DynamicImage) -> Result<ScaledImageResult, PreprocessingError> {
        let start_time = std::time::Instant::now();
        let (width, height) = image.dimensions();

        if width == 0 || height == 0 {
            return Err(PreprocessingError::EmptyImage);
        }

        let (new_width, new_height) = self.target_dimensions(width, height);

        let scaled = if (new_width, new_height) == (width, height) {
            image.clone()
        } else {
            image.resize_exact(new_width, new_height, FilterType::Lanczos3)
        };

        let processing_time = start_time.elapsed();

        tracing::debug!(
            target: "ocr_preprocessing",
            "Scaling completed in {}ms: {}x{} -> {}x{}",
            processing_time.as_millis(),
            width,
            height,
            new_width,
            new_height
        );

        Ok(ScaledImageResult {
            image: scaled,
            original_dimensions: (width, height),
            new_dimensions: (new_width, new_height),
            scale_factor: new_width as f32 / width as f32,
            processing_time_ms: processing_time.as_millis() as u32,
        })
    }
}

impl Default for ImageScaler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn create_test_image(width: u32, height: u32) -> DynamicImage {
        let img = RgbImage::new(width, height);
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_new_scaler() {
        let scaler = ImageScaler::new();
        assert_eq!(scaler.min_width(), 800);
    }

    #[test]
    fn test_with_invalid_min_width() {
        assert!(matches!(
            ImageScaler::with_min_width(0),
            Err(PreprocessingError::InvalidParameter { name: "min_width", .. })
        ));
        assert!(ImageScaler::with_min_width(20_000).is_err());
        assert_eq!(ImageScaler::with_min_width(640).unwrap().min_width(), 640);
    }

    #[test]
    fn test_narrow_image_is_upscaled_preserving_aspect() {
        let scaler = ImageScaler::new();
        let result = scaler.scale(&create_test_image(200, 100)).unwrap();

        assert_eq!(result.original_dimensions, (200, 100));
        assert_eq!(result.new_dimensions, (800, 400));
        assert_eq!(result.image.dimensions(), (800, 400));
        assert_eq!(result.scale_factor, 4.0);
    }

    #[test]
    fn test_wide_image_is_untouched() {
        let scaler = ImageScaler::new();
        let result = scaler.scale(&create_test_image(1024, 50)).unwrap();

        assert_eq!(result.new_dimensions, (1024, 50));
        assert_eq!(result.scale_factor, 1.0);
    }

    #[test]
    fn test_height_is_truncated_not_rounded() {
        let scaler = ImageScaler::new();
        // 333 * 800 / 600 = 444.0, 7 * 800 / 300 = 18.66
        assert_eq!(scaler.target_dimensions(600, 333), (800, 444));
        assert_eq!(scaler.target_dimensions(300, 7), (800, 18));
    }

    #[test]
    fn test_single_pixel_image() {
        let scaler = ImageScaler::new();
        let result = scaler.scale(&create_test_image(1, 1)).unwrap();
        assert_eq!(result.new_dimensions, (800, 800));
    }

    #[test]
    fn test_very_flat_image_keeps_one_row() {
        let scaler = ImageScaler::new();
        assert_eq!(scaler.target_dimensions(799, 0), (800, 1));
    }
}
