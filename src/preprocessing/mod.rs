//! # Image Preprocessing Module
//!
//! This module conditions prescription photographs for OCR. [`condition_image`] runs a fixed
//! nine-step pipeline that turns any decodable bitmap into a single-channel image at least
//! 800 pixels wide with boosted contrast and sharpened, gap-free strokes.
//!
//! The module is organized into focused sub-modules:
//! - `scaling`: Minimum-width upscaling with Lanczos resampling
//! - `enhancement`: Alpha flattening and contrast, brightness and sharpness adjustments
//! - `filtering`: Gaussian noise reduction, CLAHE and morphological operations
//! - `types`: Shared types and error definitions

pub mod enhancement;
pub mod filtering;
pub mod scaling;
pub mod types;

use std::path::Path;

use image::DynamicImage;

use crate::errors::{AppError, AppResult};

// Re-export commonly used types and functions for convenience
pub use types::{
    ClaheImageResult, ConditionedImage, DenoisedImageResult, EnhancedImageResult,
    EnhancementKind, MorphologicalImageResult, MorphologicalOperation, PreprocessingError,
    ScaledImageResult,
};

// Re-export main functions from sub-modules
pub use enhancement::{enhance_brightness, enhance_contrast, enhance_sharpness, flatten_alpha};
pub use filtering::{apply_clahe, apply_morphological_operation, reduce_noise};
pub use scaling::ImageScaler;

/// Tunables of the conditioning pipeline.
///
/// The defaults are the values the pipeline was calibrated with; change them only
/// for experiments.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditioningConfig {
    /// Images narrower than this are upscaled to it
    pub min_width: u32,
    /// Gaussian blur standard deviation
    pub blur_sigma: f32,
    /// Contrast enhancement factor
    pub contrast_factor: f32,
    /// Brightness enhancement factor
    pub brightness_factor: f32,
    /// Sharpness enhancement factor
    pub sharpness_factor: f32,
    /// CLAHE histogram clip factor
    pub clahe_clip_limit: f32,
    /// CLAHE tile grid (columns, rows)
    pub clahe_tile_grid: (u32, u32),
    /// Side of the square closing element
    pub closing_kernel_size: u32,
}

impl Default for ConditioningConfig {
    fn default() -> Self {
        Self {
            min_width: ImageScaler::DEFAULT_MIN_WIDTH,
            blur_sigma: 1.0,
            contrast_factor: 2.0,
            brightness_factor: 1.1,
            sharpness_factor: 2.5,
            clahe_clip_limit: 2.0,
            clahe_tile_grid: (8, 8),
            closing_kernel_size: 2,
        }
    }
}

impl ConditioningConfig {
    /// Validate every tunable up front, so a bad value fails before any pixel work.
    pub fn validate(&self) -> AppResult<()> {
        let checks: [(&str, bool); 8] = [
            ("min_width", (1..=10_000).contains(&self.min_width)),
            (
                "blur_sigma",
                self.blur_sigma.is_finite() && self.blur_sigma > 0.0 && self.blur_sigma <= 5.0,
            ),
            ("contrast_factor", valid_factor(self.contrast_factor)),
            ("brightness_factor", valid_factor(self.brightness_factor)),
            ("sharpness_factor", valid_factor(self.sharpness_factor)),
            (
                "clahe_clip_limit",
                self.clahe_clip_limit.is_finite() && self.clahe_clip_limit > 0.0,
            ),
            (
                "clahe_tile_grid",
                self.clahe_tile_grid.0 > 0 && self.clahe_tile_grid.1 > 0,
            ),
            (
                "closing_kernel_size",
                (1..=15).contains(&self.closing_kernel_size),
            ),
        ];

        match checks.iter().find(|(_, ok)| !ok) {
            Some((name, _)) => Err(AppError::Validation(format!(
                "Conditioning parameter {} is out of range",
                name
            ))),
            None => Ok(()),
        }
    }
}

fn valid_factor(factor: f32) -> bool {
    factor.is_finite() && (0.0..=10.0).contains(&factor)
}

/// Runs the full conditioning pipeline on a decoded image.
///
/// Steps, in order:
/// 1. drop the alpha channel
/// 2. upscale to `min_width` if narrower (Lanczos, aspect ratio kept, height truncated)
/// 3. convert to 8-bit grayscale
/// 4. Gaussian blur
/// 5. contrast, 6. brightness, 7. sharpness enhancement
/// 8. CLAHE
/// 9. morphological closing
///
/// The input is never modified.
///
/// # Examples
///
/// ```
/// use careguide_scan::preprocessing::{condition_image, ConditioningConfig};
/// use image::{DynamicImage, RgbaImage};
///
/// let photo = DynamicImage::ImageRgba8(RgbaImage::new(400, 300));
/// let conditioned = condition_image(&photo, &ConditioningConfig::default()).unwrap();
/// assert_eq!((conditioned.width(), conditioned.height()), (800, 600));
/// assert_eq!(conditioned.channel_count(), 1);
/// ```
///
/// # Errors
///
/// Returns `PreprocessingError::EmptyImage` for zero-sized bitmaps and
/// `PreprocessingError::InvalidParameter` when a tunable is out of range.
pub fn condition_image(
    image: &DynamicImage,
    config: &ConditioningConfig,
) -> Result<ConditionedImage, PreprocessingError> {
    let start_time = std::time::Instant::now();

    let flattened = flatten_alpha(image);
    let scaler = ImageScaler::with_min_width(config.min_width)?;
    let scaled = scaler.scale(&flattened)?;
    let gray = scaled.image.to_luma8();

    let denoised = reduce_noise(&gray, config.blur_sigma)?;
    let contrasted = enhance_contrast(&denoised.image, config.contrast_factor)?;
    let brightened = enhance_brightness(&contrasted.image, config.brightness_factor)?;
    let sharpened = enhance_sharpness(&brightened.image, config.sharpness_factor)?;
    let equalized = apply_clahe(
        &sharpened.image,
        config.clahe_clip_limit,
        config.clahe_tile_grid,
    )?;
    let closed = apply_morphological_operation(
        &equalized.image,
        MorphologicalOperation::Closing,
        config.closing_kernel_size,
    )?;

    let duration = start_time.elapsed();
    crate::observability::record_conditioning_metrics(duration);

    tracing::debug!(
        target: "ocr_preprocessing",
        original_width = scaled.original_dimensions.0,
        original_height = scaled.original_dimensions.1,
        width = closed.image.width(),
        height = closed.image.height(),
        duration_ms = duration.as_millis() as u64,
        "Image conditioning completed"
    );

    Ok(ConditionedImage::new(closed.image))
}

/// Decodes an in-memory encoded image (PNG, JPEG, ...) and conditions it.
pub fn condition_bytes(
    bytes: &[u8],
    config: &ConditioningConfig,
) -> Result<ConditionedImage, PreprocessingError> {
    let decoded = image::load_from_memory(bytes)?;
    condition_image(&decoded, config)
}

/// Opens and decodes an image file, guessing the format from its content.
pub fn load_image(path: &Path) -> Result<DynamicImage, PreprocessingError> {
    let reader = image::ImageReader::open(path)
        .map_err(|e| PreprocessingError::ImageLoad {
            message: format!("{}: {}", path.display(), e),
        })?
        .with_guessed_format()
        .map_err(|e| PreprocessingError::ImageLoad {
            message: format!("{}: {}", path.display(), e),
        })?;

    Ok(reader.decode()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgba, RgbaImage};

    #[test]
    fn test_default_config_is_valid() {
        let config = ConditioningConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_width, 800);
        assert_eq!(config.clahe_tile_grid, (8, 8));
        assert_eq!(config.closing_kernel_size, 2);
    }

    #[test]
    fn test_config_validation_names_bad_field() {
        let config = ConditioningConfig {
            sharpness_factor: -1.0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sharpness_factor"));
    }

    #[test]
    fn test_condition_upscales_and_grays() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(400, 300, Rgba([200, 10, 10, 128])));
        let out = condition_image(&img, &ConditioningConfig::default()).unwrap();

        assert_eq!(out.width(), 800);
        assert_eq!(out.height(), 600);
        assert_eq!(out.channel_count(), 1);
    }

    #[test]
    fn test_condition_keeps_wide_image_size() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(1200, 900, Luma([255])));
        let out = condition_image(&img, &ConditioningConfig::default()).unwrap();
        assert_eq!((out.width(), out.height()), (1200, 900));
    }

    #[test]
    fn test_condition_single_pixel() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(1, 1, Luma([0])));
        let out = condition_image(&img, &ConditioningConfig::default()).unwrap();
        assert_eq!((out.width(), out.height()), (800, 800));
    }

    #[test]
    fn test_condition_rejects_empty() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(0, 0));
        let err = condition_image(&img, &ConditioningConfig::default()).unwrap_err();
        assert_eq!(err, PreprocessingError::EmptyImage);
    }

    #[test]
    fn test_condition_does_not_modify_input() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_fn(50, 20, |x, _| Luma([(x * 5) as u8])));
        let copy = img.clone();
        let _ = condition_image(&img, &ConditioningConfig::default()).unwrap();
        assert_eq!(img, copy);
    }

    #[test]
    fn test_condition_bytes_rejects_garbage() {
        let err = condition_bytes(b"definitely not an image", &ConditioningConfig::default())
            .unwrap_err();
        assert!(matches!(err, PreprocessingError::ImageLoad { .. }));
    }

    #[test]
    fn test_load_image_missing_file() {
        let err = load_image(Path::new("/nonexistent/prescription.png")).unwrap_err();
        assert!(matches!(err, PreprocessingError::ImageLoad { .. }));
    }
}
