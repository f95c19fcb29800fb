//! # Shared Types for Image Preprocessing
//!
//! This module contains all the shared types, structs, and enums used across
//! the preprocessing sub-modules.

use image::{DynamicImage, GrayImage};

/// Errors that can occur during image preprocessing operations.
#[derive(Debug, Clone, PartialEq)]
pub enum PreprocessingError {
    /// Failed to load or decode image
    ImageLoad { message: String },
    /// The bitmap has a zero width or height
    EmptyImage,
    /// A tunable was outside its accepted range
    InvalidParameter { name: &'static str, value: f64 },
    /// Image processing operation failed
    ProcessingFailed { message: String },
}

impl std::fmt::Display for PreprocessingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PreprocessingError::ImageLoad { message } => {
                write!(f, "Failed to load image: {}", message)
            }
            PreprocessingError::EmptyImage => {
                write!(f, "Image has no pixels (zero width or height)")
            }
            PreprocessingError::InvalidParameter { name, value } => {
                write!(f, "Invalid value for {}: {}", name, value)
            }
            PreprocessingError::ProcessingFailed { message } => {
                write!(f, "Image processing failed: {}", message)
            }
        }
    }
}

impl std::error::Error for PreprocessingError {}

impl From<image::ImageError> for PreprocessingError {
    fn from(err: image::ImageError) -> Self {
        PreprocessingError::ImageLoad {
            message: err.to_string(),
        }
    }
}

/// A single-channel bitmap that has been through the full conditioning pipeline.
///
/// Only [`crate::preprocessing::condition_image`] builds one, so holding a
/// `ConditionedImage` means the grayscale and minimum-width guarantees hold.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionedImage {
    pixels: GrayImage,
}

impl ConditionedImage {
    pub(crate) fn new(pixels: GrayImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Always 1: conditioned images are grayscale.
    pub fn channel_count(&self) -> u8 {
        1
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.pixels
    }

    /// Wrap the pixels back into a `DynamicImage`, e.g. to condition again or to save.
    pub fn to_dynamic(&self) -> DynamicImage {
        DynamicImage::ImageLuma8(self.pixels.clone())
    }
}

/// Result of the minimum-width scaling operation.
#[derive(Debug, Clone)]
pub struct ScaledImageResult {
    /// The scaled image
    pub image: DynamicImage,
    /// Original image dimensions (width, height)
    pub original_dimensions: (u32, u32),
    /// New image dimensions (width, height)
    pub new_dimensions: (u32, u32),
    /// Scale factor applied (1.0 when the image was already wide enough)
    pub scale_factor: f32,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// Result of image noise reduction operation.
#[derive(Debug, Clone)]
pub struct DenoisedImageResult {
    /// The denoised image
    pub image: GrayImage,
    /// Sigma value used for Gaussian blur
    pub sigma: f32,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// Which photometric property an enhancement adjusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnhancementKind {
    /// Spread around the mean intensity
    Contrast,
    /// Scale towards or away from black
    Brightness,
    /// Spread around a smoothed copy
    Sharpness,
}

/// Result of a contrast, brightness or sharpness enhancement.
#[derive(Debug, Clone)]
pub struct EnhancedImageResult {
    /// The enhanced image
    pub image: GrayImage,
    /// Property that was adjusted
    pub kind: EnhancementKind,
    /// Enhancement factor, 1.0 being neutral
    pub factor: f32,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// Result of morphological operations on grayscale images.
#[derive(Debug, Clone)]
pub struct MorphologicalImageResult {
    /// The morphologically processed image
    pub image: GrayImage,
    /// Type of morphological operation applied
    pub operation: MorphologicalOperation,
    /// Side of the square structuring element (e.g., 2 for 2x2)
    pub kernel_size: u32,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// Types of morphological operations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MorphologicalOperation {
    /// Erosion operation (shrinks bright regions)
    Erosion,
    /// Dilation operation (expands bright regions)
    Dilation,
    /// Opening operation (erosion followed by dilation - removes noise)
    Opening,
    /// Closing operation (dilation followed by erosion - fills gaps)
    Closing,
}

/// Result of CLAHE contrast enhancement operation.
#[derive(Debug, Clone)]
pub struct ClaheImageResult {
    /// The contrast-enhanced image
    pub image: GrayImage,
    /// Clip limit used for histogram clipping
    pub clip_limit: f32,
    /// Requested tile grid (columns, rows)
    pub tile_grid: (u32, u32),
    /// Tile grid actually used after clamping to the image size
    pub effective_grid: (u32, u32),
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}
