//! # Photometric Enhancement Module
//!
//! Contrast, brightness and sharpness adjustments for grayscale images.
//!
//! All three share one model: build a "degenerate" reference image, then move
//! every pixel away from (factor > 1) or towards (factor < 1) that reference.
//! A factor of 1.0 returns the input unchanged.
//!
//! | Adjustment | Reference image                                   |
//! |------------|---------------------------------------------------|
//! | Contrast   | flat image at the rounded mean intensity          |
//! | Brightness | black                                             |
//! | Sharpness  | 3x3 smoothed copy (kernel `1 1 1 / 1 5 1 / 1 1 1`, /13) |

use image::{DynamicImage, GrayImage, Luma};

use super::types::{EnhancedImageResult, EnhancementKind, PreprocessingError};

/// Largest accepted enhancement factor.
const MAX_FACTOR: f32 = 10.0;

/// Drops the alpha channel of an image, keeping its colour values.
///
/// Images without alpha are returned as-is.
pub fn flatten_alpha(image: &DynamicImage) -> DynamicImage {
    if image.color().has_alpha() {
        DynamicImage::ImageRgb8(image.to_rgb8())
    } else {
        image.clone()
    }
}

/// Stretches intensities around the image mean.
///
/// # Examples
///
/// ```
/// use careguide_scan::preprocessing::enhance_contrast;
/// use image::{GrayImage, Luma};
///
/// let mut img = GrayImage::from_pixel(2, 1, Luma([100]));
/// img.put_pixel(1, 0, Luma([140]));
/// let result = enhance_contrast(&img, 2.0).unwrap();
/// assert_eq!(result.image.get_pixel(0, 0)[0], 80);
/// assert_eq!(result.image.get_pixel(1, 0)[0], 160);
/// ```
pub fn enhance_contrast(
    image: &GrayImage,
    factor: f32,
) -> Result<EnhancedImageResult, PreprocessingError> {
    let start_time = std::time::Instant::now();
    validate_factor("contrast_factor", factor)?;
    let pixel_count = checked_pixel_count(image)?;

    let sum: u64 = image.pixels().map(|p| u64::from(p[0])).sum();
    let mean = (sum as f64 / pixel_count as f64 + 0.5).floor() as f32;

    let output = map_pixels(image, |value| blend(mean, value, factor));

    Ok(finish(output, EnhancementKind::Contrast, factor, start_time))
}

/// Scales every intensity by `factor`.
pub fn enhance_brightness(
    image: &GrayImage,
    factor: f32,
) -> Result<EnhancedImageResult, PreprocessingError> {
    let start_time = std::time::Instant::now();
    validate_factor("brightness_factor", factor)?;
    checked_pixel_count(image)?;

    let output = map_pixels(image, |value| blend(0.0, value, factor));

    Ok(finish(output, EnhancementKind::Brightness, factor, start_time))
}

/// Emphasizes edges by moving pixels away from a smoothed copy.
///
/// Border pixels have no full 3x3 neighbourhood and keep their original value
/// in the smoothed reference, so they are never altered.
pub fn enhance_sharpness(
    image: &GrayImage,
    factor: f32,
) -> Result<EnhancedImageResult, PreprocessingError> {
    let start_time = std::time::Instant::now();
    validate_factor("sharpness_factor", factor)?;
    checked_pixel_count(image)?;

    let smoothed = smooth(image);
    let mut output = GrayImage::new(image.width(), image.height());
    for (x, y, pixel) in image.enumerate_pixels() {
        let reference = f32::from(smoothed.get_pixel(x, y)[0]);
        output.put_pixel(x, y, Luma([blend(reference, pixel[0], factor)]));
    }

    Ok(finish(output, EnhancementKind::Sharpness, factor, start_time))
}

/// 3x3 smoothing with a centre weight of 5; borders are copied.
fn smooth(image: &GrayImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut result = image.clone();
    if width < 3 || height < 3 {
        return result;
    }

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let mut total = 0u32;
            for ky in 0..3 {
                for kx in 0..3 {
                    total += u32::from(image.get_pixel(x + kx - 1, y + ky - 1)[0]);
                }
            }
            // Centre counts 5 times: once in the 3x3 sum, 4 more here.
            total += 4 * u32::from(image.get_pixel(x, y)[0]);
            let value = (total as f32 / 13.0).round() as u8;
            result.put_pixel(x, y, Luma([value]));
        }
    }

    result
}

fn blend(reference: f32, value: u8, factor: f32) -> u8 {
    (reference + factor * (f32::from(value) - reference))
        .round()
        .clamp(0.0, 255.0) as u8
}

fn map_pixels(image: &GrayImage, f: impl Fn(u8) -> u8) -> GrayImage {
    let mut output = image.clone();
    for pixel in output.pixels_mut() {
        pixel[0] = f(pixel[0]);
    }
    output
}

fn validate_factor(name: &'static str, factor: f32) -> Result<(), PreprocessingError> {
    if !factor.is_finite() || !(0.0..=MAX_FACTOR).contains(&factor) {
        return Err(PreprocessingError::InvalidParameter {
            name,
            value: f64::from(factor),
        });
    }
    Ok(())
}

fn checked_pixel_count(image: &GrayImage) -> Result<u64, PreprocessingError> {
    let count = u64::from(image.width()) * u64::from(image.height());
    if count == 0 {
        return Err(PreprocessingError::EmptyImage);
    }
    Ok(count)
}

fn finish(
    image: GrayImage,
    kind: EnhancementKind,
    factor: f32,
    start_time: std::time::Instant,
) -> EnhancedImageResult {
    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "ocr_preprocessing",
        "{:?} enhancement completed in {}ms: factor={:.2}",
        kind,
        processing_time.as_millis(),
        factor
    );

    EnhancedImageResult {
        image,
        kind,
        factor,
        processing_time_ms: processing_time.as_millis() as u32,
    }
}
