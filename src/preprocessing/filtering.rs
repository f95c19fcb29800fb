//! # Image Filtering Module
//!
//! This module provides noise reduction, local contrast equalization and morphological
//! operations for OCR preprocessing. All functions work on grayscale images.

use image::{GrayImage, Luma};

use super::types::{
    ClaheImageResult, DenoisedImageResult, MorphologicalImageResult, MorphologicalOperation,
    PreprocessingError,
};

/// Number of intensity levels in an 8-bit image.
const LEVELS: usize = 256;

/// Applies Gaussian blur to reduce image noise while preserving text edges.
///
/// The blur runs before any sharpening so that sensor noise is not amplified
/// by the later enhancement steps.
///
/// # Arguments
///
/// * `image` - The grayscale image to denoise
/// * `sigma` - Standard deviation for Gaussian kernel (accepted: 0 < sigma <= 5.0)
///
/// # Examples
///
/// ```
/// use careguide_scan::preprocessing::reduce_noise;
/// use image::GrayImage;
///
/// let img = GrayImage::new(32, 32);
/// let denoised = reduce_noise(&img, 1.0).unwrap();
/// assert_eq!(denoised.image.dimensions(), (32, 32));
/// ```
pub fn reduce_noise(
    image: &GrayImage,
    sigma: f32,
) -> Result<DenoisedImageResult, PreprocessingError> {
    let start_time = std::time::Instant::now();

    // Validate sigma parameter
    if !sigma.is_finite() || sigma <= 0.0 || sigma > 5.0 {
        return Err(PreprocessingError::InvalidParameter {
            name: "blur_sigma",
            value: f64::from(sigma),
        });
    }

    let blurred = image::imageops::blur(image, sigma);

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "ocr_preprocessing",
        "Noise reduction completed in {}ms: sigma={:.2}, dimensions={}x{}",
        processing_time.as_millis(),
        sigma,
        blurred.width(),
        blurred.height()
    );

    Ok(DenoisedImageResult {
        image: blurred,
        sigma,
        processing_time_ms: processing_time.as_millis() as u32,
    })
}

/// Applies a morphological operation with a square structuring element.
///
/// The element is `kernel_size` x `kernel_size` and anchored at
/// `kernel_size / 2`, so a 2x2 element covers the pixel and its upper-left
/// neighbours. Erosion uses the reflected element, which makes closing
/// extensive (never darkens a pixel) and opening anti-extensive.
/// Pixels outside the image replicate the nearest edge.
///
/// # Examples
///
/// ```
/// use careguide_scan::preprocessing::{apply_morphological_operation, MorphologicalOperation};
/// use image::{GrayImage, Luma};
///
/// // A one-pixel dark gap in a bright stroke gets filled by closing.
/// let mut img = GrayImage::from_pixel(5, 1, Luma([255]));
/// img.put_pixel(2, 0, Luma([0]));
/// let closed = apply_morphological_operation(&img, MorphologicalOperation::Closing, 2).unwrap();
/// assert_eq!(closed.image.get_pixel(2, 0)[0], 255);
/// ```
pub fn apply_morphological_operation(
    image: &GrayImage,
    operation: MorphologicalOperation,
    kernel_size: u32,
) -> Result<MorphologicalImageResult, PreprocessingError> {
    let start_time = std::time::Instant::now();

    if !(1..=15).contains(&kernel_size) {
        return Err(PreprocessingError::InvalidParameter {
            name: "kernel_size",
            value: f64::from(kernel_size),
        });
    }

    let processed = match operation {
        MorphologicalOperation::Erosion => apply_erosion(image, kernel_size),
        MorphologicalOperation::Dilation => apply_dilation(image, kernel_size),
        MorphologicalOperation::Opening => {
            let eroded = apply_erosion(image, kernel_size);
            apply_dilation(&eroded, kernel_size)
        }
        MorphologicalOperation::Closing => {
            let dilated = apply_dilation(image, kernel_size);
            apply_erosion(&dilated, kernel_size)
        }
    };

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "ocr_preprocessing",
        "Morphological operation completed in {}ms: operation={:?}, kernel={}x{}, dimensions={}x{}",
        processing_time.as_millis(),
        operation,
        kernel_size,
        kernel_size,
        processed.width(),
        processed.height()
    );

    Ok(MorphologicalImageResult {
        image: processed,
        operation,
        kernel_size,
        processing_time_ms: processing_time.as_millis() as u32,
    })
}

/// Maximum over the element anchored at `kernel_size / 2`.
fn apply_dilation(image: &GrayImage, kernel_size: u32) -> GrayImage {
    let anchor = i64::from(kernel_size / 2);
    neighbourhood_reduce(image, kernel_size, -anchor, 0u8, u8::max)
}

/// Minimum over the reflected element.
fn apply_erosion(image: &GrayImage, kernel_size: u32) -> GrayImage {
    let anchor = i64::from(kernel_size / 2);
    let reflected_origin = anchor - i64::from(kernel_size) + 1;
    neighbourhood_reduce(image, kernel_size, reflected_origin, 255u8, u8::min)
}

/// Folds every `kernel_size` x `kernel_size` window starting at offset `origin`
/// from each pixel, clamping coordinates to the image.
fn neighbourhood_reduce(
    image: &GrayImage,
    kernel_size: u32,
    origin: i64,
    init: u8,
    fold: fn(u8, u8) -> u8,
) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut result = GrayImage::new(width, height);
    if width == 0 || height == 0 {
        return result;
    }

    let max_x = i64::from(width) - 1;
    let max_y = i64::from(height) - 1;
    let size = i64::from(kernel_size);

    for y in 0..height {
        for x in 0..width {
            let mut acc = init;
            for ky in 0..size {
                let ny = (i64::from(y) + origin + ky).clamp(0, max_y) as u32;
                for kx in 0..size {
                    let nx = (i64::from(x) + origin + kx).clamp(0, max_x) as u32;
                    acc = fold(acc, image.get_pixel(nx, ny)[0]);
                }
            }
            result.put_pixel(x, y, Luma([acc]));
        }
    }

    result
}

/// Applies Contrast Limited Adaptive Histogram Equalization (CLAHE) to enhance local contrast.
///
/// The image is split into a grid of `tile_grid.0` x `tile_grid.1` tiles. Each tile gets
/// its own equalization lookup table, built from a histogram whose bins are clipped at
/// `clip_limit` times the uniform bin height; the clipped excess is spread evenly over all
/// bins. Output pixels blend the tables of the four nearest tile centres bilinearly,
/// which avoids visible seams between tiles.
///
/// The grid is shrunk for images smaller than it, so tiny bitmaps are accepted.
///
/// # Arguments
///
/// * `image` - The grayscale image to enhance
/// * `clip_limit` - Histogram clip factor (recommended: 2.0-4.0)
/// * `tile_grid` - Number of tiles horizontally and vertically (recommended: (8, 8))
pub fn apply_clahe(
    image: &GrayImage,
    clip_limit: f32,
    tile_grid: (u32, u32),
) -> Result<ClaheImageResult, PreprocessingError> {
    let start_time = std::time::Instant::now();

    // Validate parameters
    if !clip_limit.is_finite() || clip_limit <= 0.0 {
        return Err(PreprocessingError::InvalidParameter {
            name: "clahe_clip_limit",
            value: f64::from(clip_limit),
        });
    }

    if tile_grid.0 == 0 || tile_grid.1 == 0 {
        return Err(PreprocessingError::InvalidParameter {
            name: "clahe_tile_grid",
            value: f64::from(tile_grid.0.min(tile_grid.1)),
        });
    }

    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(PreprocessingError::EmptyImage);
    }

    let tile_width = width.div_ceil(tile_grid.0.min(width));
    let tile_height = height.div_ceil(tile_grid.1.min(height));
    // Rounding the tile size up can leave trailing grid cells empty; drop them.
    let tiles_x = width.div_ceil(tile_width);
    let tiles_y = height.div_ceil(tile_height);

    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for tile_y in 0..tiles_y {
        for tile_x in 0..tiles_x {
            let start_x = tile_x * tile_width;
            let start_y = tile_y * tile_height;
            let end_x = (start_x + tile_width).min(width);
            let end_y = (start_y + tile_height).min(height);
            luts.push(build_tile_lut(
                image, start_x, start_y, end_x, end_y, clip_limit,
            ));
        }
    }

    let lut_at = |tx: u32, ty: u32| &luts[(ty * tiles_x + tx) as usize];

    let mut output = GrayImage::new(width, height);
    for y in 0..height {
        let (ty0, ty1, wy) = interpolation_cell(y, tile_height, tiles_y);
        for x in 0..width {
            let (tx0, tx1, wx) = interpolation_cell(x, tile_width, tiles_x);
            let value = image.get_pixel(x, y)[0] as usize;

            let top = f32::from(lut_at(tx0, ty0)[value]) * (1.0 - wx)
                + f32::from(lut_at(tx1, ty0)[value]) * wx;
            let bottom = f32::from(lut_at(tx0, ty1)[value]) * (1.0 - wx)
                + f32::from(lut_at(tx1, ty1)[value]) * wx;
            let blended = top * (1.0 - wy) + bottom * wy;

            output.put_pixel(x, y, Luma([blended.round().clamp(0.0, 255.0) as u8]));
        }
    }

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "ocr_preprocessing",
        "CLAHE applied in {}ms: clip_limit={}, tile_grid={:?}, effective_grid={}x{}",
        processing_time.as_millis(),
        clip_limit,
        tile_grid,
        tiles_x,
        tiles_y
    );

    Ok(ClaheImageResult {
        image: output,
        clip_limit,
        tile_grid,
        effective_grid: (tiles_x, tiles_y),
        processing_time_ms: processing_time.as_millis() as u32,
    })
}

/// Finds the two tile centres surrounding `coord` along one axis and the weight of the second.
fn interpolation_cell(coord: u32, tile_size: u32, tiles: u32) -> (u32, u32, f32) {
    let position = (coord as f32 + 0.5) / tile_size as f32 - 0.5;
    let first = (position.floor().max(0.0) as u32).min(tiles - 1);
    let second = (first + 1).min(tiles - 1);
    let weight = (position - first as f32).clamp(0.0, 1.0);
    (first, second, weight)
}

/// Builds the clipped-histogram equalization table of one tile.
fn build_tile_lut(
    image: &GrayImage,
    start_x: u32,
    start_y: u32,
    end_x: u32,
    end_y: u32,
    clip_limit: f32,
) -> [u8; LEVELS] {
    let mut histogram = [0u32; LEVELS];
    for y in start_y..end_y {
        for x in start_x..end_x {
            histogram[image.get_pixel(x, y)[0] as usize] += 1;
        }
    }

    let total_pixels = (end_x - start_x) * (end_y - start_y);
    let clip = ((clip_limit * total_pixels as f32 / LEVELS as f32) as u32).max(1);
    clip_histogram(&mut histogram, clip);

    let scale = 255.0 / total_pixels as f32;
    let mut lut = [0u8; LEVELS];
    let mut cumulative = 0u32;
    for (level, count) in histogram.iter().enumerate() {
        cumulative += count;
        lut[level] = (cumulative as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Clips every bin at `clip` and redistributes the excess so the total is unchanged.
fn clip_histogram(histogram: &mut [u32; LEVELS], clip: u32) {
    let mut excess = 0u32;
    for count in histogram.iter_mut() {
        if *count > clip {
            excess += *count - clip;
            *count = clip;
        }
    }

    let uniform_increment = excess / LEVELS as u32;
    let residual = excess % LEVELS as u32;

    for count in histogram.iter_mut() {
        *count += uniform_increment;
    }

    if residual > 0 {
        let step = (LEVELS as u32 / residual).max(1) as usize;
        for count in histogram.iter_mut().step_by(step).take(residual as usize) {
            *count += 1;
        }
    }
}
