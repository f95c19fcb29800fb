//! # Image Conditioning Tests
//!
//! Properties of the conditioning pipeline on synthetic prescription-like images.

#[cfg(test)]
mod tests {
    use careguide_scan::preprocessing::{
        apply_clahe, apply_morphological_operation, condition_bytes, condition_image,
        ConditioningConfig, MorphologicalOperation, PreprocessingError,
    };
    use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgba, RgbaImage};
    use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
    use imageproc::rect::Rect;
    use std::io::Cursor;

    /// White page with dark bars standing in for handwritten lines.
    fn synthetic_prescription(width: u32, height: u32) -> RgbaImage {
        let mut page = RgbaImage::from_pixel(width, height, Rgba([245, 242, 236, 255]));
        let line_height = (height / 10).max(1);
        for row in 1..5 {
            let y = (row * 2 * line_height) as i32;
            draw_filled_rect_mut(
                &mut page,
                Rect::at(width as i32 / 10, y).of_size((width * 6 / 10).max(1), line_height),
                Rgba([30, 30, 60, 255]),
            );
        }
        draw_hollow_rect_mut(
            &mut page,
            Rect::at(2, 2).of_size(width.saturating_sub(4).max(1), height.saturating_sub(4).max(1)),
            Rgba([90, 90, 90, 128]),
        );
        page
    }

    #[test]
    fn test_narrow_photo_is_upscaled_to_grayscale() {
        let photo = DynamicImage::ImageRgba8(synthetic_prescription(400, 300));
        let conditioned = condition_image(&photo, &ConditioningConfig::default()).unwrap();

        assert_eq!(conditioned.width(), 800);
        assert_eq!(conditioned.height(), 600);
        assert_eq!(conditioned.channel_count(), 1);
    }

    #[test]
    fn test_wide_photo_keeps_dimensions() {
        let photo = DynamicImage::ImageRgba8(synthetic_prescription(1200, 500));
        let conditioned = condition_image(&photo, &ConditioningConfig::default()).unwrap();

        assert_eq!((conditioned.width(), conditioned.height()), (1200, 500));
    }

    #[test]
    fn test_height_is_truncated_when_upscaling() {
        let photo = DynamicImage::ImageLuma8(GrayImage::from_pixel(300, 301, Luma([200])));
        let conditioned = condition_image(&photo, &ConditioningConfig::default()).unwrap();

        // 301 * 800 / 300 = 802.67
        assert_eq!((conditioned.width(), conditioned.height()), (800, 802));
    }

    #[test]
    fn test_single_pixel_image() {
        let dot = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(1, 1, image::Rgb([0, 0, 0])));
        let conditioned = condition_image(&dot, &ConditioningConfig::default()).unwrap();

        assert_eq!((conditioned.width(), conditioned.height()), (800, 800));
        assert_eq!(conditioned.channel_count(), 1);
    }

    #[test]
    fn test_conditioning_twice_keeps_guarantees() {
        let config = ConditioningConfig::default();
        let photo = DynamicImage::ImageRgba8(synthetic_prescription(640, 200));

        let once = condition_image(&photo, &config).unwrap();
        let twice = condition_image(&once.to_dynamic(), &config).unwrap();

        assert!(twice.width() >= 800);
        assert_eq!(twice.channel_count(), 1);
        assert_eq!((twice.width(), twice.height()), (once.width(), once.height()));
    }

    #[test]
    fn test_conditioning_is_deterministic() {
        let config = ConditioningConfig::default();
        let photo = DynamicImage::ImageRgba8(synthetic_prescription(500, 350));

        let first = condition_image(&photo, &config).unwrap();
        let second = condition_image(&photo, &config).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_image_is_rejected() {
        let empty = DynamicImage::new_luma8(0, 0);
        assert_eq!(
            condition_image(&empty, &ConditioningConfig::default()),
            Err(PreprocessingError::EmptyImage)
        );
    }

    #[test]
    fn test_invalid_tunable_is_rejected() {
        let config = ConditioningConfig {
            blur_sigma: -1.0,
            ..Default::default()
        };
        let photo = DynamicImage::ImageRgba8(synthetic_prescription(100, 100));

        assert!(matches!(
            condition_image(&photo, &config),
            Err(PreprocessingError::InvalidParameter { .. })
        ));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_condition_encoded_bytes() {
        let mut png = Vec::new();
        DynamicImage::ImageRgba8(synthetic_prescription(200, 120))
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();

        let conditioned = condition_bytes(&png, &ConditioningConfig::default()).unwrap();
        assert_eq!((conditioned.width(), conditioned.height()), (800, 480));

        assert!(matches!(
            condition_bytes(b"definitely not an image", &ConditioningConfig::default()),
            Err(PreprocessingError::ImageLoad { .. })
        ));
    }

    #[test]
    fn test_closing_never_darkens() {
        let gray = DynamicImage::ImageRgba8(synthetic_prescription(120, 80)).to_luma8();
        let closed =
            apply_morphological_operation(&gray, MorphologicalOperation::Closing, 2).unwrap();

        for (before, after) in gray.pixels().zip(closed.image.pixels()) {
            assert!(after[0] >= before[0]);
        }
    }

    #[test]
    fn test_clahe_preserves_dimensions() {
        let gray = DynamicImage::ImageRgba8(synthetic_prescription(257, 131)).to_luma8();
        let equalized = apply_clahe(&gray, 2.0, (8, 8)).unwrap();

        assert_eq!(equalized.image.dimensions(), gray.dimensions());
    }
}
