use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView};

/// Above this many pixels the target edge is capped at [`LARGE_IMAGE_EDGE`].
const LARGE_IMAGE_PIXELS: u64 = 20_000_000;
const LARGE_IMAGE_EDGE: u32 = 800;

/// JPEG payload ready to be sent to an analysis service.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub jpeg: Vec<u8>,
    pub base64: String,
    pub width: u32,
    pub height: u32,
}

/// Down-scales to fit `max_resolution`, converts to RGB and JPEG-encodes.
pub fn prepare_for_analysis(
    image: &DynamicImage,
    max_resolution: u32,
    quality: u8,
) -> Result<PreparedImage, image::ImageError> {
    let (width, height) = image.dimensions();
    let limit = if u64::from(width) * u64::from(height) > LARGE_IMAGE_PIXELS {
        max_resolution.min(LARGE_IMAGE_EDGE)
    } else {
        max_resolution
    };

    let rgb = if width > limit || height > limit {
        image.thumbnail(limit, limit).to_rgb8()
    } else {
        image.to_rgb8()
    };

    let mut jpeg = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100)))?;

    let base64 = base64::engine::general_purpose::STANDARD.encode(&jpeg);
    Ok(PreparedImage {
        width: rgb.width(),
        height: rgb.height(),
        jpeg,
        base64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    #[test]
    fn test_downscales_to_max_resolution() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(400, 200, Rgba([10, 20, 30, 255])));

        let prepared = prepare_for_analysis(&image, 100, 85).unwrap();
        assert_eq!((prepared.width, prepared.height), (100, 50));
        assert_eq!(image::guess_format(&prepared.jpeg).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_small_image_keeps_size() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(64, 48, Rgba([0, 0, 0, 255])));

        let prepared = prepare_for_analysis(&image, 1024, 85).unwrap();
        assert_eq!((prepared.width, prepared.height), (64, 48));
    }

    #[test]
    fn test_base64_matches_payload() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([255, 0, 0, 255])));
        let prepared = prepare_for_analysis(&image, 1024, 85).unwrap();

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(&prepared.base64)
            .unwrap();
        assert_eq!(decoded, prepared.jpeg);
    }
}
