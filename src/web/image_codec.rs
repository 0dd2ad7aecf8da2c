use image::{
    DynamicImage, ImageError,
    error::{LimitError, LimitErrorKind},
    codecs::{
        jpeg::JpegEncoder,
        png::{CompressionType, FilterType as PngFilter, PngEncoder},
        webp::WebPEncoder,
    },
    imageops::FilterType,
};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::debug;

use super::{error::ApiError, models::TargetSize};

/// Encoder quality per output format.
///
/// `image` only exposes lossless PNG and WebP encoders, so the PNG and
/// WebP values are informational; JPEG is the only lossy output.
pub const JPEG_QUALITY: u8 = 60;
pub const PNG_QUALITY: u8 = 60;
pub const WEBP_QUALITY: u8 = 60;

/// Largest output the resizer will allocate. Anything bigger is a resize
/// error instead of an allocation that would abort the process.
pub const MAX_OUTPUT_DIMENSION: u32 = 16_383;
pub const MAX_OUTPUT_PIXELS: u64 = 64 * 1024 * 1024; // 64 megapixels

/// Output encoding, chosen from the source file's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageEncoding {
    Jpeg,
    Png,
    Webp,
    Unsupported,
}

impl ImageEncoding {
    pub fn from_extension(extension: &str) -> Self {
        match extension {
            "jpg" => ImageEncoding::Jpeg,
            "png" => ImageEncoding::Png,
            "webp" => ImageEncoding::Webp,
            _ => ImageEncoding::Unsupported,
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(ImageEncoding::Unsupported, Self::from_extension)
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ImageEncoding::Jpeg => "image/jpeg",
            ImageEncoding::Png => "image/png",
            ImageEncoding::Webp => "image/webp",
            ImageEncoding::Unsupported => "application/octet-stream",
        }
    }

    pub fn quality(self) -> Option<u8> {
        match self {
            ImageEncoding::Jpeg => Some(JPEG_QUALITY),
            ImageEncoding::Png => Some(PNG_QUALITY),
            ImageEncoding::Webp => Some(WEBP_QUALITY),
            ImageEncoding::Unsupported => None,
        }
    }
}

/// Decodes `source`, scales it to `size` and writes it to `destination` in
/// `encoding`. Runs on the blocking pool.
///
/// On failure the destination may be left partially written.
pub async fn resize_image_file(
    source: PathBuf,
    destination: PathBuf,
    size: TargetSize,
    encoding: ImageEncoding,
) -> Result<(), ApiError> {
    let file = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let result = tokio::task::spawn_blocking(move || {
        resize_and_encode(&source, &destination, size, encoding)
    })
    .await;

    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(ApiError::Resize {
            file,
            details: err.to_string(),
        }),
        Err(join_err) => Err(ApiError::Resize {
            file,
            details: format!("Resize task failed: {}", join_err),
        }),
    }
}

fn resize_and_encode(
    source: &Path,
    destination: &Path,
    size: TargetSize,
    encoding: ImageEncoding,
) -> Result<(), ImageError> {
    // Reject oversized output from the header alone, before any pixel
    // buffer is allocated.
    let (src_width, src_height) = image::image_dimensions(source)?;
    let plan = ResizePlan::new(src_width, src_height, size)?;

    let src_img = image::open(source)?;
    let resized = plan.apply(&src_img);

    debug!(
        "Resized {}: {}x{} -> {}x{}, encoding {:?} at quality {:?}",
        source.display(),
        src_width,
        src_height,
        resized.width(),
        resized.height(),
        encoding,
        encoding.quality()
    );

    let mut writer = BufWriter::new(File::create(destination)?);
    encode(&resized, encoding, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Sizes computed up front for a resize: the image is scaled to `scaled`,
/// then centre-cropped to `crop` when both axes were requested (cover fit).
/// A single axis keeps the aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ResizePlan {
    scaled: (u32, u32),
    crop: Option<(u32, u32)>,
}

impl ResizePlan {
    fn new(src_width: u32, src_height: u32, size: TargetSize) -> Result<Self, ImageError> {
        if src_width == 0 || src_height == 0 {
            return Err(too_large());
        }

        let plan = match size {
            TargetSize::Exact { width, height } => {
                // Smallest scale that covers both axes.
                let ratio = f64::max(
                    width as f64 / src_width as f64,
                    height as f64 / src_height as f64,
                );
                let scaled_width = to_dimension(src_width as f64 * ratio).max(width);
                let scaled_height = to_dimension(src_height as f64 * ratio).max(height);
                ResizePlan {
                    scaled: (scaled_width, scaled_height),
                    crop: Some((width, height)),
                }
            }
            TargetSize::Width(width) => ResizePlan {
                scaled: (width, proportional(src_height, width, src_width)),
                crop: None,
            },
            TargetSize::Height(height) => ResizePlan {
                scaled: (proportional(src_width, height, src_height), height),
                crop: None,
            },
        };

        let (width, height) = plan.scaled;
        if width > MAX_OUTPUT_DIMENSION
            || height > MAX_OUTPUT_DIMENSION
            || width as u64 * height as u64 > MAX_OUTPUT_PIXELS
        {
            return Err(too_large());
        }

        Ok(plan)
    }

    fn apply(self, img: &DynamicImage) -> DynamicImage {
        let (scaled_width, scaled_height) = self.scaled;
        let scaled = img.resize_exact(scaled_width, scaled_height, FilterType::Lanczos3);

        match self.crop {
            Some((width, height)) => scaled.crop_imm(
                (scaled_width - width) / 2,
                (scaled_height - height) / 2,
                width,
                height,
            ),
            None => scaled,
        }
    }
}

fn too_large() -> ImageError {
    ImageError::Limits(LimitError::from_kind(LimitErrorKind::DimensionError))
}

fn to_dimension(value: f64) -> u32 {
    value.round().clamp(1.0, u32::MAX as f64) as u32
}

// other * target / reference, rounded, never zero
fn proportional(other: u32, target: u32, reference: u32) -> u32 {
    if reference == 0 {
        return 1;
    }
    to_dimension(other as f64 * target as f64 / reference as f64)
}

fn encode<W: Write>(
    img: &DynamicImage,
    encoding: ImageEncoding,
    writer: &mut W,
) -> Result<(), ImageError> {
    match encoding {
        ImageEncoding::Jpeg => {
            // JPEG has no alpha channel.
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(writer, JPEG_QUALITY))
        }
        ImageEncoding::Png => img.write_with_encoder(PngEncoder::new_with_quality(
            writer,
            CompressionType::Default,
            PngFilter::Adaptive,
        )),
        ImageEncoding::Webp => {
            let flattened = if img.color().has_alpha() {
                DynamicImage::ImageRgba8(img.to_rgba8())
            } else {
                DynamicImage::ImageRgb8(img.to_rgb8())
            };
            flattened.write_with_encoder(WebPEncoder::new_lossless(writer))
        }
        ImageEncoding::Unsupported => Err(ImageError::Unsupported(
            image::error::UnsupportedError::from_format_and_kind(
                image::error::ImageFormatHint::Unknown,
                image::error::UnsupportedErrorKind::Format(image::error::ImageFormatHint::Unknown),
            ),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, ImageFormat, RgbImage, RgbaImage};
    use tokio_test::{assert_err, assert_ok};

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    #[test]
    fn test_encoding_from_extension() {
        assert_eq!(ImageEncoding::from_extension("jpg"), ImageEncoding::Jpeg);
        assert_eq!(ImageEncoding::from_extension("png"), ImageEncoding::Png);
        assert_eq!(ImageEncoding::from_extension("webp"), ImageEncoding::Webp);
        assert_eq!(ImageEncoding::from_extension("gif"), ImageEncoding::Unsupported);
        assert_eq!(ImageEncoding::from_extension("JPG"), ImageEncoding::Unsupported);
    }

    #[test]
    fn test_encoding_from_path() {
        assert_eq!(ImageEncoding::from_path("full/fjord.jpg"), ImageEncoding::Jpeg);
        assert_eq!(ImageEncoding::from_path("fjord.tar.webp"), ImageEncoding::Webp);
        assert_eq!(ImageEncoding::from_path("fjord"), ImageEncoding::Unsupported);
    }

    #[test]
    fn test_content_type_and_quality() {
        assert_eq!(ImageEncoding::Jpeg.content_type(), "image/jpeg");
        assert_eq!(ImageEncoding::Png.content_type(), "image/png");
        assert_eq!(ImageEncoding::Webp.content_type(), "image/webp");
        assert_eq!(ImageEncoding::Jpeg.quality(), Some(60));
        assert_eq!(ImageEncoding::Unsupported.quality(), None);
    }

    fn scale(img: &DynamicImage, size: TargetSize) -> DynamicImage {
        ResizePlan::new(img.width(), img.height(), size)
            .unwrap()
            .apply(img)
    }

    #[test]
    fn test_scale_exact_crops_to_requested_size() {
        let img = DynamicImage::ImageRgb8(gradient(400, 300));
        let out = scale(&img, TargetSize::Exact { width: 100, height: 300 });
        assert_eq!(out.dimensions(), (100, 300));

        let out = scale(&img, TargetSize::Exact { width: 100, height: 100 });
        assert_eq!(out.dimensions(), (100, 100));
    }

    #[test]
    fn test_scale_keeps_aspect_ratio() {
        let img = DynamicImage::ImageRgb8(gradient(400, 300));
        assert_eq!(scale(&img, TargetSize::Width(100)).dimensions(), (100, 75));
        assert_eq!(scale(&img, TargetSize::Height(150)).dimensions(), (200, 150));
    }

    #[test]
    fn test_resize_plan_cover_size() {
        let plan = ResizePlan::new(400, 300, TargetSize::Exact { width: 100, height: 100 }).unwrap();
        assert_eq!(plan.scaled, (133, 100));
        assert_eq!(plan.crop, Some((100, 100)));
    }

    #[test]
    fn test_resize_plan_rejects_oversized_output() {
        for size in [
            TargetSize::Exact { width: 200_000, height: 200_000 },
            TargetSize::Width(200_000),
            TargetSize::Height(MAX_OUTPUT_DIMENSION + 1),
            // Fits the dimension cap, but 16000x12000 is past the pixel cap.
            TargetSize::Width(16_000),
            // The crop is tiny; the scaled image before cropping is not.
            TargetSize::Exact { width: 16_000, height: 1 },
        ] {
            let err = ResizePlan::new(400, 300, size).unwrap_err();
            assert!(matches!(err, ImageError::Limits(_)), "{:?}", size);
        }
    }

    #[test]
    fn test_resize_plan_accepts_output_at_the_limit() {
        let plan = ResizePlan::new(1000, 1, TargetSize::Width(MAX_OUTPUT_DIMENSION)).unwrap();
        assert_eq!(plan.scaled, (MAX_OUTPUT_DIMENSION, 16));
    }

    #[test]
    fn test_proportional_never_zero() {
        assert_eq!(proportional(1, 1, 1000), 1);
        assert_eq!(proportional(300, 100, 400), 75);
        assert_eq!(proportional(10, 5, 0), 1);
    }

    #[tokio::test]
    async fn test_resize_image_file_jpeg() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = temp_dir.path().join("fjord.jpg");
        let destination = temp_dir.path().join("out.jpg");
        gradient(400, 300).save(&source).unwrap();

        assert_ok!(
            resize_image_file(
                source,
                destination.clone(),
                TargetSize::Width(100),
                ImageEncoding::Jpeg
            )
            .await
        );

        let bytes = std::fs::read(&destination).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);
        let out = image::load_from_memory(&bytes).unwrap();
        assert_eq!(out.dimensions(), (100, 75));
    }

    #[tokio::test]
    async fn test_resize_image_file_png_and_webp_keep_format() {
        let temp_dir = tempfile::tempdir().unwrap();

        let png_source = temp_dir.path().join("icon.png");
        RgbaImage::from_pixel(64, 32, image::Rgba([10, 20, 30, 128]))
            .save(&png_source)
            .unwrap();
        let png_out = temp_dir.path().join("icon-out.png");
        assert_ok!(
            resize_image_file(
                png_source,
                png_out.clone(),
                TargetSize::Height(16),
                ImageEncoding::Png
            )
            .await
        );
        let bytes = std::fs::read(&png_out).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Png);
        assert_eq!(image::load_from_memory(&bytes).unwrap().dimensions(), (32, 16));

        let webp_source = temp_dir.path().join("sky.webp");
        DynamicImage::ImageRgb8(gradient(80, 40))
            .save(&webp_source)
            .unwrap();
        let webp_out = temp_dir.path().join("sky-out.webp");
        assert_ok!(
            resize_image_file(
                webp_source,
                webp_out.clone(),
                TargetSize::Exact { width: 20, height: 20 },
                ImageEncoding::Webp
            )
            .await
        );
        let bytes = std::fs::read(&webp_out).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::WebP);
        assert_eq!(image::load_from_memory(&bytes).unwrap().dimensions(), (20, 20));
    }

    #[tokio::test]
    async fn test_resize_image_file_oversized_output_is_resize_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = temp_dir.path().join("fjord.jpg");
        let destination = temp_dir.path().join("out.jpg");
        gradient(400, 300).save(&source).unwrap();

        let err = assert_err!(
            resize_image_file(
                source,
                destination.clone(),
                TargetSize::Exact { width: 200_000, height: 200_000 },
                ImageEncoding::Jpeg
            )
            .await
        );
        assert_eq!(err.message(), "Error while resizing image fjord.jpg!");
        assert!(!destination.exists());
    }

    #[tokio::test]
    async fn test_resize_image_file_corrupt_source() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = temp_dir.path().join("broken.jpg");
        std::fs::write(&source, b"definitely not a jpeg").unwrap();

        let err = assert_err!(
            resize_image_file(
                source,
                temp_dir.path().join("out.jpg"),
                TargetSize::Width(10),
                ImageEncoding::Jpeg
            )
            .await
        );
        assert_eq!(err.message(), "Error while resizing image broken.jpg!");
    }

    #[tokio::test]
    async fn test_resize_image_file_unwritable_destination() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = temp_dir.path().join("fjord.jpg");
        gradient(40, 30).save(&source).unwrap();

        let err = assert_err!(
            resize_image_file(
                source,
                temp_dir.path().join("missing").join("out.jpg"),
                TargetSize::Width(10),
                ImageEncoding::Jpeg
            )
            .await
        );
        assert!(matches!(err, ApiError::Resize { .. }));
    }
}
