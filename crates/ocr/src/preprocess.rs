use image::{DynamicImage, GrayImage, ImageBuffer, ImageReader, Luma};
use imageproc::contrast::adaptive_threshold;
use imageproc::filter::gaussian_blur_f32;
use intake_core::ThresholdPolicy;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreprocessError {
    /// The path does not resolve to a readable image. Fatal for a run.
    #[error("Failed to load image {path}: {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
}

/// Decode an image file. The format is sniffed from the file contents, so a
/// missing or wrong extension does not matter.
pub fn load_image(path: &Path) -> Result<DynamicImage, PreprocessError> {
    let decode = || -> Result<DynamicImage, image::ImageError> {
        let reader = ImageReader::open(path)?.with_guessed_format()?;
        reader.decode()
    };
    decode().map_err(|source| PreprocessError::ImageLoad {
        path: path.to_path_buf(),
        source,
    })
}

/// Load an image file and return a single-channel, two-tone image ready for OCR.
pub fn prepare_for_ocr(path: &Path, policy: ThresholdPolicy) -> Result<GrayImage, PreprocessError> {
    let img = load_image(path)?;
    Ok(binarize(&img, policy))
}

/// Grayscale + threshold according to `policy`.
pub fn binarize(img: &DynamicImage, policy: ThresholdPolicy) -> GrayImage {
    let gray: GrayImage = img.to_luma8();

    match policy {
        ThresholdPolicy::Global { cutoff } => global_threshold(&gray, cutoff),
        ThresholdPolicy::Adaptive { blur_sigma, block_radius } => {
            // gaussian_blur_f32 panics on a non-positive sigma.
            let blurred = if blur_sigma > 0.0 {
                gaussian_blur_f32(&gray, blur_sigma)
            } else {
                gray
            };
            adaptive_threshold(&blurred, block_radius)
        }
    }
}

fn global_threshold(gray: &GrayImage, cutoff: u8) -> GrayImage {
    ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        let p = gray.get_pixel(x, y)[0];
        Luma([if p > cutoff { 255 } else { 0 }])
    })
}

pub fn encode_as_png(img: &GrayImage) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Vec::new();
    DynamicImage::ImageLuma8(img.clone())
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(buf)
}
