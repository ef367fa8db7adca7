use std::path::Path;

use image::{imageops::FilterType, ImageReader, RgbImage};
use tracing::{debug, info};

use crate::error::{RedesignError, Result};

pub const DEFAULT_MAX_DIMENSION: u32 = 1024;

/// Decoded RGB raster whose longer side is within the configured bound.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    image: RgbImage,
    source_dimensions: (u32, u32),
}

impl NormalizedImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn source_dimensions(&self) -> (u32, u32) {
        self.source_dimensions
    }

    pub fn was_resized(&self) -> bool {
        self.dimensions() != self.source_dimensions
    }

    pub fn as_image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }
}

/// Dimensions with the longer side scaled down to `max_dimension`.
///
/// Images already within the bound keep their size; nothing is upscaled.
pub fn compute_fit_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_dimension {
        return (width.max(1), height.max(1));
    }
    let scale = |side: u32| {
        ((side as u64 * max_dimension as u64 + longest as u64 / 2) / longest as u64).max(1) as u32
    };
    (scale(width), scale(height))
}

pub fn normalize_image(image: RgbImage, max_dimension: u32) -> NormalizedImage {
    let source_dimensions = image.dimensions();
    let (width, height) = source_dimensions;
    let (target_width, target_height) = compute_fit_dimensions(width, height, max_dimension);
    if (target_width, target_height) == source_dimensions {
        return NormalizedImage {
            image,
            source_dimensions,
        };
    }

    info!(
        from = format!("{width}x{height}"),
        to = format!("{target_width}x{target_height}"),
        "resizing input image"
    );
    let image = image::imageops::resize(&image, target_width, target_height, FilterType::Lanczos3);
    NormalizedImage {
        image,
        source_dimensions,
    }
}

/// Opens the photograph at `path`, converts it to RGB and bounds its size.
pub fn normalize(path: &Path, max_dimension: u32) -> Result<NormalizedImage> {
    if !path.exists() {
        return Err(RedesignError::InputNotFound(path.to_path_buf()));
    }

    debug!(path = %path.display(), "loading input image");
    let decoded = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| {
            RedesignError::Validation(format!(
                "Failed to read input image {}: {e}",
                path.display()
            ))
        })?
        .decode()
        .map_err(|e| {
            RedesignError::Validation(format!(
                "Failed to decode input image {}: {e}",
                path.display()
            ))
        })?;

    Ok(normalize_image(decoded.into_rgb8(), max_dimension))
}
