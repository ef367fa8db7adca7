use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use image::{codecs::jpeg::JpegEncoder, ImageError, RgbImage};
use tracing::info;

use crate::{
    error::{RedesignError, Result},
    request::output_file_name,
};

pub const JPEG_QUALITY: u8 = 95;

/// Writes `{output_dir}/{output_id}_generated.jpg`, replacing any earlier file.
pub fn write(image: &RgbImage, output_dir: &Path, output_id: &str) -> Result<PathBuf> {
    fs::create_dir_all(output_dir).map_err(|e| RedesignError::io(output_dir, e))?;

    let output_path = output_dir.join(output_file_name(output_id));
    info!(path = %output_path.display(), "saving result");

    let file = File::create(&output_path).map_err(|e| RedesignError::io(&output_path, e))?;
    let mut writer = BufWriter::new(file);
    JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY)
        .encode_image(image)
        .map_err(|e| match e {
            ImageError::IoError(source) => RedesignError::io(&output_path, source),
            other => RedesignError::io(&output_path, std::io::Error::other(other)),
        })?;
    writer
        .flush()
        .map_err(|e| RedesignError::io(&output_path, e))?;

    Ok(output_path)
}
