use std::path::Path;

use anyhow::Result;
use candle_core::Device;

use crate::ModelLike;

/// Builds a backend from weights stored on local disk.
pub trait Loader {
    type Model: ModelLike + 'static;

    fn load(model_path: &Path, device: &Device) -> Result<Self::Model>
    where
        Self: Sized;
}
