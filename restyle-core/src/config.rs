use std::{path::PathBuf, time::Duration};

use crate::preprocess::DEFAULT_MAX_DIMENSION;

pub const DEFAULT_MODELS_PATH: &str = "/Volumes/ExternalDrive/ai-models/flux/FLUX.1-schnell";
pub const DEFAULT_OUTPUTS_PATH: &str = "/Volumes/ExternalDrive/ai-outputs";
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(600);

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub models_path: PathBuf,
    pub outputs_path: PathBuf,
    pub max_dimension: u32,
    /// `None` lets a generation run for as long as the backend needs.
    pub generation_timeout: Option<Duration>,
    pub seed: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            models_path: PathBuf::from(DEFAULT_MODELS_PATH),
            outputs_path: PathBuf::from(DEFAULT_OUTPUTS_PATH),
            max_dimension: DEFAULT_MAX_DIMENSION,
            generation_timeout: Some(DEFAULT_GENERATION_TIMEOUT),
            seed: None,
        }
    }
}
