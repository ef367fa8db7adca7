#[cfg(feature = "accelerate")]
extern crate accelerate_src;
#[cfg(feature = "mkl")]
extern crate intel_mkl_src;

pub mod availability;
pub mod catalog;
pub mod config;
pub mod device_map;
pub mod error;
pub mod invoke;
pub mod loader;
pub mod model_manager;
pub mod orchestrator;
pub mod output;
pub mod preprocess;
pub mod prompt;
pub mod protocol;
pub mod request;
pub mod runtime;
mod util;

mod flux;

pub use availability::*;
pub use config::*;
pub use device_map::*;
pub use error::{ErrorKind, RedesignError};
pub use flux::{FluxLoader, FluxModel, ModelFiles, MODEL_IDENTIFIER};
use image::{DynamicImage, RgbImage};
pub use invoke::*;
pub use loader::*;
pub use model_manager::*;
pub use orchestrator::*;
pub use preprocess::NormalizedImage;
pub use protocol::*;
pub use request::*;
pub use util::*;

/// One call into the generative backend.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub image: RgbImage,
    pub steps: usize,
    pub guidance: f64,
    pub width: u32,
    pub height: u32,
    pub seed: Option<u64>,
}

pub trait ModelLike: Send {
    /// Name reported to callers, e.g. `flux-schnell`.
    fn identifier(&self) -> &'static str;

    /// Switches to a lower-memory attention path. Returns whether the backend
    /// supports one.
    fn enable_memory_efficient_attention(&mut self) -> bool {
        false
    }

    fn run(&mut self, request: GenerationRequest) -> anyhow::Result<DynamicImage>;
}
