use std::path::{Path, PathBuf};

use anyhow::{Context, Error, Result};
use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::{Module, VarBuilder};
use candle_transformers::models::{
    clip::text_model::{Activation, ClipTextConfig, ClipTextTransformer},
    flux::{
        autoencoder::{self, AutoEncoder},
        model::{self, Flux},
        sampling,
    },
    t5::{self, T5EncoderModel},
};
use image::{imageops::FilterType, DynamicImage, RgbImage};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use crate::{image_to_tensor, tensor_to_image, GenerationRequest, Loader, ModelLike};

pub const MODEL_IDENTIFIER: &str = "flux-schnell";

/// How far the input photo is pushed towards noise before denoising.
pub const DEFAULT_STRENGTH: f64 = 0.85;

const T5_MAX_TOKENS: usize = 256;
const CLIP_MAX_TOKENS: usize = 77;
const PIXEL_GRID: u32 = 16;

/// Weight and tokenizer files of a local FLUX.1-schnell snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub flux: PathBuf,
    pub autoencoder: PathBuf,
    pub clip: PathBuf,
    pub clip_tokenizer: PathBuf,
    pub t5_config: PathBuf,
    pub t5_weights: Vec<PathBuf>,
    pub t5_tokenizer: PathBuf,
}

impl ModelFiles {
    pub fn locate(root: &Path) -> Result<Self> {
        let require = |relative: &str| -> Result<PathBuf> {
            let path = root.join(relative);
            if !path.is_file() {
                anyhow::bail!("missing model file {}", path.display());
            }
            Ok(path)
        };

        let t5_dir = root.join("text_encoder_2");
        let mut t5_weights = std::fs::read_dir(&t5_dir)
            .with_context(|| format!("failed to list {}", t5_dir.display()))?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "safetensors"))
            .collect::<Vec<_>>();
        if t5_weights.is_empty() {
            anyhow::bail!("no T5 weights found in {}", t5_dir.display());
        }
        t5_weights.sort();

        Ok(Self {
            flux: require("flux1-schnell.safetensors")?,
            autoencoder: require("ae.safetensors")?,
            clip: require("text_encoder/model.safetensors")?,
            clip_tokenizer: require("tokenizer/tokenizer.json")?,
            t5_config: require("text_encoder_2/config.json")?,
            t5_weights,
            t5_tokenizer: require("tokenizer_2/tokenizer.json")?,
        })
    }
}

pub struct FluxModel {
    device: Device,
    dtype: DType,
    strength: f64,
    t5_model: T5EncoderModel,
    t5_tokenizer: Tokenizer,
    clip_model: ClipTextTransformer,
    clip_tokenizer: Tokenizer,
    autoencoder: AutoEncoder,
    flux_model: Flux,
}

impl FluxModel {
    fn encode_t5(&mut self, prompt: &str) -> Result<Tensor> {
        let mut tokens = self
            .t5_tokenizer
            .encode(prompt, true)
            .map_err(Error::msg)?
            .get_ids()
            .to_vec();
        if tokens.len() > T5_MAX_TOKENS {
            warn!(tokens = tokens.len(), limit = T5_MAX_TOKENS, "prompt truncated for T5");
        }
        tokens.resize(T5_MAX_TOKENS, 0);
        let input_token_ids = Tensor::new(&*tokens, &self.device)?.unsqueeze(0)?;
        Ok(self.t5_model.forward(&input_token_ids)?)
    }

    fn encode_clip(&self, prompt: &str) -> Result<Tensor> {
        let tokens = self
            .clip_tokenizer
            .encode(prompt, true)
            .map_err(Error::msg)?
            .get_ids()
            .to_vec();
        if tokens.len() > CLIP_MAX_TOKENS {
            warn!(tokens = tokens.len(), limit = CLIP_MAX_TOKENS, "prompt truncated for CLIP");
        }
        let tokens = fit_clip_tokens(tokens);
        let input_token_ids = Tensor::new(&*tokens, &self.device)?.unsqueeze(0)?;
        Ok(self.clip_model.forward(&input_token_ids)?)
    }
}

impl ModelLike for FluxModel {
    fn identifier(&self) -> &'static str {
        MODEL_IDENTIFIER
    }

    // candle's FLUX attention has no sliced or fused variant to switch to.
    fn enable_memory_efficient_attention(&mut self) -> bool {
        false
    }

    fn run(&mut self, request: GenerationRequest) -> Result<DynamicImage> {
        let GenerationRequest {
            prompt,
            image,
            steps,
            guidance,
            width,
            height,
            seed,
        } = request;

        if let Some(seed) = seed {
            self.device
                .set_seed(seed)
                .context("failed to seed the compute device")?;
        }

        // --- Fit the input photo onto the autoencoder's pixel grid ---
        let (grid_width, grid_height) = grid_dimensions(width, height);
        let image = if image.dimensions() == (grid_width, grid_height) {
            image
        } else {
            image::imageops::resize(&image, grid_width, grid_height, FilterType::Lanczos3)
        };
        let (grid_width, grid_height) = (grid_width as usize, grid_height as usize);

        // --- Text embeddings ---
        let t5_emb = self.encode_t5(&prompt).context("failed to encode prompt with T5")?;
        let clip_emb = self
            .encode_clip(&prompt)
            .context("failed to encode prompt with CLIP")?;

        // --- Noise the encoded photo to the starting strength ---
        let init = image_to_tensor(&image, &self.device)?.to_dtype(self.dtype)?;
        let init_latent = self
            .autoencoder
            .encode(&init)
            .context("failed to encode input image")?;
        let noise = sampling::get_noise(1, grid_height, grid_width, &self.device)?
            .to_dtype(self.dtype)?;
        let noised = ((noise * self.strength)? + (init_latent * (1.0 - self.strength))?)?;

        // --- Denoise ---
        let state = sampling::State::new(&t5_emb, &clip_emb, &noised)?;
        let timesteps = img2img_schedule(steps, self.strength);
        debug!(?timesteps, "denoising");
        let latent_img = sampling::denoise(
            &self.flux_model,
            &state.img,
            &state.img_ids,
            &state.txt,
            &state.txt_ids,
            &state.vec,
            &timesteps,
            guidance,
        )
        .context("failed to denoise")?;
        let unpacked = sampling::unpack(&latent_img, grid_height, grid_width)?;

        // --- Decode and restore the requested size ---
        let decoded = self
            .autoencoder
            .decode(&unpacked)
            .context("failed to decode latent image")?;
        let img = ((decoded.clamp(-1f32, 1f32)? + 1.0)? * 127.5)?.to_dtype(DType::U8)?;
        let generated = tensor_to_image(&img.i(0)?)?.into_rgb8();

        Ok(DynamicImage::ImageRgb8(restore_dimensions(generated, width, height)))
    }
}

/// Rounds each side up to the autoencoder's 16 pixel grid.
fn grid_dimensions(width: u32, height: u32) -> (u32, u32) {
    (
        width.max(1).div_ceil(PIXEL_GRID) * PIXEL_GRID,
        height.max(1).div_ceil(PIXEL_GRID) * PIXEL_GRID,
    )
}

fn restore_dimensions(image: RgbImage, width: u32, height: u32) -> RgbImage {
    if image.dimensions() == (width, height) {
        image
    } else {
        image::imageops::resize(&image, width, height, FilterType::Lanczos3)
    }
}

/// Linear schedule from `strength` down to zero with exactly `steps` passes.
fn img2img_schedule(steps: usize, strength: f64) -> Vec<f64> {
    let steps = steps.max(1);
    (0..=steps)
        .map(|i| strength * (1.0 - i as f64 / steps as f64))
        .collect()
}

/// Truncates to the CLIP window while keeping the end-of-text token last,
/// which the pooled embedding is read from.
fn fit_clip_tokens(mut tokens: Vec<u32>) -> Vec<u32> {
    if tokens.len() > CLIP_MAX_TOKENS {
        let eos = tokens[tokens.len() - 1];
        tokens.truncate(CLIP_MAX_TOKENS);
        tokens[CLIP_MAX_TOKENS - 1] = eos;
    }
    tokens
}

pub struct FluxLoader;

impl Loader for FluxLoader {
    type Model = FluxModel;

    fn load(model_path: &Path, device: &Device) -> Result<Self::Model> {
        let files = ModelFiles::locate(model_path)?;
        let device = device.clone();
        let dtype = device.bf16_default_to_f32();
        info!(?dtype, "loading FLUX.1-schnell components");

        // --- Load T5 Model and Tokenizer ---
        let t5_vb = unsafe {
            VarBuilder::from_mmaped_safetensors(files.t5_weights.as_slice(), dtype, &device)
                .context("failed to build T5 var builder")?
        };
        let config_str =
            std::fs::read_to_string(&files.t5_config).context("failed to read T5 config")?;
        let t5_config: t5::Config =
            serde_json::from_str(&config_str).context("failed to parse T5 config")?;
        let t5_model =
            T5EncoderModel::load(t5_vb, &t5_config).context("failed to load T5 model")?;
        let t5_tokenizer = Tokenizer::from_file(&files.t5_tokenizer)
            .map_err(Error::msg)
            .context("failed to load T5 tokenizer")?;
        debug!("T5 encoder loaded");

        // --- Load CLIP Model and Tokenizer ---
        let clip_vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[&files.clip], dtype, &device)
                .context("failed to build CLIP var builder")?
        };
        let clip_config = ClipTextConfig {
            vocab_size: 49408,
            projection_dim: 768,
            activation: Activation::QuickGelu,
            intermediate_size: 3072,
            embed_dim: 768,
            max_position_embeddings: CLIP_MAX_TOKENS,
            pad_with: None,
            num_hidden_layers: 12,
            num_attention_heads: 12,
        };
        let clip_model = ClipTextTransformer::new(clip_vb.pp("text_model"), &clip_config)
            .context("failed to load CLIP model")?;
        let clip_tokenizer = Tokenizer::from_file(&files.clip_tokenizer)
            .map_err(Error::msg)
            .context("failed to load CLIP tokenizer")?;
        debug!("CLIP encoder loaded");

        // --- Load Autoencoder ---
        let autoencoder_vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[&files.autoencoder], dtype, &device)
                .context("failed to build autoencoder var builder")?
        };
        let autoencoder = AutoEncoder::new(&autoencoder::Config::schnell(), autoencoder_vb)
            .context("failed to load autoencoder")?;

        // --- Load Flux Model (non-quantized) ---
        let flux_vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[&files.flux], dtype, &device)
                .context("failed to build flux var builder")?
        };
        let flux_model =
            Flux::new(&model::Config::schnell(), flux_vb).context("failed to load flux model")?;

        Ok(FluxModel {
            device,
            dtype,
            strength: DEFAULT_STRENGTH,
            t5_model,
            t5_tokenizer,
            clip_model,
            clip_tokenizer,
            autoencoder,
            flux_model,
        })
    }
}
