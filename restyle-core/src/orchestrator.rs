use std::{path::PathBuf, time::Instant};

use candle_core::Device;
use tracing::{error, info, info_span, Instrument};

use crate::{
    error::Result,
    output, preprocess, prompt,
    protocol::{GenerationResult, ImageSize},
    GenerationInvoker, Loader, ModelManager, RedesignRequest, Settings,
};

struct Completed {
    output_path: PathBuf,
    inference_steps: usize,
    model: &'static str,
    image_size: ImageSize,
}

/// Runs requests through validation, preprocessing, prompt composition,
/// model loading, generation and output, with one failure boundary.
pub struct Redesigner<L: Loader> {
    settings: Settings,
    models: ModelManager<L>,
    invoker: GenerationInvoker,
}

impl<L> Redesigner<L>
where
    L: Loader + 'static,
{
    pub fn new(settings: Settings, device: Device) -> Self {
        let models = ModelManager::new(settings.models_path.clone(), device);
        let invoker = GenerationInvoker::new(settings.generation_timeout, settings.seed);
        Self {
            settings,
            models,
            invoker,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn models(&self) -> &ModelManager<L> {
        &self.models
    }

    pub fn models_mut(&mut self) -> &mut ModelManager<L> {
        &mut self.models
    }

    /// Always produces a result; failures carry the elapsed time.
    pub async fn handle(&self, request: RedesignRequest) -> GenerationResult {
        let started = Instant::now();
        let span = info_span!("redesign", output_id = %request.output_id);

        match self.run(request).instrument(span).await {
            Ok(done) => {
                let processing_time = started.elapsed();
                info!(
                    output_path = %done.output_path.display(),
                    seconds = processing_time.as_secs(),
                    "generation completed"
                );
                GenerationResult::Success {
                    output_path: done.output_path,
                    processing_time,
                    inference_steps: done.inference_steps,
                    model: done.model.to_string(),
                    image_size: done.image_size,
                }
            }
            Err(e) => {
                let processing_time = started.elapsed();
                error!(kind = %e.kind(), error = %e, "generation failed");
                GenerationResult::failure(e.to_string(), Some(processing_time))
            }
        }
    }

    async fn run(&self, request: RedesignRequest) -> Result<Completed> {
        request.validate()?;
        info!(
            input = %request.input_image_path.display(),
            steps = request.inference_steps.get(),
            "starting redesign"
        );

        let image = preprocess::normalize(&request.input_image_path, self.settings.max_dimension)?;
        let (width, height) = image.dimensions();

        let prompt = prompt::compose(&request.style, &request.room_type, &request.prompt);
        info!(prompt = %prompt.chars().take(100).collect::<String>(), "composed prompt");

        let handle = self.models.ensure_loaded().await?;
        let generated = self
            .invoker
            .invoke(&handle, prompt, image, request.inference_steps)
            .await?;

        let output_path = output::write(&generated, &self.settings.outputs_path, &request.output_id)?;

        Ok(Completed {
            output_path,
            inference_steps: request.inference_steps.get(),
            model: handle.identifier(),
            image_size: ImageSize { width, height },
        })
    }
}
