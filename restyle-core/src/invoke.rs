use std::time::{Duration, Instant};

use anyhow::anyhow;
use image::RgbImage;
use tracing::{info, warn};

use crate::{
    error::{RedesignError, Result},
    GenerationRequest, InferenceSteps, ModelHandle, ModelLike, NormalizedImage,
};

/// Schnell is distilled to run without classifier-free guidance.
pub const GUIDANCE_SCALE: f64 = 0.0;

/// Calls the backend with validated parameters, one generation at a time.
#[derive(Debug, Clone, Default)]
pub struct GenerationInvoker {
    deadline: Option<Duration>,
    seed: Option<u64>,
}

impl GenerationInvoker {
    pub fn new(deadline: Option<Duration>, seed: Option<u64>) -> Self {
        Self { deadline, seed }
    }

    /// Runs one generation and returns a raster with the input's dimensions.
    ///
    /// When the deadline passes the in-flight call is abandoned; it keeps the
    /// model locked until it finishes, so later generations queue behind it.
    pub async fn invoke<M>(
        &self,
        handle: &ModelHandle<M>,
        prompt: String,
        image: NormalizedImage,
        steps: InferenceSteps,
    ) -> Result<RgbImage>
    where
        M: ModelLike + 'static,
    {
        let (width, height) = image.dimensions();
        let request = GenerationRequest {
            prompt,
            image: image.into_image(),
            steps: steps.get(),
            guidance: GUIDANCE_SCALE,
            width,
            height,
            seed: self.seed,
        };

        info!(
            model = handle.identifier(),
            steps = request.steps,
            width,
            height,
            seeded = request.seed.is_some(),
            "starting generation"
        );
        let started = Instant::now();
        let model = handle.shared();
        let task = tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| anyhow!("model is unusable after an earlier generation panicked"))?;
            model.run(request)
        });

        let joined = match self.deadline {
            Some(limit) => tokio::time::timeout(limit, task).await.map_err(|_| {
                warn!(limit = ?limit, "generation exceeded its deadline");
                RedesignError::Timeout(limit)
            })?,
            None => task.await,
        };
        let generated = joined
            .map_err(|e| RedesignError::Backend(anyhow!("generation task failed: {e}")))?
            .map_err(RedesignError::Backend)?
            .into_rgb8();

        if generated.dimensions() != (width, height) {
            return Err(RedesignError::Backend(anyhow!(
                "backend returned a {}x{} image, expected {width}x{height}",
                generated.width(),
                generated.height()
            )));
        }

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "generation finished"
        );
        Ok(generated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::normalize_image;
    use image::{DynamicImage, Rgb};
    use std::sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    };

    #[derive(Default)]
    struct RecordingModel {
        last: Option<(String, usize, f64, u32, u32, Option<u64>)>,
        busy: Arc<AtomicBool>,
        overlaps: Arc<AtomicUsize>,
        delay: Duration,
        fail: bool,
        wrong_size: bool,
    }

    impl ModelLike for RecordingModel {
        fn identifier(&self) -> &'static str {
            "recording"
        }

        fn run(&mut self, request: GenerationRequest) -> anyhow::Result<DynamicImage> {
            if self.busy.swap(true, Ordering::SeqCst) {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            std::thread::sleep(self.delay);
            self.busy.store(false, Ordering::SeqCst);

            if self.fail {
                anyhow::bail!("sampler diverged");
            }
            self.last = Some((
                request.prompt.clone(),
                request.steps,
                request.guidance,
                request.width,
                request.height,
                request.seed,
            ));
            let (width, height) = if self.wrong_size {
                (request.width + 1, request.height)
            } else {
                (request.width, request.height)
            };
            Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(
                width,
                height,
                Rgb([1, 2, 3]),
            )))
        }
    }

    fn input(width: u32, height: u32) -> NormalizedImage {
        normalize_image(RgbImage::from_pixel(width, height, Rgb([0, 0, 0])), 1024)
    }

    #[tokio::test]
    async fn passes_fixed_guidance_and_input_dimensions() {
        let handle = ModelHandle::new(RecordingModel::default());
        let invoker = GenerationInvoker::new(None, Some(42));

        let output = invoker
            .invoke(&handle, "a room".to_string(), input(48, 32), InferenceSteps::coerce(Some(2)))
            .await
            .unwrap();

        assert_eq!(output.dimensions(), (48, 32));
        let recorded = handle.shared().lock().unwrap().last.clone().unwrap();
        assert_eq!(recorded, ("a room".to_string(), 2, 0.0, 48, 32, Some(42)));
    }

    #[tokio::test]
    async fn backend_faults_are_backend_errors() {
        let handle = ModelHandle::new(RecordingModel {
            fail: true,
            ..Default::default()
        });
        let err = GenerationInvoker::default()
            .invoke(&handle, String::new(), input(8, 8), InferenceSteps::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Backend);
        assert!(err.to_string().contains("sampler diverged"));
    }

    #[tokio::test]
    async fn mismatched_output_size_is_rejected() {
        let handle = ModelHandle::new(RecordingModel {
            wrong_size: true,
            ..Default::default()
        });
        let err = GenerationInvoker::default()
            .invoke(&handle, String::new(), input(8, 8), InferenceSteps::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Backend);
    }

    #[tokio::test]
    async fn slow_generation_times_out() {
        let handle = ModelHandle::new(RecordingModel {
            delay: Duration::from_millis(300),
            ..Default::default()
        });
        let invoker = GenerationInvoker::new(Some(Duration::from_millis(20)), None);
        let err = invoker
            .invoke(&handle, String::new(), input(8, 8), InferenceSteps::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RedesignError::Timeout(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_generations_are_serialized() {
        let model = RecordingModel {
            delay: Duration::from_millis(20),
            ..Default::default()
        };
        let overlaps = Arc::clone(&model.overlaps);
        let handle = ModelHandle::new(model);

        let runs: Vec<_> = (0..4)
            .map(|_| {
                let handle = handle.clone();
                tokio::spawn(async move {
                    GenerationInvoker::default()
                        .invoke(&handle, String::new(), input(8, 8), InferenceSteps::default())
                        .await
                })
            })
            .collect();
        for run in runs {
            run.await.unwrap().unwrap();
        }
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    }
}
