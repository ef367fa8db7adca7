use std::{
    marker::PhantomData,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Instant,
};

use anyhow::anyhow;
use candle_core::Device;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

use crate::{
    error::{RedesignError, Result},
    Loader, ModelLike,
};

/// Shared handle to a loaded backend. Generations lock it for their whole run.
pub struct ModelHandle<M> {
    model: Arc<Mutex<M>>,
    identifier: &'static str,
    memory_efficient: bool,
}

impl<M> Clone for ModelHandle<M> {
    fn clone(&self) -> Self {
        Self {
            model: Arc::clone(&self.model),
            identifier: self.identifier,
            memory_efficient: self.memory_efficient,
        }
    }
}

impl<M: ModelLike> ModelHandle<M> {
    pub fn new(model: M) -> Self {
        let identifier = model.identifier();
        Self {
            model: Arc::new(Mutex::new(model)),
            identifier,
            memory_efficient: false,
        }
    }

    pub fn identifier(&self) -> &'static str {
        self.identifier
    }

    /// Whether the backend accepted the reduced working-set mode at load time.
    pub fn memory_efficient_attention(&self) -> bool {
        self.memory_efficient
    }

    pub(crate) fn shared(&self) -> Arc<Mutex<M>> {
        Arc::clone(&self.model)
    }
}

/// Owns the cached backend handle and loads it at most once.
///
/// Concurrent first calls wait on the same load; a failed load leaves the
/// cache empty so the next request tries again.
pub struct ModelManager<L: Loader> {
    model_path: PathBuf,
    device: Device,
    handle: OnceCell<ModelHandle<L::Model>>,
    _loader: PhantomData<fn() -> L>,
}

impl<L> ModelManager<L>
where
    L: Loader + 'static,
{
    pub fn new(model_path: impl Into<PathBuf>, device: Device) -> Self {
        Self {
            model_path: model_path.into(),
            device,
            handle: OnceCell::new(),
            _loader: PhantomData,
        }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn is_loaded(&self) -> bool {
        self.handle.initialized()
    }

    pub async fn ensure_loaded(&self) -> Result<ModelHandle<L::Model>> {
        if let Some(handle) = self.handle.get() {
            debug!(model = handle.identifier(), "using cached model");
            return Ok(handle.clone());
        }
        let handle = self.handle.get_or_try_init(|| self.load()).await?;
        Ok(handle.clone())
    }

    /// Drops the cached handle; the next request loads the model again.
    pub fn invalidate(&mut self) -> bool {
        self.handle.take().is_some()
    }

    async fn load(&self) -> Result<ModelHandle<L::Model>> {
        if !self.model_path.exists() {
            return Err(RedesignError::ModelNotFound(self.model_path.clone()));
        }
        if !self.model_path.is_dir() {
            return Err(RedesignError::Configuration(format!(
                "model path {} is not a directory",
                self.model_path.display()
            )));
        }

        info!(path = %self.model_path.display(), device = ?self.device, "loading model");
        let started = Instant::now();
        let path = self.model_path.clone();
        let device = self.device.clone();
        let mut model = tokio::task::spawn_blocking(move || L::load(&path, &device))
            .await
            .map_err(|e| RedesignError::Backend(anyhow!("model loading task failed: {e}")))?
            .map_err(|e| {
                error!(error = %format!("{e:#}"), "failed to load model");
                RedesignError::Backend(e)
            })?;

        let memory_efficient = model.enable_memory_efficient_attention();
        if memory_efficient {
            info!("memory-efficient attention enabled");
        } else {
            info!("memory-efficient attention not supported by this backend");
        }

        let handle = ModelHandle {
            memory_efficient,
            ..ModelHandle::new(model)
        };
        info!(
            model = handle.identifier(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "model loaded"
        );
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GenerationRequest;
    use image::DynamicImage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoModel;

    impl ModelLike for EchoModel {
        fn identifier(&self) -> &'static str {
            "echo"
        }

        fn run(&mut self, request: GenerationRequest) -> anyhow::Result<DynamicImage> {
            Ok(DynamicImage::ImageRgb8(request.image))
        }
    }

    struct EchoLoader;

    impl Loader for EchoLoader {
        type Model = EchoModel;

        fn load(_model_path: &Path, _device: &Device) -> anyhow::Result<Self::Model> {
            Ok(EchoModel)
        }
    }

    struct LeanModel;

    impl ModelLike for LeanModel {
        fn identifier(&self) -> &'static str {
            "lean"
        }

        fn enable_memory_efficient_attention(&mut self) -> bool {
            true
        }

        fn run(&mut self, request: GenerationRequest) -> anyhow::Result<DynamicImage> {
            Ok(DynamicImage::ImageRgb8(request.image))
        }
    }

    struct LeanLoader;

    impl Loader for LeanLoader {
        type Model = LeanModel;

        fn load(_model_path: &Path, _device: &Device) -> anyhow::Result<Self::Model> {
            Ok(LeanModel)
        }
    }

    static SLOW_LOADS: AtomicUsize = AtomicUsize::new(0);

    struct SlowLoader;

    impl Loader for SlowLoader {
        type Model = EchoModel;

        fn load(_model_path: &Path, _device: &Device) -> anyhow::Result<Self::Model> {
            SLOW_LOADS.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(50));
            Ok(EchoModel)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_calls_load_once() {
        let dir = tempfile::tempdir().unwrap();
        let manager = Arc::new(ModelManager::<SlowLoader>::new(dir.path(), Device::Cpu));

        let calls: Vec<_> = (0..8)
            .map(|_| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move { manager.ensure_loaded().await.map(|h| h.identifier()) })
            })
            .collect();
        for call in calls {
            assert_eq!(call.await.unwrap().unwrap(), "echo");
        }

        assert_eq!(SLOW_LOADS.load(Ordering::SeqCst), 1);
        assert!(manager.is_loaded());
    }

    #[tokio::test]
    async fn missing_model_path_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let model_dir = dir.path().join("flux");
        let manager = ModelManager::<EchoLoader>::new(&model_dir, Device::Cpu);

        let err = manager.ensure_loaded().await.err().unwrap();
        assert!(matches!(err, RedesignError::ModelNotFound(_)));
        assert!(!manager.is_loaded());

        std::fs::create_dir(&model_dir).unwrap();
        assert!(manager.ensure_loaded().await.is_ok());
        assert!(manager.is_loaded());
    }

    #[tokio::test]
    async fn model_path_must_be_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("flux1-schnell.safetensors");
        std::fs::write(&file, b"").unwrap();
        let manager = ModelManager::<EchoLoader>::new(&file, Device::Cpu);

        let err = manager.ensure_loaded().await.err().unwrap();
        assert_eq!(err.kind(), crate::ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn handle_records_memory_efficient_mode() {
        let dir = tempfile::tempdir().unwrap();

        let plain = ModelManager::<EchoLoader>::new(dir.path(), Device::Cpu);
        assert!(!plain.ensure_loaded().await.unwrap().memory_efficient_attention());

        let lean = ModelManager::<LeanLoader>::new(dir.path(), Device::Cpu);
        let handle = lean.ensure_loaded().await.unwrap();
        assert!(handle.memory_efficient_attention());
        assert!(handle.clone().memory_efficient_attention());
    }

    #[tokio::test]
    async fn invalidate_clears_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = ModelManager::<EchoLoader>::new(dir.path(), Device::Cpu);

        assert!(!manager.invalidate());
        manager.ensure_loaded().await.unwrap();
        assert!(manager.invalidate());
        assert!(!manager.is_loaded());
    }
}
