//! Inference: turn a compiled prompt into generated text, either in-process or through Replicate.
use eyre::{Result, eyre};
use std::sync::Arc;

use crate::config::BackendConfig;

mod local;
mod remote;

pub use local::LocalBackend;
pub use remote::RemoteBackend;

/// A model that completes prompts. The session only ever sees this trait.
#[async_trait::async_trait]
pub trait ModelBackend: Send + Sync {
    /// Short label for logs.
    fn name(&self) -> &str;

    /// Generate the continuation of `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Build the backend the configuration asks for. Loading local weights happens off the runtime threads.
pub async fn make_backend(config: &BackendConfig) -> Result<Arc<dyn ModelBackend>> {
    match config {
        BackendConfig::Local { model_path } => {
            let model_path = match model_path {
                Some(path) => path.clone(),
                None => crate::cli::discovery::choose_best_model_path().ok_or_else(|| {
                    eyre!(
                        "backend: no GGUF weights found; set {}",
                        crate::config::LOCAL_MODEL_PATH_VAR
                    )
                })?,
            };
            tracing::info!(model_path = %model_path.display(), "backend: running model locally");
            let backend = tokio::task::spawn_blocking(move || LocalBackend::load(&model_path))
                .await
                .map_err(|e| eyre!(e))??;
            Ok(Arc::new(backend))
        }
        BackendConfig::Remote {
            model,
            api_token,
            api_base,
        } => {
            tracing::info!(%model, "backend: running model through replicate");
            let mut backend = RemoteBackend::new(model, api_token)?;
            if let Some(api_base) = api_base {
                tracing::debug!(%api_base, "backend: overriding the replicate endpoint");
                backend = backend.with_base_url(api_base.as_str());
            }
            Ok(Arc::new(backend))
        }
    }
}
