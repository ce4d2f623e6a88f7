//! In-process llama.cpp backend.
//! Terminology:
//! - "context capacity" (ctx_cap) = tokens the context window can hold.
//! - "logits_idx" = the batch index whose logits we sample from.

use eyre::{Result, eyre};
use gg::context::LlamaContext;
use gg::context::params::LlamaContextParams;
use gg::llama_backend::LlamaBackend;
use gg::llama_batch::LlamaBatch;
use gg::model::params::LlamaModelParams;
use gg::model::{AddBos, LlamaModel, Special};
use gg::sampling::LlamaSampler;
use gg::token::LlamaToken;
use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use super::ModelBackend;

/// Llama-2 chat models are trained with a 4k window; 2k keeps memory modest.
const N_CTX: u32 = 2048;
const BATCH_SIZE: usize = 512;
/// Upper bound on generated tokens per reply.
const MAX_NEW_TOKENS: usize = 512;

/// Loaded backend and model; shared with every blocking generation task.
struct Loaded {
    backend: LlamaBackend,
    model: LlamaModel,
}

pub struct LocalBackend {
    loaded: Arc<Loaded>,
    label: String,
}

impl LocalBackend {
    /// Load the weights into memory (GPU layers enabled by default). Blocks.
    pub fn load(model_path: &Path) -> Result<Self> {
        let backend = LlamaBackend::init()?;
        let model_params = LlamaModelParams::default().with_n_gpu_layers(u32::MAX);
        let model = LlamaModel::load_from_file(&backend, model_path, &model_params)?;
        let label = model_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "local".to_string());
        tracing::info!(%label, "local: model loaded");
        Ok(Self {
            loaded: Arc::new(Loaded { backend, model }),
            label,
        })
    }
}

#[async_trait::async_trait]
impl ModelBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.label
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let loaded = self.loaded.clone();
        let prompt = prompt.to_owned();
        // Decoding is CPU/GPU bound; keep it off the async workers.
        tokio::task::spawn_blocking(move || complete(&loaded.backend, &loaded.model, &prompt))
            .await
            .map_err(|e| eyre!(e))?
    }
}

/// Run one completion to the end and return the decoded text.
fn complete(backend: &LlamaBackend, model: &LlamaModel, prompt: &str) -> Result<String> {
    let num_threads = std::thread::available_parallelism()
        .ok()
        .map(|n| n.get())
        .unwrap_or(1);

    let n_ctx = NonZeroU32::new(N_CTX.min(model.n_ctx_train().max(1)));
    let ctx_params = LlamaContextParams::default()
        .with_n_ctx(n_ctx)
        .with_n_threads(num_threads as i32)
        .with_n_threads_batch(num_threads as i32)
        .with_n_batch(BATCH_SIZE as u32)
        .with_n_ubatch(BATCH_SIZE as u32);
    let mut ctx = model.new_context(backend, ctx_params)?;
    let ctx_cap = ctx.n_ctx() as usize;

    // The prompt spells out `<s>` itself, so the tokenizer must not add another BOS.
    let prompt_tokens = model.str_to_token(prompt, AddBos::Never)?;
    let prompt_tokens = clip_to_recent(prompt_tokens, prompt_room(ctx_cap));

    let mut batch = LlamaBatch::new(BATCH_SIZE, 1);
    let mut logits_idx = prefill_returning_logits_idx(&mut ctx, &mut batch, &prompt_tokens)?;

    let seed: u32 = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(31337);
    let mut sampler = LlamaSampler::chain_simple([
        LlamaSampler::penalties(64, 1.1, 0.0, 0.0),
        LlamaSampler::top_k(40),
        LlamaSampler::top_p(0.95, 1),
        LlamaSampler::temp(0.8),
        LlamaSampler::dist(seed),
    ])
    // Prime repetition penalties with the prompt tokens.
    .with_tokens(prompt_tokens.iter().copied());

    let mut pos = prompt_tokens.len();
    let budget = ctx_cap.saturating_sub(pos).min(MAX_NEW_TOKENS);
    let mut out: Vec<u8> = Vec::new();

    for _ in 0..budget {
        let token = sampler.sample(&ctx, logits_idx);
        if model.is_eog_token(token) {
            break;
        }
        sampler.accept(token);

        let bytes = model
            .token_to_bytes(token, Special::Tokenize)
            .map_err(|e| eyre!(e))?;
        out.extend_from_slice(&bytes);

        // Single-token decode; logits are at index 0
        batch.clear();
        batch.add(token, pos as i32, &[0], true)?;
        ctx.decode(&mut batch)?;
        logits_idx = 0;
        pos += 1;
    }

    tracing::debug!(
        prompt_tokens = prompt_tokens.len(),
        generated_bytes = out.len(),
        "local: completion finished"
    );

    // Tokens may end mid code point when the budget runs out.
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Tokens of prompt we accept so that at least a short reply still fits.
fn prompt_room(ctx_cap: usize) -> usize {
    let reserve = (ctx_cap / 4).min(MAX_NEW_TOKENS);
    ctx_cap.saturating_sub(reserve).max(1)
}

/// Keep the most recent `room` tokens; older history falls off the front.
fn clip_to_recent<T>(mut toks: Vec<T>, room: usize) -> Vec<T> {
    if toks.len() > room {
        let cut = toks.len() - room;
        tracing::warn!(dropped = cut, "local: prompt longer than context; dropping oldest tokens");
        toks.drain(..cut);
    }
    toks
}

/// Prefill the prompt in chunks; return the batch index (`logits_idx`) that has logits.
fn prefill_returning_logits_idx(
    ctx: &mut LlamaContext,
    batch: &mut LlamaBatch,
    toks: &[LlamaToken],
) -> Result<i32> {
    let mut pos = 0usize;
    let mut logits_idx: i32 = 0;
    for chunk in toks.chunks(BATCH_SIZE) {
        batch.clear();
        for (i, &t) in chunk.iter().enumerate() {
            let want_logits = (pos + i + 1) == toks.len();
            if want_logits {
                logits_idx = i as i32;
            }
            batch.add(t, (pos + i) as i32, &[0], want_logits)?;
        }
        ctx.decode(batch)?;
        pos += chunk.len();
    }
    Ok(logits_idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_leaves_space_for_a_reply() {
        assert_eq!(prompt_room(2048), 2048 - 512);
        assert_eq!(prompt_room(400), 300);
        assert_eq!(prompt_room(1), 1);
    }

    #[test]
    fn clipping_keeps_the_tail() {
        assert_eq!(clip_to_recent(vec![1, 2, 3, 4, 5], 3), vec![3, 4, 5]);
        assert_eq!(clip_to_recent(vec![1, 2], 3), vec![1, 2]);
    }
}
