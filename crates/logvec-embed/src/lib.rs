use tracing::info;

use logvec_core::config::{ModelConfig, ModelKind};
use logvec_core::error::Result;

pub mod device;
pub mod hashed;
pub mod linformer;
pub mod pool;
pub mod provider;

pub use hashed::HashedEmbedder;
pub use linformer::{LinformerConfig, LinformerEncoder};
pub use pool::{mean_pool, pool_rows};
pub use provider::EmbeddingProvider;

/// Construct the configured provider for sequences of length `seq_len`.
///
/// With `weights_dir` set, an existing directory is loaded as-is; a missing
/// one is created from the seeded weights so later runs reuse them.
pub fn build_provider(cfg: &ModelConfig, seq_len: usize) -> Result<Box<dyn EmbeddingProvider>> {
    match cfg.kind {
        ModelKind::Hashed => {
            info!(dim = cfg.emb_dim, seq_len, "using hashed embedder");
            Ok(Box::new(HashedEmbedder::new(cfg.vocab_size, seq_len, cfg.emb_dim, cfg.seed)))
        }
        ModelKind::Linformer => {
            let device = device::select_device(cfg.device);
            let encoder = match &cfg.weights_dir {
                Some(dir) if dir.join(linformer::WEIGHTS_FILE).exists() => LinformerEncoder::load_dir(dir, &device)?,
                Some(dir) => {
                    let encoder = LinformerEncoder::from_seed(LinformerConfig::new(cfg, seq_len), cfg.seed, &device)?;
                    encoder.save_dir(dir)?;
                    encoder
                }
                None => LinformerEncoder::from_seed(LinformerConfig::new(cfg, seq_len), cfg.seed, &device)?,
            };
            info!(dim = encoder.dim(), seq_len = encoder.seq_len(), vocab = encoder.vocab_size(), depth = encoder.config().depth, "Linformer encoder ready");
            Ok(Box::new(encoder))
        }
    }
}
