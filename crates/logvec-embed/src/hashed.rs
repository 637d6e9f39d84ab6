//! Deterministic embedding provider with no learned parameters.
//!
//! Each position vector depends only on the token id at that position and the
//! seed, so outputs are reproducible and cheap. Useful for dry runs and tests
//! where loading a real model is unnecessary.

use std::hash::Hasher;

use candle_core::{Device, Tensor};
use twox_hash::XxHash64;

use logvec_core::error::Result;
use logvec_core::types::FixedSequence;

use crate::provider::{check_batch, model_err, EmbeddingProvider};

pub struct HashedEmbedder {
    vocab_size: usize,
    seq_len: usize,
    dim: usize,
    seed: u64,
}

impl HashedEmbedder {
    pub fn new(vocab_size: usize, seq_len: usize, dim: usize, seed: u64) -> Self {
        Self { vocab_size, seq_len, dim, seed }
    }

    fn token_vector(&self, id: u32, out: &mut Vec<f32>) {
        for j in 0..self.dim {
            let mut hasher = XxHash64::with_seed(self.seed);
            hasher.write_u32(id);
            hasher.write_usize(j);
            let h = hasher.finish();
            // top 32 bits mapped to [-1, 1]
            out.push(((h >> 32) as u32) as f32 / u32::MAX as f32 * 2.0 - 1.0);
        }
    }
}

impl EmbeddingProvider for HashedEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn seq_len(&self) -> usize { self.seq_len }
    fn vocab_size(&self) -> usize { self.vocab_size }

    fn embed(&self, batch: &[FixedSequence]) -> Result<Tensor> {
        check_batch(batch, self.seq_len, self.vocab_size)?;
        let mut data = Vec::with_capacity(batch.len() * self.seq_len * self.dim);
        for seq in batch {
            for &id in seq.ids() { self.token_vector(id, &mut data); }
        }
        Tensor::from_vec(data, (batch.len(), self.seq_len, self.dim), &Device::Cpu).map_err(model_err)
    }
}
