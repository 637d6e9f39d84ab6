use candle_core::{Device, Tensor};

use logvec_core::error::{Error, Result};
use logvec_core::types::FixedSequence;

/// Sequence model turning fixed-length token ids into per-position vectors.
///
/// Implementations run inference only: `embed` never updates parameters.
pub trait EmbeddingProvider: Send + Sync {
    /// Output width D of every position vector.
    fn dim(&self) -> usize;
    /// Sequence length N every input must have.
    fn seq_len(&self) -> usize;
    /// Size of the token embedding table; ids must be below it.
    fn vocab_size(&self) -> usize;
    /// Embed a batch into a `[B, N, D]` tensor.
    fn embed(&self, batch: &[FixedSequence]) -> Result<Tensor>;
}

/// Reject sequences of the wrong length and ids outside the embedding table.
/// Out-of-range errors carry the index of the offending sequence in `batch`.
pub fn check_batch(batch: &[FixedSequence], seq_len: usize, vocab_size: usize) -> Result<()> {
    for (i, seq) in batch.iter().enumerate() {
        if seq.len() != seq_len {
            return Err(Error::InvalidConfig(format!("sequence {i} has length {} but the model expects {seq_len}", seq.len())));
        }
        if let Some(&id) = seq.ids().iter().find(|&&id| id as usize >= vocab_size) {
            return Err(Error::OutOfRangeToken { row: Some(i), id, vocab_size });
        }
    }
    Ok(())
}

/// Stack a batch into a `[B, N]` u32 tensor.
pub fn batch_tensor(batch: &[FixedSequence], device: &Device) -> Result<Tensor> {
    let seq_len = batch.first().map(|s| s.len()).unwrap_or(0);
    let ids: Vec<u32> = batch.iter().flat_map(|s| s.ids().iter().copied()).collect();
    Tensor::from_vec(ids, (batch.len(), seq_len), device).map_err(model_err)
}

pub(crate) fn model_err(e: candle_core::Error) -> Error {
    Error::Model(e.to_string())
}
