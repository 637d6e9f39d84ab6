//! Domain types flowing through the vectorization pipeline.

use serde::{Deserialize, Serialize};

/// One input unit: a line of text and its position in the source table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub row: usize,
    pub text: String,
}

/// Variable-length token ids produced by a tokenizer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenSequence(pub Vec<u32>);

impl TokenSequence {
    pub fn ids(&self) -> &[u32] { &self.0 }
    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl From<Vec<u32>> for TokenSequence {
    fn from(ids: Vec<u32>) -> Self { Self(ids) }
}

/// Token ids normalized to an exact length.
///
/// Only constructed through [`FixedSequence::normalize`], so `len()` always
/// equals the requested length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedSequence(Vec<u32>);

impl FixedSequence {
    /// Truncate `seq` to its first `target_len` ids, or right-pad it with
    /// `pad_id` up to `target_len`.
    pub fn normalize(seq: &TokenSequence, target_len: usize, pad_id: u32) -> Self {
        let mut ids: Vec<u32> = seq.ids().iter().copied().take(target_len).collect();
        ids.resize(target_len, pad_id);
        Self(ids)
    }

    pub fn ids(&self) -> &[u32] { &self.0 }
    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

/// A pooled embedding paired with the text it was computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRow {
    pub text: String,
    pub vector: Vec<f32>,
}
