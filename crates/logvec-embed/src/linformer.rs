//! Linformer-style encoder: token + position embeddings followed by `depth`
//! pre-norm layers whose attention projects keys and values from N positions
//! down to `dim_k`, then a final layer norm. Output is `[B, N, emb_dim]`.
//!
//! Weights are either generated from a seed or loaded from a directory
//! holding `config.json` and `model.safetensors`.

use std::collections::HashMap;
use std::path::Path;

use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{embedding, layer_norm, linear, Embedding, LayerNorm, Linear, VarBuilder};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::info;

use logvec_core::config::ModelConfig;
use logvec_core::error::{Error, Result};
use logvec_core::types::FixedSequence;

use crate::provider::{batch_tensor, check_batch, model_err, EmbeddingProvider};

pub const CONFIG_FILE: &str = "config.json";
pub const WEIGHTS_FILE: &str = "model.safetensors";

const LN_EPS: f64 = 1e-5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinformerConfig {
    pub vocab_size: usize,
    pub seq_len: usize,
    pub emb_dim: usize,
    pub depth: usize,
    pub heads: usize,
    pub dim_k: usize,
    pub dim_ff: usize,
    /// Training-time only; inference never applies dropout.
    pub dropout: f32,
    pub dropout_ff: f32,
}

impl LinformerConfig {
    pub fn new(model: &ModelConfig, seq_len: usize) -> Self {
        Self {
            vocab_size: model.vocab_size,
            seq_len,
            emb_dim: model.emb_dim,
            depth: model.depth,
            heads: model.heads,
            dim_k: model.dim_k,
            dim_ff: model.dim_ff,
            dropout: model.dropout,
            dropout_ff: model.dropout_ff,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.heads == 0 || self.emb_dim % self.heads != 0 {
            return Err(Error::InvalidConfig(format!("emb_dim {} is not divisible by heads {}", self.emb_dim, self.heads)));
        }
        if self.seq_len == 0 || self.dim_k == 0 || self.vocab_size == 0 {
            return Err(Error::InvalidConfig("seq_len, dim_k and vocab_size must be non-zero".into()));
        }
        Ok(())
    }
}

struct Attention {
    q: Linear,
    k: Linear,
    v: Linear,
    out: Linear,
    proj_e: Tensor,
    proj_f: Tensor,
    heads: usize,
    head_dim: usize,
    dim_k: usize,
}

impl Attention {
    fn new(cfg: &LinformerConfig, vb: VarBuilder) -> candle_core::Result<Self> {
        let d = cfg.emb_dim;
        Ok(Self {
            q: linear(d, d, vb.pp("q"))?,
            k: linear(d, d, vb.pp("k"))?,
            v: linear(d, d, vb.pp("v"))?,
            out: linear(d, d, vb.pp("out"))?,
            proj_e: vb.get((cfg.dim_k, cfg.seq_len), "proj_e")?,
            proj_f: vb.get((cfg.dim_k, cfg.seq_len), "proj_f")?,
            heads: cfg.heads,
            head_dim: d / cfg.heads,
            dim_k: cfg.dim_k,
        })
    }

    // [B, N, D] -> [B, H, len, head_dim]
    fn split_heads(&self, x: &Tensor, len: usize) -> candle_core::Result<Tensor> {
        let b = x.dim(0)?;
        x.reshape((b, len, self.heads, self.head_dim))?.transpose(1, 2)?.contiguous()
    }

    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        let (b, n, d) = x.dims3()?;
        let q = self.q.forward(x)?;
        let k = self.k.forward(x)?;
        let v = self.v.forward(x)?;

        // Project the sequence axis: [dim_k, N] x [B, N, D] -> [B, dim_k, D]
        let e = self.proj_e.unsqueeze(0)?.broadcast_as((b, self.dim_k, n))?.contiguous()?;
        let f = self.proj_f.unsqueeze(0)?.broadcast_as((b, self.dim_k, n))?.contiguous()?;
        let k = e.matmul(&k)?;
        let v = f.matmul(&v)?;

        let q = self.split_heads(&q, n)?;
        let k = self.split_heads(&k, self.dim_k)?;
        let v = self.split_heads(&v, self.dim_k)?;

        let scale = (self.head_dim as f64).sqrt();
        let scores = (q.matmul(&k.t()?.contiguous()?)? / scale)?;
        let weights = candle_nn::ops::softmax_last_dim(&scores)?;
        let ctx = weights.matmul(&v)?.transpose(1, 2)?.contiguous()?.reshape((b, n, d))?;
        self.out.forward(&ctx)
    }
}

struct EncoderLayer {
    ln_attn: LayerNorm,
    attn: Attention,
    ln_ff: LayerNorm,
    ff_in: Linear,
    ff_out: Linear,
}

impl EncoderLayer {
    fn new(cfg: &LinformerConfig, vb: VarBuilder) -> candle_core::Result<Self> {
        Ok(Self {
            ln_attn: layer_norm(cfg.emb_dim, LN_EPS, vb.pp("ln_attn"))?,
            attn: Attention::new(cfg, vb.pp("attn"))?,
            ln_ff: layer_norm(cfg.emb_dim, LN_EPS, vb.pp("ln_ff"))?,
            ff_in: linear(cfg.emb_dim, cfg.dim_ff, vb.pp("ff_in"))?,
            ff_out: linear(cfg.dim_ff, cfg.emb_dim, vb.pp("ff_out"))?,
        })
    }

    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        let h = (x + self.attn.forward(&self.ln_attn.forward(x)?)?)?;
        let ff = self.ff_out.forward(&self.ff_in.forward(&self.ln_ff.forward(&h)?)?.gelu_erf()?)?;
        h + ff
    }
}

pub struct LinformerEncoder {
    config: LinformerConfig,
    tok: Embedding,
    pos: Tensor,
    layers: Vec<EncoderLayer>,
    norm: LayerNorm,
    weights: HashMap<String, Tensor>,
    device: Device,
}

impl LinformerEncoder {
    /// Build with weights drawn from a seeded RNG; the same seed and config
    /// always give the same weights.
    pub fn from_seed(config: LinformerConfig, seed: u64, device: &Device) -> Result<Self> {
        config.validate()?;
        let weights = init_weights(&config, seed, device).map_err(model_err)?;
        Self::from_weights(config, weights, device)
    }

    pub fn from_weights(config: LinformerConfig, weights: HashMap<String, Tensor>, device: &Device) -> Result<Self> {
        config.validate()?;
        let vb = VarBuilder::from_tensors(weights.clone(), DType::F32, device);
        let build = || -> candle_core::Result<_> {
            let tok = embedding(config.vocab_size, config.emb_dim, vb.pp("tok"))?;
            let pos = vb.pp("pos").get((config.seq_len, config.emb_dim), "weight")?;
            let layers = (0..config.depth)
                .map(|i| EncoderLayer::new(&config, vb.pp(format!("layers.{i}"))))
                .collect::<candle_core::Result<Vec<_>>>()?;
            let norm = layer_norm(config.emb_dim, LN_EPS, vb.pp("norm"))?;
            Ok((tok, pos, layers, norm))
        };
        let (tok, pos, layers, norm) = build().map_err(model_err)?;
        Ok(Self { config, tok, pos, layers, norm, weights, device: device.clone() })
    }

    /// Load `config.json` + `model.safetensors` from `dir`.
    pub fn load_dir(dir: &Path, device: &Device) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE);
        let raw = std::fs::read_to_string(&config_path)?;
        let config: LinformerConfig = serde_json::from_str(&raw)
            .map_err(|e| Error::InvalidConfig(format!("{}: {}", config_path.display(), e)))?;
        let weights = candle_core::safetensors::load(dir.join(WEIGHTS_FILE), device).map_err(model_err)?;
        info!(dir = %dir.display(), "loaded Linformer weights");
        Self::from_weights(config, weights, device)
    }

    pub fn save_dir(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let json = serde_json::to_string_pretty(&self.config).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        std::fs::write(dir.join(CONFIG_FILE), json)?;
        candle_core::safetensors::save(&self.weights, dir.join(WEIGHTS_FILE)).map_err(model_err)?;
        info!(dir = %dir.display(), "saved Linformer weights");
        Ok(())
    }

    pub fn config(&self) -> &LinformerConfig { &self.config }

    /// `[B, N]` token ids to `[B, N, emb_dim]` hidden states.
    pub fn forward(&self, ids: &Tensor) -> Result<Tensor> {
        self.hidden_states(ids).map_err(model_err)
    }

    fn hidden_states(&self, ids: &Tensor) -> candle_core::Result<Tensor> {
        let mut x = self.tok.forward(ids)?.broadcast_add(&self.pos)?;
        for layer in &self.layers {
            x = layer.forward(&x)?;
        }
        self.norm.forward(&x)
    }
}

impl EmbeddingProvider for LinformerEncoder {
    fn dim(&self) -> usize { self.config.emb_dim }
    fn seq_len(&self) -> usize { self.config.seq_len }
    fn vocab_size(&self) -> usize { self.config.vocab_size }

    fn embed(&self, batch: &[FixedSequence]) -> Result<Tensor> {
        check_batch(batch, self.config.seq_len, self.config.vocab_size)?;
        let ids = batch_tensor(batch, &self.device)?;
        self.forward(&ids)
    }
}

fn uniform(rng: &mut StdRng, dims: &[usize], bound: f32, device: &Device) -> candle_core::Result<Tensor> {
    let n: usize = dims.iter().product();
    let data: Vec<f32> = (0..n).map(|_| rng.gen_range(-bound..bound)).collect();
    Tensor::from_vec(data, dims, device)
}

fn linear_params(w: &mut HashMap<String, Tensor>, rng: &mut StdRng, name: &str, fan_in: usize, fan_out: usize, device: &Device) -> candle_core::Result<()> {
    let bound = 1.0 / (fan_in as f32).sqrt();
    w.insert(format!("{name}.weight"), uniform(rng, &[fan_out, fan_in], bound, device)?);
    w.insert(format!("{name}.bias"), uniform(rng, &[fan_out], bound, device)?);
    Ok(())
}

fn norm_params(w: &mut HashMap<String, Tensor>, name: &str, dim: usize, device: &Device) -> candle_core::Result<()> {
    w.insert(format!("{name}.weight"), Tensor::ones(dim, DType::F32, device)?);
    w.insert(format!("{name}.bias"), Tensor::zeros(dim, DType::F32, device)?);
    Ok(())
}

// Parameters are drawn in a fixed order so a seed always yields the same model.
fn init_weights(cfg: &LinformerConfig, seed: u64, device: &Device) -> candle_core::Result<HashMap<String, Tensor>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut w = HashMap::new();
    let d = cfg.emb_dim;

    w.insert("tok.weight".to_string(), uniform(&mut rng, &[cfg.vocab_size, d], 1.0, device)?);
    w.insert("pos.weight".to_string(), uniform(&mut rng, &[cfg.seq_len, d], 0.1, device)?);
    for i in 0..cfg.depth {
        let p = format!("layers.{i}");
        norm_params(&mut w, &format!("{p}.ln_attn"), d, device)?;
        for proj in ["q", "k", "v", "out"] {
            linear_params(&mut w, &mut rng, &format!("{p}.attn.{proj}"), d, d, device)?;
        }
        let bound = 1.0 / (cfg.seq_len as f32).sqrt();
        w.insert(format!("{p}.attn.proj_e"), uniform(&mut rng, &[cfg.dim_k, cfg.seq_len], bound, device)?);
        w.insert(format!("{p}.attn.proj_f"), uniform(&mut rng, &[cfg.dim_k, cfg.seq_len], bound, device)?);
        norm_params(&mut w, &format!("{p}.ln_ff"), d, device)?;
        linear_params(&mut w, &mut rng, &format!("{p}.ff_in"), d, cfg.dim_ff, device)?;
        linear_params(&mut w, &mut rng, &format!("{p}.ff_out"), cfg.dim_ff, d, device)?;
    }
    norm_params(&mut w, "norm", d, device)?;
    Ok(w)
}
