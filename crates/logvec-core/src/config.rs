//! Configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults, `config.toml`, `config.<env>.toml`
//! and `APP_*` env vars (`__` separates nested keys, e.g.
//! `APP_PIPELINE__MAX_LEN=512`). Also provides helpers to expand `~` and
//! `${VAR}` and to resolve relative paths against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const PAD_TOKEN: &str = "[PAD]";
pub const UNK_TOKEN: &str = "[UNK]";
pub const CLS_TOKEN: &str = "[CLS]";
pub const SEP_TOKEN: &str = "[SEP]";
pub const MASK_TOKEN: &str = "[MASK]";

/// How the pipeline obtains its tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenizerMode {
    /// Fixed word-level vocabulary, nothing to train or persist.
    Word,
    /// Train a sub-word tokenizer on the input corpus and save it.
    Train,
    /// Load a previously saved tokenizer.
    Load,
    /// Load when the tokenizer file exists, otherwise train and save.
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    Csv,
    Lines,
    /// `.csv` files are read as CSV, anything else as one log line per row.
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Linformer,
    Hashed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Cpu,
    Metal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub tokenizer_path: Option<PathBuf>,
    pub mode: TokenizerMode,
    pub max_len: usize,
    pub batch_size: usize,
    pub progress_every: usize,
    pub text_column: String,
    pub input_format: InputFormat,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("data/logs.csv"),
            output_path: PathBuf::from("data/vectors.parquet"),
            tokenizer_path: Some(PathBuf::from("models/tokenizer.json")),
            mode: TokenizerMode::Train,
            max_len: 700,
            batch_size: 32,
            progress_every: 1000,
            text_column: "text".to_string(),
            input_format: InputFormat::Auto,
        }
    }
}

impl PipelineConfig {
    /// Build from the external option bundle: `train` selects between
    /// training a sub-word tokenizer (saved to `tokenizer_path`) and loading it.
    pub fn from_options(train: bool, tokenizer_path: impl Into<PathBuf>, input_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>, max_len: usize) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
            tokenizer_path: Some(tokenizer_path.into()),
            mode: if train { TokenizerMode::Train } else { TokenizerMode::Load },
            max_len,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenizerConfig {
    pub vocab_size: usize,
    pub min_frequency: u64,
    pub special_tokens: Vec<String>,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            vocab_size: 30_000,
            min_frequency: 2,
            special_tokens: [PAD_TOKEN, UNK_TOKEN, CLS_TOKEN, SEP_TOKEN, MASK_TOKEN].iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Shape of the embedding model. The sequence length is not part of it: the
/// model is always built for the pipeline's `max_len`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub kind: ModelKind,
    pub vocab_size: usize,
    pub emb_dim: usize,
    pub depth: usize,
    pub heads: usize,
    pub dim_k: usize,
    pub dim_ff: usize,
    pub dropout: f32,
    pub dropout_ff: f32,
    pub seed: u64,
    pub weights_dir: Option<PathBuf>,
    pub device: DeviceKind,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            kind: ModelKind::Linformer,
            vocab_size: 30_000,
            emb_dim: 128,
            depth: 2,
            heads: 4,
            dim_k: 128,
            dim_ff: 128,
            dropout: 0.1,
            dropout_ff: 0.15,
            seed: 42,
            weights_dir: None,
            device: DeviceKind::Cpu,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub pipeline: PipelineConfig,
    pub tokenizer: TokenizerConfig,
    pub model: ModelConfig,
}

impl Settings {
    /// Defaults overridden by the external option bundle. `vocab_size` sizes
    /// both the tokenizer vocabulary and the model's embedding table.
    pub fn from_options(
        train: bool,
        tokenizer_path: impl Into<PathBuf>,
        input_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        max_len: usize,
        vocab_size: usize,
    ) -> Self {
        let mut settings = Self {
            pipeline: PipelineConfig::from_options(train, tokenizer_path, input_path, output_path, max_len),
            ..Self::default()
        };
        settings.set_vocab_size(vocab_size);
        settings
    }

    pub fn set_vocab_size(&mut self, vocab_size: usize) {
        self.tokenizer.vocab_size = vocab_size;
        self.model.vocab_size = vocab_size;
    }

    /// Expand `~`/`$VAR` in every configured path and anchor relative paths at `base`.
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        let resolve = |p: &Path| resolve_with_base(base, p.to_string_lossy());
        self.pipeline.input_path = resolve(&self.pipeline.input_path);
        self.pipeline.output_path = resolve(&self.pipeline.output_path);
        self.pipeline.tokenizer_path = self.pipeline.tokenizer_path.as_deref().map(resolve);
        self.model.weights_dir = self.model.weights_dir.as_deref().map(resolve);
        self
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_from(Path::new("."), &env_name)
    }

    /// Load config files from `dir` for the given environment name.
    pub fn load_from(dir: &Path, env_name: &str) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file(dir.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("failed to get '{key}': {e}")))
    }

    pub fn settings(&self) -> Result<Settings> {
        self.figment.extract().map_err(|e| Error::InvalidConfig(e.to_string()))
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.max_len == 0 {
            return Err(Error::InvalidConfig("pipeline.max_len must be greater than zero".into()));
        }
        if self.pipeline.batch_size == 0 {
            return Err(Error::InvalidConfig("pipeline.batch_size must be greater than zero".into()));
        }
        if self.model.heads == 0 || self.model.emb_dim % self.model.heads != 0 {
            return Err(Error::InvalidConfig(format!(
                "model.emb_dim ({}) must be divisible by model.heads ({})",
                self.model.emb_dim, self.model.heads
            )));
        }
        if self.tokenizer.vocab_size > self.model.vocab_size {
            return Err(Error::InvalidConfig(format!(
                "tokenizer.vocab_size ({}) exceeds model.vocab_size ({})",
                self.tokenizer.vocab_size, self.model.vocab_size
            )));
        }
        Ok(())
    }
}

/// Tilde and `$VAR`/`${VAR}` expansion. An unset variable leaves the
/// `$` text in place; the result is never canonicalized.
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let raw = input.as_ref();
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.into_owned()),
        Err(_) => PathBuf::from(shellexpand::tilde(raw).into_owned()),
    }
}

/// [`expand_path`], then anchored at `base` unless already absolute.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let expanded = expand_path(p);
    if expanded.is_relative() {
        base.join(expanded)
    } else {
        expanded
    }
}
