//! Tokenizer provider for log lines.
//!
//! Two variants share one `encode`/`save`/`load` surface:
//! - [`LogTokenizer::word`]: closed word-level vocabulary, usable immediately.
//! - [`LogTokenizer::subword`]: BPE whose vocabulary is induced from a corpus
//!   by [`LogTokenizer::train`] before it can encode.
//!
//! Saved artifacts are the `tokenizers` JSON format, which records the model
//! type, vocabulary and special tokens, so [`LogTokenizer::load`] needs no
//! other parameters.

use std::path::Path;

use tokenizers::models::bpe::{BpeTrainerBuilder, BPE};
use tokenizers::models::wordlevel::WordLevel;
use tokenizers::models::{ModelWrapper, TrainerWrapper};
use tokenizers::pre_tokenizers::whitespace::Whitespace;
use tokenizers::pre_tokenizers::PreTokenizerWrapper;
use tokenizers::{AddedToken, Tokenizer};
use tracing::{debug, info};

use logvec_core::config::{TokenizerConfig, PAD_TOKEN, UNK_TOKEN};
use logvec_core::error::{Error, Result};
use logvec_core::types::TokenSequence;

pub mod vocab;

fn tok_err(e: tokenizers::Error) -> Error { Error::Tokenizer(e.to_string()) }

/// Parameters for inducing a sub-word vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainerConfig {
    /// Upper bound on the induced vocabulary, specials included.
    pub vocab_size: usize,
    /// Minimum occurrence count for a merge to be admitted.
    pub min_frequency: u64,
    /// Reserved tokens, assigned the lowest ids in this order.
    pub special_tokens: Vec<String>,
    pub show_progress: bool,
}

impl TrainerConfig {
    fn build(&self) -> TrainerWrapper {
        let specials = self.special_tokens.iter().map(|t| AddedToken::from(t.clone(), true)).collect();
        BpeTrainerBuilder::new()
            .show_progress(self.show_progress)
            .vocab_size(self.vocab_size)
            .min_frequency(self.min_frequency)
            .special_tokens(specials)
            .build()
            .into()
    }
}

impl From<&TokenizerConfig> for TrainerConfig {
    fn from(cfg: &TokenizerConfig) -> Self {
        Self { vocab_size: cfg.vocab_size, min_frequency: cfg.min_frequency, special_tokens: cfg.special_tokens.clone(), show_progress: false }
    }
}

pub enum LogTokenizer {
    WordLevel(Tokenizer),
    Subword { inner: Tokenizer, trained: bool },
}

impl LogTokenizer {
    /// Word-level tokenizer over a fixed vocabulary; unseen words map to `[UNK]`.
    pub fn word() -> Result<Self> {
        let model = WordLevel::builder()
            .vocab(vocab::word_vocab())
            .unk_token(UNK_TOKEN.to_string())
            .build()
            .map_err(tok_err)?;
        let mut inner = Tokenizer::new(ModelWrapper::WordLevel(model));
        inner.with_pre_tokenizer(PreTokenizerWrapper::from(Whitespace {}));
        Ok(Self::WordLevel(inner))
    }

    /// Untrained BPE tokenizer plus the trainer parameters to fit it with.
    pub fn subword(vocab_size: usize, min_frequency: u64, specials: &[String]) -> Result<(Self, TrainerConfig)> {
        let model = BPE::builder().unk_token(UNK_TOKEN.to_string()).build().map_err(tok_err)?;
        let mut inner = Tokenizer::new(ModelWrapper::BPE(model));
        inner.with_pre_tokenizer(PreTokenizerWrapper::from(Whitespace {}));
        let trainer = TrainerConfig { vocab_size, min_frequency, special_tokens: specials.to_vec(), show_progress: false };
        Ok((Self::Subword { inner, trained: false }, trainer))
    }

    pub fn subword_from_config(cfg: &TokenizerConfig) -> Result<(Self, TrainerConfig)> {
        Self::subword(cfg.vocab_size, cfg.min_frequency, &cfg.special_tokens)
    }

    /// Fit the vocabulary on `corpus`. Word-level tokenizers are returned
    /// unchanged. Fails on a corpus with no non-blank text.
    pub fn train<S>(self, trainer: &TrainerConfig, corpus: &[S]) -> Result<Self>
    where
        S: AsRef<str> + Sync,
    {
        if corpus.iter().all(|t| t.as_ref().trim().is_empty()) {
            return Err(Error::UntrainableCorpus);
        }
        match self {
            Self::WordLevel(_) => {
                debug!("word-level tokenizer has a fixed vocabulary; skipping training");
                Ok(self)
            }
            Self::Subword { mut inner, .. } => {
                let mut wrapper = trainer.build();
                inner.train(&mut wrapper, corpus.iter().map(|s| s.as_ref())).map_err(tok_err)?;
                info!(docs = corpus.len(), vocab = inner.get_vocab_size(true), "trained BPE tokenizer");
                Ok(Self::Subword { inner, trained: true })
            }
        }
    }

    fn ready(&self) -> Result<&Tokenizer> {
        match self {
            Self::WordLevel(inner) => Ok(inner),
            Self::Subword { inner, trained: true } => Ok(inner),
            Self::Subword { trained: false, .. } => Err(Error::TokenizerNotTrained),
        }
    }

    pub fn encode(&self, text: &str) -> Result<TokenSequence> {
        let enc = self.ready()?.encode(text, false).map_err(tok_err)?;
        Ok(TokenSequence::from(enc.get_ids().to_vec()))
    }

    /// Encode many texts at once; output order matches `texts`.
    pub fn encode_batch(&self, texts: &[&str]) -> Result<Vec<TokenSequence>> {
        let encodings = self.ready()?.encode_batch(texts.to_vec(), false).map_err(tok_err)?;
        Ok(encodings.iter().map(|e| TokenSequence::from(e.get_ids().to_vec())).collect())
    }

    /// Write the tokenizer JSON to `path` via a temporary sibling and rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        let inner = self.ready()?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;
        let tmp = tempfile::Builder::new().prefix(".tokenizer").suffix(".json").tempfile_in(dir)?;
        inner.save(tmp.path(), false).map_err(tok_err)?;
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;
        info!(path = %path.display(), kind = self.kind(), "saved tokenizer");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::InputNotFound { path: path.to_path_buf() });
        }
        let inner = Tokenizer::from_file(path)
            .map_err(|e| Error::Tokenizer(format!("failed to load {}: {}", path.display(), e)))?;
        let tokenizer = match inner.get_model() {
            ModelWrapper::WordLevel(_) => Self::WordLevel(inner),
            ModelWrapper::BPE(_) => Self::Subword { inner, trained: true },
            _ => return Err(Error::Tokenizer(format!("{}: unsupported tokenizer model", path.display()))),
        };
        info!(path = %path.display(), kind = tokenizer.kind(), vocab = tokenizer.vocab_size(), "loaded tokenizer");
        Ok(tokenizer)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::WordLevel(_) => "word-level",
            Self::Subword { .. } => "bpe",
        }
    }

    pub fn is_trained(&self) -> bool {
        !matches!(self, Self::Subword { trained: false, .. })
    }

    fn inner(&self) -> &Tokenizer {
        match self {
            Self::WordLevel(inner) | Self::Subword { inner, .. } => inner,
        }
    }

    /// Vocabulary size including added special tokens.
    pub fn vocab_size(&self) -> usize { self.inner().get_vocab_size(true) }

    pub fn pad_id(&self) -> u32 { self.inner().token_to_id(PAD_TOKEN).unwrap_or(0) }

    pub fn token_to_id(&self, token: &str) -> Option<u32> { self.inner().token_to_id(token) }
}
