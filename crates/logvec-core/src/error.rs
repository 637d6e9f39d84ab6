use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// The step of a pipeline run an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Train,
    Vectorize,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Train => "train",
            Stage::Vectorize => "vectorize",
            Stage::Persist => "persist",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("load: input not found: {}", path.display())]
    InputNotFound { path: PathBuf },

    #[error("load: {}: missing required column '{column}'", path.display())]
    Schema { path: PathBuf, column: String },

    #[error("load: {}: row {row}: {message}", path.display())]
    MalformedInput { path: PathBuf, row: usize, message: String },

    #[error("train: cannot train a tokenizer on an empty corpus")]
    UntrainableCorpus,

    #[error("vectorize: tokenizer has not been trained")]
    TokenizerNotTrained,

    #[error("vectorize: {}token id {id} is outside the embedding table (size {vocab_size})", row.map(|r| format!("row {r}: ")).unwrap_or_default())]
    OutOfRangeToken { row: Option<usize>, id: u32, vocab_size: usize },

    #[error("persist: failed to write {}: {message}", path.display())]
    OutputWrite { path: PathBuf, message: String },

    #[error("tokenizer: {0}")]
    Tokenizer(String),

    #[error("model: {0}")]
    Model(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{stage}: {source}")]
    Staged { stage: Stage, source: Box<Error> },
}

impl Error {
    /// Stage this error is attributed to, if it carries one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::InputNotFound { .. } | Error::Schema { .. } | Error::MalformedInput { .. } => Some(Stage::Load),
            Error::UntrainableCorpus => Some(Stage::Train),
            Error::TokenizerNotTrained | Error::OutOfRangeToken { .. } => Some(Stage::Vectorize),
            Error::OutputWrite { .. } => Some(Stage::Persist),
            Error::Staged { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Attach `stage` unless the error already names one.
    pub fn in_stage(self, stage: Stage) -> Self {
        if self.stage().is_some() {
            self
        } else {
            Error::Staged { stage, source: Box::new(self) }
        }
    }

    /// Shift a batch-relative row index by the batch's first input row.
    pub fn offset_row(self, offset: usize) -> Self {
        match self {
            Error::OutOfRangeToken { row: Some(row), id, vocab_size } => Error::OutOfRangeToken { row: Some(offset + row), id, vocab_size },
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
