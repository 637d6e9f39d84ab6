//! Batch vectorization of log records.
//!
//! A run moves through four stages and stops at the first error:
//! load the input table, prepare the tokenizer (train + save, or load),
//! vectorize every record in input order, persist the `(text, vector)` table.

use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use logvec_core::config::{PipelineConfig, Settings, TokenizerConfig, TokenizerMode};
use logvec_core::error::{Error, Result, Stage};
use logvec_core::types::{FixedSequence, Record, VectorRow};
use logvec_embed::{build_provider, pool_rows, EmbeddingProvider};
use logvec_tokenize::LogTokenizer;

pub mod input;
pub mod schema;
pub mod writer;

pub use writer::{read_vectors, write_parquet};

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub rows: usize,
    pub dim: usize,
    pub output_path: PathBuf,
    pub tokenizer_kind: &'static str,
    pub tokenizer_path: Option<PathBuf>,
    pub vocab_size: usize,
}

pub struct VectorizePipeline {
    config: PipelineConfig,
    tokenizer_config: TokenizerConfig,
    embedder: Box<dyn EmbeddingProvider>,
}

impl VectorizePipeline {
    pub fn new(config: PipelineConfig, tokenizer_config: TokenizerConfig, embedder: Box<dyn EmbeddingProvider>) -> Result<Self> {
        if embedder.seq_len() != config.max_len {
            return Err(Error::InvalidConfig(format!(
                "embedding model expects sequences of {} ids but max_len is {}",
                embedder.seq_len(),
                config.max_len
            )));
        }
        if config.batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be greater than zero".into()));
        }
        Ok(Self { config, tokenizer_config, embedder })
    }

    /// Build the configured embedding provider and wrap it in a pipeline.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        settings.validate()?;
        let embedder = build_provider(&settings.model, settings.pipeline.max_len)?;
        Self::new(settings.pipeline.clone(), settings.tokenizer.clone(), embedder)
    }

    pub fn config(&self) -> &PipelineConfig { &self.config }

    pub fn run(&self) -> Result<RunReport> {
        info!(input = %self.config.input_path.display(), output = %self.config.output_path.display(), mode = ?self.config.mode, "starting vectorization run");
        let records = self.load()?;
        let tokenizer = self.prepare_tokenizer(&records)?;
        let rows = self.vectorize(&records, &tokenizer)?;
        self.persist(&rows)?;
        Ok(RunReport {
            rows: rows.len(),
            dim: self.embedder.dim(),
            output_path: self.config.output_path.clone(),
            tokenizer_kind: tokenizer.kind(),
            tokenizer_path: match self.config.mode {
                TokenizerMode::Word => None,
                _ => self.config.tokenizer_path.clone(),
            },
            vocab_size: tokenizer.vocab_size(),
        })
    }

    pub fn load(&self) -> Result<Vec<Record>> {
        input::load_records(&self.config.input_path, &self.config.text_column, self.config.input_format).map_err(|e| e.in_stage(Stage::Load))
    }

    /// Obtain the tokenizer for this run according to the configured mode.
    /// Training runs over every loaded record and saves the result before
    /// any vectorization starts.
    pub fn prepare_tokenizer(&self, records: &[Record]) -> Result<LogTokenizer> {
        let tokenizer = match self.config.mode {
            TokenizerMode::Word => LogTokenizer::word().map_err(|e| e.in_stage(Stage::Train))?,
            TokenizerMode::Train => self.train_tokenizer(records, self.tokenizer_path()?)?,
            TokenizerMode::Load => LogTokenizer::load(self.tokenizer_path()?).map_err(|e| e.in_stage(Stage::Load))?,
            TokenizerMode::Auto => {
                let path = self.tokenizer_path()?;
                if path.exists() {
                    LogTokenizer::load(path).map_err(|e| e.in_stage(Stage::Load))?
                } else {
                    self.train_tokenizer(records, path)?
                }
            }
        };
        if tokenizer.vocab_size() > self.embedder.vocab_size() {
            warn!(
                tokenizer_vocab = tokenizer.vocab_size(),
                model_vocab = self.embedder.vocab_size(),
                "tokenizer vocabulary is larger than the embedding table; high ids will be rejected"
            );
        }
        Ok(tokenizer)
    }

    fn tokenizer_path(&self) -> Result<&Path> {
        self.config
            .tokenizer_path
            .as_deref()
            .ok_or_else(|| Error::InvalidConfig(format!("tokenizer_path is required in {:?} mode", self.config.mode)).in_stage(Stage::Train))
    }

    fn train_tokenizer(&self, records: &[Record], path: &Path) -> Result<LogTokenizer> {
        let train = || -> Result<LogTokenizer> {
            let (tokenizer, trainer) = LogTokenizer::subword_from_config(&self.tokenizer_config)?;
            let corpus: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
            let tokenizer = tokenizer.train(&trainer, &corpus)?;
            tokenizer.save(path)?;
            Ok(tokenizer)
        };
        train().map_err(|e| e.in_stage(Stage::Train))
    }

    /// Encode, normalize, embed and pool every record, `batch_size` at a time.
    /// The returned rows are in input order.
    pub fn vectorize(&self, records: &[Record], tokenizer: &LogTokenizer) -> Result<Vec<VectorRow>> {
        let pb = ProgressBar::new(records.len() as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} records ({percent}%) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        pb.set_style(style);

        let pad_id = tokenizer.pad_id();
        let every = self.config.progress_every.max(1);
        let mut rows = Vec::with_capacity(records.len());
        for chunk in records.chunks(self.config.batch_size) {
            let vectors = self.vectorize_batch(chunk, tokenizer, pad_id).map_err(|e| e.in_stage(Stage::Vectorize))?;
            let before = rows.len();
            rows.extend(chunk.iter().zip(vectors).map(|(record, vector)| VectorRow { text: record.text.clone(), vector }));
            pb.inc(chunk.len() as u64);
            if rows.len() / every > before / every {
                info!(processed = rows.len(), total = records.len(), "vectorizing");
            }
        }
        pb.finish_and_clear();
        info!(rows = rows.len(), dim = self.embedder.dim(), "vectorized all records");
        Ok(rows)
    }

    fn vectorize_batch(&self, chunk: &[Record], tokenizer: &LogTokenizer, pad_id: u32) -> Result<Vec<Vec<f32>>> {
        let first_row = chunk.first().map(|r| r.row).unwrap_or(0);
        let texts: Vec<&str> = chunk.iter().map(|r| r.text.as_str()).collect();
        let fixed: Vec<FixedSequence> = tokenizer
            .encode_batch(&texts)?
            .iter()
            .map(|seq| FixedSequence::normalize(seq, self.config.max_len, pad_id))
            .collect();
        let hidden = self.embedder.embed(&fixed).map_err(|e| e.offset_row(first_row))?;
        pool_rows(&hidden)
    }

    pub fn persist(&self, rows: &[VectorRow]) -> Result<()> {
        write_parquet(&self.config.output_path, rows, self.embedder.dim()).map_err(|e| e.in_stage(Stage::Persist))
    }
}
