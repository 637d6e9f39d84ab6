use candle_core::Device;
use tempfile::TempDir;

use logvec_core::config::{ModelConfig, ModelKind, Settings};
use logvec_core::types::{FixedSequence, TokenSequence};
use logvec_core::Error;
use logvec_embed::{build_provider, pool_rows, EmbeddingProvider, HashedEmbedder, LinformerConfig, LinformerEncoder};

fn tiny_config(seq_len: usize) -> LinformerConfig {
    LinformerConfig { vocab_size: 64, seq_len, emb_dim: 16, depth: 2, heads: 4, dim_k: 4, dim_ff: 32, dropout: 0.1, dropout_ff: 0.15 }
}

fn fixed(ids: &[u32], len: usize) -> FixedSequence {
    FixedSequence::normalize(&TokenSequence::from(ids.to_vec()), len, 0)
}

fn all_finite(rows: &[Vec<f32>]) -> bool {
    rows.iter().flatten().all(|x| x.is_finite())
}

#[test]
fn hashed_embedder_shapes_and_determinism() -> anyhow::Result<()> {
    let embedder = HashedEmbedder::new(100, 8, 32, 7);
    let batch = vec![fixed(&[5, 6, 7], 8), fixed(&[5, 6, 7], 8), fixed(&[9], 8)];
    let hidden = embedder.embed(&batch)?;
    assert_eq!(hidden.dims(), &[3, 8, 32]);

    let rows = pool_rows(&hidden)?;
    assert_eq!(rows[0], rows[1], "same ids give identical vectors");
    assert_ne!(rows[0], rows[2]);
    assert!(all_finite(&rows));
    Ok(())
}

#[test]
fn linformer_output_has_declared_shape() -> anyhow::Result<()> {
    let encoder = LinformerEncoder::from_seed(tiny_config(12), 42, &Device::Cpu)?;
    assert_eq!(encoder.dim(), 16);
    assert_eq!(encoder.seq_len(), 12);

    let batch = vec![fixed(&[1, 2, 3], 12), fixed(&[10, 20, 30, 40, 50], 12)];
    let hidden = encoder.embed(&batch)?;
    assert_eq!(hidden.dims(), &[2, 12, 16]);

    let rows = pool_rows(&hidden)?;
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.len() == 16));
    assert!(all_finite(&rows));
    Ok(())
}

#[test]
fn same_seed_gives_identical_vectors() -> anyhow::Result<()> {
    let batch = vec![fixed(&[3, 1, 4, 1, 5], 10)];
    let a = LinformerEncoder::from_seed(tiny_config(10), 9, &Device::Cpu)?;
    let b = LinformerEncoder::from_seed(tiny_config(10), 9, &Device::Cpu)?;
    let c = LinformerEncoder::from_seed(tiny_config(10), 10, &Device::Cpu)?;

    let va = pool_rows(&a.embed(&batch)?)?;
    let vb = pool_rows(&b.embed(&batch)?)?;
    let vc = pool_rows(&c.embed(&batch)?)?;
    assert_eq!(va, vb);
    assert_ne!(va, vc);
    Ok(())
}

#[test]
fn batching_does_not_change_vectors() -> anyhow::Result<()> {
    let encoder = LinformerEncoder::from_seed(tiny_config(10), 1, &Device::Cpu)?;
    let first = fixed(&[7, 8, 9], 10);
    let second = fixed(&[11, 12], 10);
    let together = pool_rows(&encoder.embed(&[first.clone(), second.clone()])?)?;
    let alone = pool_rows(&encoder.embed(&[second])?)?;
    for (a, b) in together[1].iter().zip(alone[0].iter()) {
        assert!((a - b).abs() < 1e-5);
    }
    Ok(())
}

#[test]
fn ids_beyond_embedding_table_are_rejected() -> anyhow::Result<()> {
    let encoder = LinformerEncoder::from_seed(tiny_config(6), 42, &Device::Cpu)?;
    let batch = vec![fixed(&[1, 2], 6), fixed(&[1, 64], 6)];
    match encoder.embed(&batch) {
        Err(Error::OutOfRangeToken { row, id, vocab_size }) => {
            assert_eq!(row, Some(1));
            assert_eq!(id, 64);
            assert_eq!(vocab_size, 64);
        }
        other => panic!("expected OutOfRangeToken, got {:?}", other.map(|t| t.dims().to_vec())),
    }

    let hashed = HashedEmbedder::new(10, 6, 8, 0);
    assert!(matches!(hashed.embed(&[fixed(&[10], 6)]), Err(Error::OutOfRangeToken { .. })));
    Ok(())
}

#[test]
fn wrong_sequence_length_is_rejected() -> anyhow::Result<()> {
    let encoder = LinformerEncoder::from_seed(tiny_config(6), 42, &Device::Cpu)?;
    assert!(matches!(encoder.embed(&[fixed(&[1], 5)]), Err(Error::InvalidConfig(_))));
    Ok(())
}

#[test]
fn weights_round_trip_through_directory() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let dir = tmp.path().join("model");
    let batch = vec![fixed(&[2, 7, 1, 8], 8)];

    let encoder = LinformerEncoder::from_seed(tiny_config(8), 5, &Device::Cpu)?;
    encoder.save_dir(&dir)?;
    let loaded = LinformerEncoder::load_dir(&dir, &Device::Cpu)?;
    assert_eq!(loaded.config(), encoder.config());

    let before = pool_rows(&encoder.embed(&batch)?)?;
    let after = pool_rows(&loaded.embed(&batch)?)?;
    assert_eq!(before, after);
    Ok(())
}

#[test]
fn build_provider_materializes_weights_dir_once() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let dir = tmp.path().join("weights");
    let cfg = ModelConfig { vocab_size: 64, emb_dim: 16, dim_k: 4, dim_ff: 32, weights_dir: Some(dir.clone()), ..ModelConfig::default() };
    let batch = vec![fixed(&[4, 5, 6], 8)];

    let first = build_provider(&cfg, 8)?;
    assert!(dir.join("model.safetensors").exists());
    assert!(dir.join("config.json").exists());

    // A different seed must not matter once the directory exists.
    let reload = build_provider(&ModelConfig { seed: 1234, ..cfg.clone() }, 8)?;
    let a = pool_rows(&first.embed(&batch)?)?;
    let b = pool_rows(&reload.embed(&batch)?)?;
    assert_eq!(a, b);
    Ok(())
}

#[test]
fn build_provider_hashed_kind() -> anyhow::Result<()> {
    let cfg = ModelConfig { kind: ModelKind::Hashed, emb_dim: 24, ..ModelConfig::default() };
    let provider = build_provider(&cfg, 16)?;
    assert_eq!(provider.dim(), 24);
    assert_eq!(provider.seq_len(), 16);
    assert_eq!(provider.vocab_size(), cfg.vocab_size);
    Ok(())
}

#[test]
fn default_model_embeds_full_length_sequence() -> anyhow::Result<()> {
    let cfg = ModelConfig::default();
    let provider = build_provider(&cfg, 700)?;
    let hidden = provider.embed(&[fixed(&[2, 5, 9, 13, 1, 3], 700)])?;
    assert_eq!(hidden.dims(), &[1, 700, 128]);
    let rows = pool_rows(&hidden)?;
    assert_eq!(rows[0].len(), 128);
    assert!(all_finite(&rows));
    Ok(())
}

#[test]
fn vocab_size_option_builds_matching_embedding_table() -> anyhow::Result<()> {
    let mut settings = Settings::from_options(true, "tok.json", "in.csv", "out.parquet", 16, 50_000);
    settings.validate()?;
    settings.model.depth = 1;

    let provider = build_provider(&settings.model, settings.pipeline.max_len)?;
    assert_eq!(provider.vocab_size(), 50_000);

    // The last row of the table is addressable; one past it is not.
    let hidden = provider.embed(&[fixed(&[2, 30_000, 49_999], 16)])?;
    assert_eq!(hidden.dims(), &[1, 16, 128]);
    assert!(matches!(
        provider.embed(&[fixed(&[50_000], 16)]),
        Err(Error::OutOfRangeToken { id: 50_000, vocab_size: 50_000, .. })
    ));
    Ok(())
}
