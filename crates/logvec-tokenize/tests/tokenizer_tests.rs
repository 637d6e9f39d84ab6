use tempfile::TempDir;

use logvec_core::config::TokenizerConfig;
use logvec_core::types::FixedSequence;
use logvec_core::Error;
use logvec_tokenize::LogTokenizer;

const SAMPLE: &str = "[2024-03-18 10:15:23] INFO [system.service] Service started successfully";

fn corpus() -> Vec<String> {
    vec![
        SAMPLE.to_string(),
        "[2024-03-18 10:15:24] WARN [net.conn] connection timeout after 30s".to_string(),
        "[2024-03-18 10:15:25] ERROR [auth] login denied for user admin".to_string(),
        "[2024-03-18 10:15:26] INFO [auth] login accepted for user alice".to_string(),
        "[2024-03-18 10:15:27] INFO [system.service] Service stopped".to_string(),
    ]
}

fn trained_bpe() -> anyhow::Result<LogTokenizer> {
    let (tokenizer, trainer) = LogTokenizer::subword_from_config(&TokenizerConfig::default())?;
    Ok(tokenizer.train(&trainer, &corpus())?)
}

#[test]
fn word_tokenizer_maps_unknown_words_to_unk() -> anyhow::Result<()> {
    let tokenizer = LogTokenizer::word()?;
    assert_eq!(tokenizer.pad_id(), 0);
    assert_eq!(tokenizer.token_to_id("[UNK]"), Some(1));

    let seq = tokenizer.encode(SAMPLE)?;
    assert!(!seq.is_empty());
    assert!(seq.ids().iter().all(|&id| (id as usize) < tokenizer.vocab_size()));
    let info = tokenizer.token_to_id("INFO").ok_or_else(|| anyhow::anyhow!("INFO not in vocabulary"))?;
    assert!(seq.ids().contains(&info));

    let unknown = tokenizer.encode("zzyzx")?;
    assert_eq!(unknown.ids(), &[1]);
    Ok(())
}

#[test]
fn untrained_subword_refuses_to_encode_or_save() -> anyhow::Result<()> {
    let (tokenizer, _trainer) = LogTokenizer::subword(1000, 2, &["[PAD]".into(), "[UNK]".into()])?;
    assert!(!tokenizer.is_trained());
    assert!(matches!(tokenizer.encode(SAMPLE), Err(Error::TokenizerNotTrained)));

    let tmp = TempDir::new()?;
    let path = tmp.path().join("tok.json");
    assert!(matches!(tokenizer.save(&path), Err(Error::TokenizerNotTrained)));
    assert!(!path.exists());
    Ok(())
}

#[test]
fn empty_corpus_is_untrainable_and_writes_nothing() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let path = tmp.path().join("tok.json");

    let (tokenizer, trainer) = LogTokenizer::subword_from_config(&TokenizerConfig::default())?;
    let empty: Vec<String> = vec![];
    let result = tokenizer.train(&trainer, &empty).and_then(|t| t.save(&path));
    assert!(matches!(result, Err(Error::UntrainableCorpus)));
    assert!(!path.exists(), "no tokenizer file after a failed training");

    let (tokenizer, trainer) = LogTokenizer::subword_from_config(&TokenizerConfig::default())?;
    assert!(matches!(tokenizer.train(&trainer, &["   ", ""]), Err(Error::UntrainableCorpus)));
    Ok(())
}

#[test]
fn trained_subword_reserves_low_ids_for_specials() -> anyhow::Result<()> {
    let tokenizer = trained_bpe()?;
    assert!(tokenizer.is_trained());
    for (id, token) in ["[PAD]", "[UNK]", "[CLS]", "[SEP]", "[MASK]"].iter().enumerate() {
        assert_eq!(tokenizer.token_to_id(token), Some(id as u32), "{token}");
    }
    assert!(tokenizer.vocab_size() <= TokenizerConfig::default().vocab_size);

    let seq = tokenizer.encode(SAMPLE)?;
    assert!(!seq.is_empty());
    assert!(seq.ids().iter().all(|&id| (id as usize) < tokenizer.vocab_size()));
    Ok(())
}

#[test]
fn save_load_round_trip_preserves_encoding() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let texts = [SAMPLE, "login denied for user mallory", "Ω unseen glyphs ✓", ""];

    for (name, tokenizer) in [("bpe.json", trained_bpe()?), ("word.json", LogTokenizer::word()?)] {
        let path = tmp.path().join("nested").join(name);
        tokenizer.save(&path)?;
        let loaded = LogTokenizer::load(&path)?;
        assert_eq!(loaded.kind(), tokenizer.kind());
        assert_eq!(loaded.vocab_size(), tokenizer.vocab_size());
        for text in texts {
            assert_eq!(loaded.encode(text)?, tokenizer.encode(text)?, "{name}: {text:?}");
        }
    }
    Ok(())
}

#[test]
fn load_missing_file_is_reported_with_path() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let path = tmp.path().join("missing.json");
    match LogTokenizer::load(&path) {
        Err(Error::InputNotFound { path: p }) => assert_eq!(p, path),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("loading a missing file must fail"),
    }
    Ok(())
}

#[test]
fn batch_encoding_matches_single_encoding_in_order() -> anyhow::Result<()> {
    let tokenizer = trained_bpe()?;
    let texts = corpus();
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    let batch = tokenizer.encode_batch(&refs)?;
    assert_eq!(batch.len(), texts.len());
    for (text, seq) in texts.iter().zip(batch.iter()) {
        assert_eq!(&tokenizer.encode(text)?, seq);
    }
    Ok(())
}

#[test]
fn concurrent_encoding_on_trained_tokenizer() -> anyhow::Result<()> {
    let tokenizer = trained_bpe()?;
    let expected = tokenizer.encode(SAMPLE)?;
    std::thread::scope(|s| {
        let handles: Vec<_> = (0..4).map(|_| s.spawn(|| tokenizer.encode(SAMPLE).unwrap())).collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), expected);
        }
    });
    Ok(())
}

#[test]
fn encoded_log_line_normalizes_to_fixed_length() -> anyhow::Result<()> {
    let tokenizer = LogTokenizer::word()?;
    let seq = tokenizer.encode(SAMPLE)?;
    let fixed = FixedSequence::normalize(&seq, 700, tokenizer.pad_id());
    assert_eq!(fixed.len(), 700);
    assert_eq!(&fixed.ids()[..seq.len()], seq.ids());
    assert!(fixed.ids()[seq.len()..].iter().all(|&id| id == tokenizer.pad_id()));
    Ok(())
}
