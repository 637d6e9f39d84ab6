use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

use logvec_core::config::{Config, InputFormat, ModelKind, TokenizerMode};
use logvec_pipeline::{read_vectors, VectorizePipeline};

const USAGE: &str = "Usage: logvec <vectorize|inspect> [args...]

  vectorize [--input PATH] [--output PATH] [--tokenizer PATH]
            [--train | --load | --word | --auto] [--max-len N] [--vocab-size N]
            [--batch-size N] [--lines] [--hashed]
  inspect <vectors.parquet> [--limit N]";

fn parse_usize(flag: &str, value: Option<&String>) -> anyhow::Result<usize> {
    let value = value.with_context(|| format!("{flag} requires a number"))?;
    value.parse().with_context(|| format!("{flag} requires a number, got '{value}'"))
}

fn vectorize(config: &Config, args: &[String]) -> anyhow::Result<()> {
    let mut settings = config.settings()?.resolve_paths(&env::current_dir()?);
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--input" | "-i" => { i += 1; settings.pipeline.input_path = PathBuf::from(args.get(i).context("--input requires a path")?); }
            "--output" | "-o" => { i += 1; settings.pipeline.output_path = PathBuf::from(args.get(i).context("--output requires a path")?); }
            "--tokenizer" | "-t" => { i += 1; settings.pipeline.tokenizer_path = Some(PathBuf::from(args.get(i).context("--tokenizer requires a path")?)); }
            "--train" => settings.pipeline.mode = TokenizerMode::Train,
            "--load" => settings.pipeline.mode = TokenizerMode::Load,
            "--word" => settings.pipeline.mode = TokenizerMode::Word,
            "--auto" => settings.pipeline.mode = TokenizerMode::Auto,
            "--max-len" => { i += 1; settings.pipeline.max_len = parse_usize("--max-len", args.get(i))?; }
            "--vocab-size" => { i += 1; settings.set_vocab_size(parse_usize("--vocab-size", args.get(i))?); }
            "--batch-size" => { i += 1; settings.pipeline.batch_size = parse_usize("--batch-size", args.get(i))?; }
            "--lines" => settings.pipeline.input_format = InputFormat::Lines,
            "--hashed" => settings.model.kind = ModelKind::Hashed,
            other => bail!("unknown argument '{other}'\n\n{USAGE}"),
        }
        i += 1;
    }

    let pipeline = VectorizePipeline::from_settings(&settings)?;
    let report = pipeline.run()?;
    println!("✅ Vectorized {} records (dim {}) -> {}", report.rows, report.dim, report.output_path.display());
    match &report.tokenizer_path {
        Some(path) => println!("📦 Tokenizer: {} ({} tokens) at {}", report.tokenizer_kind, report.vocab_size, path.display()),
        None => println!("📦 Tokenizer: {} ({} tokens)", report.tokenizer_kind, report.vocab_size),
    }
    Ok(())
}

fn inspect(args: &[String]) -> anyhow::Result<()> {
    let path = args.first().map(PathBuf::from).context("inspect requires a parquet path")?;
    let limit = match args.iter().position(|a| a == "--limit") {
        Some(pos) => parse_usize("--limit", args.get(pos + 1))?,
        None => 5,
    };
    let rows = read_vectors(&path)?;
    let dim = rows.first().map(|r| r.vector.len()).unwrap_or(0);
    println!("📊 {}: {} rows, dim {}", path.display(), rows.len(), dim);
    for row in rows.iter().take(limit) {
        let head: Vec<String> = row.vector.iter().take(4).map(|x| format!("{x:.4}")).collect();
        println!("  [{}, ...]  {}", head.join(", "), row.text);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() { eprintln!("{USAGE}"); std::process::exit(1); }
    let cmd = args.remove(0);
    match cmd.as_str() {
        "vectorize" => {
            let config = Config::load().context("loading configuration")?;
            vectorize(&config, &args)
        }
        "inspect" => inspect(&args),
        "-h" | "--help" => { println!("{USAGE}"); Ok(()) }
        _ => { eprintln!("Unknown command: {cmd}\n\n{USAGE}"); std::process::exit(1); }
    }
}
