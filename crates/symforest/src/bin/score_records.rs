//! Score a raw-record file with a JSON model.
//!
//! When the record file carries expected scores, prints agreement statistics
//! and exits with status 1 if the maximum absolute error exceeds
//! `--tolerance`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::Parser;
use symforest::testing::AgreementStats;
use symforest::{AnyScorer, Parallelism, ScorerConfig, Strategy, io, persist};

#[derive(Parser)]
#[command(name = "score_records")]
#[command(about = "Score a raw-record file with an oblivious forest model")]
#[command(version)]
struct Cli {
    /// Model document (JSON)
    #[arg(long)]
    model: PathBuf,

    /// Record file (0xCAFEBABE header, row-major f32)
    #[arg(long)]
    records: PathBuf,

    /// Scoring strategy: scalar, unrolled or simd
    #[arg(long, default_value = "unrolled")]
    strategy: Strategy,

    /// Worker threads; omit for the rayon default, 1 for sequential scoring
    #[arg(long)]
    threads: Option<NonZeroUsize>,

    /// Rows per block in batch scoring
    #[arg(long, default_value_t = symforest::inference::DEFAULT_BLOCK_SIZE)]
    block_size: usize,

    /// Write scores here as little-endian f64
    #[arg(long)]
    out: Option<PathBuf>,

    /// Maximum absolute error against the expected scores
    #[arg(long, default_value_t = 1e-4)]
    tolerance: f64,
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let model_file = File::open(&cli.model)
        .with_context(|| format!("opening model {}", cli.model.display()))?;
    let model = persist::read_json(BufReader::new(model_file))
        .with_context(|| format!("loading model {}", cli.model.display()))?;

    let records_file = File::open(&cli.records)
        .with_context(|| format!("opening records {}", cli.records.display()))?;
    let records = io::read_records(BufReader::new(records_file))
        .with_context(|| format!("loading records {}", cli.records.display()))?;
    if records.n_features() != model.n_features() {
        bail!(
            "record file has {} features, model expects {}",
            records.n_features(),
            model.n_features()
        );
    }

    let parallelism = match cli.threads {
        Some(n) if n.get() == 1 => Parallelism::Sequential,
        _ => Parallelism::Parallel,
    };
    let config = ScorerConfig::builder()
        .strategy(cli.strategy)
        .block_size(cli.block_size)
        .maybe_n_threads(cli.threads)
        .parallelism(parallelism)
        .build()?;
    let scorer = AnyScorer::new(&model, &config);

    let mut scores = vec![0.0f64; records.n_samples()];
    let start = Instant::now();
    scorer.score_all(records.values(), &mut scores)?;
    let elapsed = start.elapsed();
    tracing::info!(
        records = records.n_samples(),
        strategy = %scorer.strategy(),
        elapsed_ms = elapsed.as_secs_f64() * 1e3,
        records_per_sec = records.n_samples() as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
        "scored"
    );

    if let Some(path) = &cli.out {
        let file =
            File::create(path).with_context(|| format!("creating {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        for score in &scores {
            writer.write_all(&score.to_le_bytes())?;
        }
        writer.flush()?;
    }

    let Some(expected) = records.expected() else {
        return Ok(ExitCode::SUCCESS);
    };
    let expected: Vec<f64> = expected.iter().map(|&v| v as f64).collect();
    let stats = AgreementStats::compute(&scores, &expected);
    println!("{stats}");
    if !stats.within(cli.tolerance) {
        eprintln!(
            "max absolute error {:.3e} exceeds tolerance {:.3e}",
            stats.max_abs_error, cli.tolerance
        );
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
