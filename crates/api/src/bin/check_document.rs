//! Batch consistency check of a single document.
//!
//! ```text
//! check_document --input novel.txt --pipeline correction --output-dir ./logs
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use api::config::AppConfig;
use extract::{PipelineKind, PipelineReport};

#[derive(Parser)]
#[command(name = "check_document")]
#[command(about = "Run a consistency, correction or grammar pass over one document")]
struct Args {
    /// .txt or .md document to check
    #[arg(long)]
    input: PathBuf,

    #[arg(long, value_enum, default_value_t = PipelineArg::Consistency)]
    pipeline: PipelineArg,

    /// Chunk size in characters (overrides CHUNKCHECK_CHUNK_SIZE)
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Where run snapshots go (overrides CHUNKCHECK_OUTPUT_DIR)
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum PipelineArg {
    Consistency,
    Correction,
    Grammar,
}

impl From<PipelineArg> for PipelineKind {
    fn from(arg: PipelineArg) -> Self {
        match arg {
            PipelineArg::Consistency => PipelineKind::Consistency,
            PipelineArg::Correction => PipelineKind::Correction,
            PipelineArg::Grammar => PipelineKind::Grammar,
        }
    }
}

/// Not `#[tokio::main]`: the pipeline runs in blocking mode on its own
/// scheduler, and only file I/O goes through `io`.
fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::from_env().context("invalid configuration")?;
    api::logging::init_tracing(config.server.log_format);
    if let Some(size) = args.chunk_size {
        config.chunking.max_chars = size;
    }
    if let Some(dir) = args.output_dir {
        config.server.output_dir = dir;
    }

    let io = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start I/O runtime")?;

    let text = io.block_on(ingest::read_document_text(&args.input));
    if text.trim().is_empty() {
        anyhow::bail!("{} is empty or unreadable", args.input.display());
    }

    let kind = PipelineKind::from(args.pipeline);
    let pipeline = api::build_pipeline(&config);
    let report = pipeline
        .run_blocking(kind, &text)
        .with_context(|| format!("{kind:?} run failed for {}", args.input.display()))?;

    let run_id = ingest::generate_doc_id(&args.input.to_string_lossy());
    let written = io.block_on(api::persist_report(&config.server.output_dir, &run_id, &report))?;

    print_summary(&report);
    for path in written {
        println!("  wrote {}", path.display());
    }
    Ok(())
}

fn print_summary(report: &PipelineReport) {
    match report {
        PipelineReport::Consistency {
            chunks,
            entities,
            results,
        } => {
            let conflicts = results.iter().filter(|r| r.conflict).count();
            println!(
                "{} chunks, {} entities, {} with conflicts",
                chunks,
                entities.len(),
                conflicts
            );
        }
        PipelineReport::Correction {
            entities,
            results,
            corrected,
        } => {
            let conflicts = results.iter().filter(|r| r.conflict).count();
            let changed = corrected
                .iter()
                .filter(|c| c.corrected_text != c.original_text)
                .count();
            println!(
                "{} entities, {} with conflicts, {} of {} chunks rewritten",
                entities.len(),
                conflicts,
                changed,
                corrected.len()
            );
        }
        PipelineReport::Grammar { results } => {
            let flagged = results.iter().filter(|r| r.correct == Some(false)).count();
            let unparsed = results.iter().filter(|r| r.correct.is_none()).count();
            println!(
                "{} chunks checked, {} flagged, {} unparsed",
                results.len(),
                flagged,
                unparsed
            );
        }
    }
}
