//! Replays recorded tracker output through the metadata pipeline.
//!
//! Reads one JSON frame per line, prints the text form of every encoded
//! frame to stdout and optionally appends the binary frames, each prefixed
//! with its little-endian u32 length, to a file.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use speedmeta::pipeline::JsonLinesSource;
use speedmeta::{EngineConfig, MetadataCodec, SourceRouter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Engine configuration (JSON); defaults apply when omitted
    #[arg(long, value_name = "CONFIG")]
    pub config: Option<PathBuf>,
    /// Tracked frames, one JSON object per line
    #[arg(long, value_name = "INPUT")]
    pub input: PathBuf,
    /// Append length-prefixed binary frames here
    #[arg(long, value_name = "OUTPUT")]
    pub binary: Option<PathBuf>,
}

fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::from_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let mut router = SourceRouter::new(&config).context("building pipeline")?;

    let input = File::open(&args.input)
        .with_context(|| format!("opening input {}", args.input.display()))?;
    let source = JsonLinesSource::new(BufReader::new(input));

    let mut binary = match &args.binary {
        Some(path) => {
            let file = File::options()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening binary output {}", path.display()))?;
            Some(BufWriter::new(file))
        }
        None => None,
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut overspeed = 0usize;
    let started = std::time::Instant::now();

    let frames = router.drain(source, |_, bytes| -> Result<()> {
        let view = MetadataCodec::decode(bytes)?;
        overspeed += view.objects().filter(|o| o.is_overspeed()).count();
        writeln!(out, "{}", view.to_text())?;
        if let Some(writer) = binary.as_mut() {
            let len = u32::try_from(bytes.len()).context("frame exceeds u32 length prefix")?;
            writer.write_all(&len.to_le_bytes())?;
            writer.write_all(bytes)?;
        }
        Ok(())
    })?;

    if let Some(mut writer) = binary {
        writer.flush()?;
    }
    out.flush()?;

    info!(
        frames,
        sources = router.source_count(),
        overspeed,
        elapsed = ?started.elapsed(),
        "replay finished"
    );
    Ok(())
}
