use anyhow::{Context, Result};
use nativex::{Extractor, ExtractorConfig, MinerSpec, Occurrence, Stream};
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::cli_utils::{format_bytes, format_number, parse_threads};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Json,
    Csv,
    Text,
}

impl OutputFormat {
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "text" => Ok(Self::Text),
            _ => anyhow::bail!("Invalid format '{}', expected: json, csv, or text", s),
        }
    }
}

pub struct ExtractArgs {
    pub inputs: Vec<PathBuf>,
    pub globs: Vec<String>,
    pub globs_icase: Vec<String>,
    pub dicts: Vec<String>,
    pub plugins: Vec<String>,
    pub config: Option<PathBuf>,
    pub batch: Option<usize>,
    pub threads: Option<String>,
    pub no_enclosed: bool,
    pub format: String,
    pub show_stats: bool,
}

/// One output line: the occurrence plus the file it came from
#[derive(Serialize)]
struct Record<'a> {
    input: &'a str,
    #[serde(flatten)]
    occurrence: &'a Occurrence,
}

#[derive(Serialize)]
struct CsvRow<'a> {
    input: &'a str,
    label: &'a str,
    pos: usize,
    len: usize,
    upos: usize,
    ulen: usize,
    prob: f32,
    miner: &'a str,
    value: &'a str,
}

#[derive(Default)]
struct RunStats {
    files: usize,
    bytes: usize,
    occurrences: usize,
    suppressed: u64,
    batches: u64,
}

pub fn cmd_extract(args: ExtractArgs) -> Result<()> {
    let output_format = OutputFormat::from_str(&args.format)?;
    let config = build_config(&args)?;
    if config.miners.is_empty() {
        anyhow::bail!("No miners given; use --glob, --glob-icase, --dict, --plugin or --config");
    }

    let mut extractor = config
        .build()
        .context("Failed to set up extraction pipeline")?;

    if args.show_stats {
        eprintln!("[INFO] Miners: {}", extractor.miners().len());
        for entry in extractor.miners().iter() {
            eprintln!(
                "[INFO]   {} ({}) {:?}",
                entry.symbol(),
                entry.path(),
                entry.param()
            );
        }
        eprintln!("[INFO] Threads: {}", extractor.threads());
        eprintln!("[INFO] Batch size: {}", extractor.batch_size());
        eprintln!("[INFO] Suppress enclosed: {}", config.suppress_enclosed);
    }

    let start_time = Instant::now();
    let mut stats = RunStats::default();

    let stdout = io::stdout();
    let mut writer = io::BufWriter::new(stdout.lock());
    let mut csv_writer =
        (output_format == OutputFormat::Csv).then(|| csv::Writer::from_writer(Vec::new()));

    for input in &args.inputs {
        process_file(
            input,
            &mut extractor,
            output_format,
            &mut writer,
            csv_writer.as_mut(),
            &mut stats,
        )?;
    }

    if let Some(csv) = csv_writer.take() {
        let bytes = csv.into_inner().context("Failed to finish CSV output")?;
        writer.write_all(&bytes)?;
    }
    writer.flush()?;

    if args.show_stats {
        let elapsed = start_time.elapsed();
        eprintln!();
        eprintln!("[INFO] === Extraction Complete ===");
        eprintln!("[INFO] Files: {}", format_number(stats.files));
        eprintln!("[INFO] Bytes scanned: {}", format_bytes(stats.bytes));
        eprintln!("[INFO] Occurrences: {}", format_number(stats.occurrences));
        eprintln!("[INFO] Suppressed: {}", format_number(stats.suppressed as usize));
        eprintln!("[INFO] Batches: {}", format_number(stats.batches as usize));
        eprintln!(
            "[INFO] Throughput: {:.2} MB/s",
            if elapsed.as_secs_f64() > 0.0 {
                (stats.bytes as f64 / 1_000_000.0) / elapsed.as_secs_f64()
            } else {
                0.0
            }
        );
        eprintln!("[INFO] Total time: {:.2}s", elapsed.as_secs_f64());
    }

    Ok(())
}

/// Config file (if any) overlaid with command-line settings and miners
fn build_config(args: &ExtractArgs) -> Result<ExtractorConfig> {
    let mut config = match &args.config {
        Some(path) => ExtractorConfig::load(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?,
        None => ExtractorConfig::default(),
    };

    if let Some(threads) = parse_threads(args.threads.as_deref())? {
        config.threads = threads;
    }
    if let Some(batch) = args.batch {
        config.batch_size = batch;
    }
    if args.no_enclosed {
        config.suppress_enclosed = true;
    }

    config.miners.extend(
        args.globs
            .iter()
            .map(|p| MinerSpec::builtin("match_glob", p.as_str())),
    );
    config.miners.extend(
        args.globs_icase
            .iter()
            .map(|p| MinerSpec::builtin("match_glob_icase", p.as_str())),
    );
    config.miners.extend(
        args.dicts
            .iter()
            .map(|d| MinerSpec::builtin("match_dictionary", d.as_str())),
    );
    for plugin in &args.plugins {
        config
            .miners
            .push(MinerSpec::parse_plugin(plugin).context("Invalid --plugin")?);
    }
    Ok(config)
}

fn process_file<W: Write>(
    input: &Path,
    extractor: &mut Extractor,
    output_format: OutputFormat,
    writer: &mut W,
    mut csv_writer: Option<&mut csv::Writer<Vec<u8>>>,
    stats: &mut RunStats,
) -> Result<()> {
    let stream = Stream::open_file(input)
        .with_context(|| format!("Failed to open input: {}", input.display()))?;
    stats.files += 1;
    stats.bytes += stream.len();

    extractor
        .bind_stream(stream)
        .with_context(|| format!("Failed to bind input: {}", input.display()))?;

    let input_name = input.display().to_string();
    for batch in extractor.batches() {
        let batch = batch.with_context(|| format!("Extraction failed in {}", input_name))?;
        stats.occurrences += batch.len();
        for occurrence in &batch {
            match output_format {
                OutputFormat::Json => {
                    let record = Record {
                        input: &input_name,
                        occurrence,
                    };
                    serde_json::to_writer(&mut *writer, &record)?;
                    writeln!(writer)?;
                }
                OutputFormat::Csv => {
                    if let Some(csv) = csv_writer.as_deref_mut() {
                        csv.serialize(CsvRow {
                            input: &input_name,
                            label: &occurrence.label,
                            pos: occurrence.pos,
                            len: occurrence.len,
                            upos: occurrence.upos,
                            ulen: occurrence.ulen,
                            prob: occurrence.prob,
                            miner: &occurrence.miner,
                            value: &occurrence.value,
                        })?;
                    }
                }
                OutputFormat::Text => {
                    writeln!(writer, "{}", occurrence.value)?;
                }
            }
        }
    }

    let run = extractor.stats();
    stats.suppressed += run.suppressed;
    stats.batches += run.batches;

    if let Some(mut stream) = extractor.unbind_stream() {
        stream.close();
    }
    Ok(())
}
