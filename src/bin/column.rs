//! Laminar column driver.
//!
//! Runs JSON patterns through the full cortical column or through the
//! batched Layer4 → Layer6 front end and writes one JSON line per result.

use clap::{Args as ClapArgs, Parser, Subcommand};
use laminar::{
    BatchProcessor, CircuitConfig, CircuitOrchestrator, DispatchMode, LearningLog, Pattern,
};
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "laminar-column",
    about = "Simulate a six-layer laminar cortical column"
)]
struct Cli {
    /// Circuit configuration (JSON); defaults are used when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Layer size when no configuration file is given (defaults to the input dimension)
    #[arg(long, global = true)]
    size: Option<usize>,

    /// Output file (JSONL); stdout when omitted
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process patterns one at a time through the full pipeline
    Run(RunArgs),
    /// Process patterns as one batch through the Layer4 → Layer6 front end
    Batch(BatchArgs),
}

#[derive(ClapArgs, Debug)]
struct RunArgs {
    /// JSON array of input patterns
    #[arg(long)]
    input: PathBuf,

    /// Top-down expectation (JSON array) cached in Layer6 before processing
    #[arg(long)]
    expectation: Option<PathBuf>,

    /// Number of passes over the input
    #[arg(long, default_value_t = 1)]
    repeat: usize,

    /// Apply resonance-gated learning after every step
    #[arg(long, default_value_t = false)]
    learn: bool,

    /// Run the Layer1/Layer6 stage on the calling thread
    #[arg(long, default_value_t = false)]
    sequential: bool,
}

#[derive(ClapArgs, Debug)]
struct BatchArgs {
    /// JSON array of input patterns
    #[arg(long)]
    input: PathBuf,

    /// Top-down expectation (JSON array); zeros when omitted
    #[arg(long)]
    expectation: Option<PathBuf>,

    /// Batch size at which the vectorized path takes over
    #[arg(long, default_value_t = laminar::batch::DEFAULT_SIMD_THRESHOLD)]
    threshold: usize,

    /// Keep dimension rows on one thread
    #[arg(long, default_value_t = false)]
    serial: bool,
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "laminar=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let mut out = open_output(cli.output.as_deref());

    match &cli.command {
        Command::Run(args) => run(&cli, args, &mut out),
        Command::Batch(args) => batch(&cli, args, &mut out),
    }

    out.flush().expect("Failed to flush output");
}

fn open_output(path: Option<&Path>) -> Box<dyn Write> {
    match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).expect("Failed to create output directory");
            }
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path)
                .expect("Failed to open output file");
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(io::stdout())),
    }
}

fn read_patterns(path: &Path) -> Vec<Pattern> {
    let text = fs::read_to_string(path).expect("Failed to read input patterns");
    let patterns: Vec<Pattern> = serde_json::from_str(&text).expect("Input must be a JSON array of patterns");
    assert!(!patterns.is_empty(), "Input contains no patterns");
    patterns
}

fn read_pattern(path: &Path) -> Pattern {
    let text = fs::read_to_string(path).expect("Failed to read expectation");
    serde_json::from_str(&text).expect("Expectation must be a JSON array")
}

fn load_config(cli: &Cli, input_dim: usize) -> CircuitConfig {
    match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path).expect("Failed to read configuration");
            CircuitConfig::from_json_str(&text).expect("Invalid configuration")
        }
        None => CircuitConfig::with_size(cli.size.unwrap_or(input_dim))
            .expect("Failed to build default configuration"),
    }
}

fn run(cli: &Cli, args: &RunArgs, out: &mut dyn Write) {
    let patterns = read_patterns(&args.input);
    let mut config = load_config(cli, patterns[0].len());
    if args.sequential {
        config = config.with_dispatch(DispatchMode::Sequential);
    }

    let mut column = CircuitOrchestrator::new(config).expect("Failed to build column");
    let log = Arc::new(Mutex::new(LearningLog::default()));
    column.set_statistics_sink(Box::new(Arc::clone(&log)));
    if let Some(path) = &args.expectation {
        column
            .set_expectation(&read_pattern(path))
            .expect("Expectation does not match the column size");
    }

    tracing::info!(
        size = column.size(),
        patterns = patterns.len(),
        repeat = args.repeat,
        dispatch = ?column.config().dispatch,
        learn = args.learn,
        "running column"
    );

    let start = Instant::now();
    let mut categories = 0usize;
    for pass in 0..args.repeat {
        for pattern in &patterns {
            let result = column.process(pattern).expect("Processing failed");
            if result.category_formed {
                categories += 1;
            }
            let learning = if args.learn {
                Some(column.learn_default().expect("Learning failed"))
            } else {
                None
            };
            let event = serde_json::json!({
                "type": "step",
                "pass": pass,
                "result": result,
                "learning": learning,
            });
            writeln!(out, "{event}").expect("Failed to write result");
        }
    }

    let elapsed = start.elapsed();
    let log = log.lock().expect("Learning log poisoned");
    let summary = serde_json::json!({
        "type": "summary",
        "steps": column.step(),
        "categories_formed": categories,
        "learning_events": log.len(),
        "resonant_events": log.resonant_count(),
        "total_weight_change": log.total_change(),
        "elapsed_ms": elapsed.as_secs_f64() * 1000.0,
    });
    writeln!(out, "{summary}").expect("Failed to write summary");
    tracing::info!(steps = column.step(), categories, ?elapsed, "done");
}

fn batch(cli: &Cli, args: &BatchArgs, out: &mut dyn Write) {
    let patterns = read_patterns(&args.input);
    let config = load_config(cli, patterns[0].len());
    let expectation = match &args.expectation {
        Some(path) => read_pattern(path),
        None => Pattern::zeros(config.size()),
    };

    let processor = BatchProcessor::new(config.layer4.clone(), config.layer6.clone())
        .expect("Failed to build batch processor")
        .with_simd_threshold(args.threshold)
        .with_parallel(!args.serial);

    tracing::info!(
        size = processor.size(),
        patterns = patterns.len(),
        threshold = args.threshold,
        parallel = !args.serial,
        "running batch"
    );

    let start = Instant::now();
    let outputs = processor
        .process(&patterns, &expectation)
        .expect("Batch processing failed");
    let elapsed = start.elapsed();

    for (index, output) in outputs.iter().enumerate() {
        let event = serde_json::json!({
            "type": "pattern",
            "index": index,
            "output": output,
        });
        writeln!(out, "{event}").expect("Failed to write result");
    }
    tracing::info!(patterns = outputs.len(), ?elapsed, "batch done");
}
