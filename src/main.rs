use chrono::Local;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use sonal_aura::report::{self, FileReport, Summary};
use sonal_aura::serve::{self, ServeConfig};
use sonal_aura::Analyzer;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Supported audio formats
const SUPPORTED_EXTENSIONS: &[&str] = &[
    "flac", "wav", "wave", "aiff", "aif", "mp3", "m4a", "aac", "ogg", "oga", "mka", "mkv", "alac",
];

#[derive(Parser, Debug)]
#[command(name = "sonal-aura")]
#[command(author, version, about = "Loudness, brightness, stereo width and tonal center of audio files")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// File or directory to analyze
    path: Option<PathBuf>,

    /// Output report file for directories (.json, .csv)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for auto-generated reports
    #[arg(long, default_value = "sonal-aura-reports")]
    report_dir: PathBuf,

    /// Don't auto-generate a batch report
    #[arg(long)]
    no_report: bool,

    /// Number of parallel workers (default: number of CPUs)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// STFT window size in samples
    #[arg(long, default_value_t = sonal_aura::analyzer::DEFAULT_WINDOW_SIZE)]
    window: usize,

    /// STFT hop size in samples
    #[arg(long, default_value_t = sonal_aura::analyzer::DEFAULT_HOP_SIZE)]
    hop: usize,

    /// Spectral roll-off energy fraction
    #[arg(long, default_value_t = sonal_aura::analyzer::spectral::DEFAULT_ROLLOFF_PERCENT)]
    rolloff: f64,

    /// Reference frequency of A for pitch classes
    #[arg(long, default_value_t = sonal_aura::analyzer::tonal::DEFAULT_TUNING_HZ)]
    tuning: f64,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Only show summary
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP analysis service
    Serve {
        /// Address to bind
        #[arg(long, default_value = serve::DEFAULT_HOST)]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value_t = serve::DEFAULT_PORT)]
        port: u16,

        /// Largest accepted upload, in megabytes
        #[arg(long, default_value_t = serve::DEFAULT_MAX_UPLOAD_MB)]
        max_upload_mb: u64,

        /// Directory for staged uploads (default: system temp dir)
        #[arg(long)]
        upload_dir: Option<PathBuf>,
    },
}

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let analyzer = Analyzer::new()
        .with_stft(args.window, args.hop)
        .with_rolloff_percent(args.rolloff)
        .with_tuning(args.tuning);

    if let Some(Command::Serve { host, port, max_upload_mb, upload_dir }) = &args.command {
        let config = ServeConfig {
            host: host.clone(),
            port: *port,
            max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
            upload_dir: upload_dir.clone(),
        };
        if let Err(e) = serve::start(config, analyzer) {
            eprintln!("Server error: {}", e);
            std::process::exit(1);
        }
        return;
    }

    let path = match args.path.clone() {
        Some(p) => p,
        None => {
            eprintln!("Usage: sonal-aura <PATH>");
            eprintln!("Run 'sonal-aura --help' for more options.");
            std::process::exit(1);
        }
    };

    // Set up thread pool
    if let Some(jobs) = args.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .ok();
    }

    if path.is_file() {
        analyze_single(&analyzer, &path);
    } else {
        analyze_batch(&analyzer, &path, &args);
    }
}

/// One file: pretty JSON on stdout.
fn analyze_single(analyzer: &Analyzer, path: &Path) {
    let report = match analyzer.analyze(path) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{}: {}", path.display(), e);
            std::process::exit(1);
        }
    };

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing report: {}", e);
            std::process::exit(1);
        }
    }
}

fn collect_files(path: &Path) -> Vec<PathBuf> {
    let supported: HashSet<&str> = SUPPORTED_EXTENSIONS.iter().cloned().collect();

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| supported.contains(ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .map(|e| e.path().to_path_buf())
        .collect();

    files.sort();
    files
}

fn analyze_batch(analyzer: &Analyzer, path: &Path, args: &Args) {
    if !path.is_dir() {
        eprintln!("{}: no such file or directory", path.display());
        std::process::exit(1);
    }

    let files = collect_files(path);
    if files.is_empty() {
        eprintln!("No audio files found (supported: {})", SUPPORTED_EXTENSIONS.join(", "));
        std::process::exit(1);
    }

    if !args.quiet {
        eprintln!("\x1b[1mSonal Aura\x1b[0m");
        eprintln!("{}", "─".repeat(70));
        eprintln!("Found {} audio file(s)\n", files.len());
    }

    // Set up progress bar
    let pb = if !args.quiet && files.len() > 1 {
        let pb = ProgressBar::new(files.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}") {
            pb.set_style(style.progress_chars("=>-"));
        }
        Some(pb)
    } else {
        None
    };

    // Files already run in parallel; keep each file's analyzers on one thread.
    let per_file = analyzer.clone().with_parallel(false);

    let results: Vec<FileReport> = files
        .par_iter()
        .map(|path| {
            let result = FileReport::new(path, per_file.analyze(path));
            if let Some(ref pb) = pb {
                pb.inc(1);
                pb.set_message(result.file_name.clone());
            }
            result
        })
        .collect();

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    if !args.quiet {
        for r in &results {
            match (&r.report, &r.error) {
                (Some(report), _) => println!(
                    "\x1b[32m{:>7.2} LUFS\x1b[0m  {:>8.1} Hz  {:>8.1} Hz  {:>6.3}  {:<2}  {}",
                    report.dynamics.integrated_lufs,
                    report.spectral.brightness_centroid_hz,
                    report.spectral.high_end_rolloff_hz,
                    report.stereo.l_r_correlation,
                    report.tonality.dominant_key,
                    r.file_name
                ),
                (None, error) => println!(
                    "\x1b[90m[ERROR]\x1b[0m  {}  {}",
                    r.file_name,
                    error.as_deref().unwrap_or("unknown error")
                ),
            }
        }
    }

    let summary = Summary::from_results(&results);

    if !args.quiet {
        eprintln!("\n{}", "─".repeat(70));
        eprintln!("\x1b[1mSummary:\x1b[0m");
        eprintln!("  \x1b[32m✓ Analyzed:\x1b[0m {}", summary.analyzed);
        if summary.failed > 0 {
            eprintln!("  \x1b[90m✗ Failed:\x1b[0m   {}", summary.failed);
        }
    }

    // Determine report path
    let report_path = if let Some(ref output) = args.output {
        Some(output.clone())
    } else if !args.no_report {
        std::fs::create_dir_all(&args.report_dir).ok();
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let filename = format!("sonal_aura_report_{}.json", timestamp);
        Some(args.report_dir.join(filename))
    } else {
        None
    };

    if let Some(ref output_path) = report_path {
        if let Err(e) = report::generate(output_path, &results) {
            eprintln!("Failed to write report: {}", e);
            std::process::exit(1);
        }
        if !args.quiet {
            eprintln!("\n\x1b[32mReport saved: {}\x1b[0m", output_path.display());
        }
    }

    if summary.failed > 0 {
        std::process::exit(1);
    }
}
