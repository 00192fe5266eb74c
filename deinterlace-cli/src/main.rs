//! Deinterlace CLI - batch deinterlacing of interlaced movies.

use clap::error::ErrorKind;
use clap::Parser;
use console::style;
use deinterlace::{scan_inputs, Batch, BatchConfig, MovieIoRegistry};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Output mode for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    /// Normal output with progress bar.
    Normal,
    /// Quiet mode with minimal output.
    Quiet,
    /// Verbose mode with debug logging.
    Verbose,
}

/// Command-line arguments for the deinterlace tool.
#[derive(Parser, Debug)]
#[command(name = "deinterlace")]
#[command(version)]
#[command(about = "Batch deinterlacer: progressive double-rate copies of interlaced movies")]
#[command(long_about = "Scans a folder recursively for movies, splits every interlaced \n\
    video track into progressive field pairs at doubled frame rate, and \n\
    mirrors the folder structure into the output. Audio, timecode, and \n\
    progressive video tracks are preserved.\n\n\
    EXAMPLES:\n    \
    deinterlace tapes/\n    \
    deinterlace tapes/ restored/\n    \
    deinterlace tapes/ --jobs 2 --verbose")]
struct Args {
    /// Folder to scan for movies
    input: PathBuf,

    /// Output folder (default: a sibling of the input with `_deinterlaced`)
    output: Option<PathBuf>,

    /// Maximum movies processed at once (default: half the CPUs)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Verbose output (debug logging)
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Quiet mode (no progress bar, warnings only)
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Args {
    fn output_mode(&self) -> OutputMode {
        if self.quiet {
            OutputMode::Quiet
        } else if self.verbose {
            OutputMode::Verbose
        } else {
            OutputMode::Normal
        }
    }
}

fn main() {
    // A missing or malformed command line is a usage error, exit code 1;
    // --help and --version stay successful.
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(error)
            if matches!(
                error.kind(),
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
            ) =>
        {
            print!("{error}");
            std::process::exit(0);
        }
        Err(error) => {
            eprint!("{error}");
            std::process::exit(1);
        }
    };
    let mode = args.output_mode();

    if mode != OutputMode::Quiet {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(if args.verbose {
                tracing::Level::DEBUG
            } else {
                tracing::Level::INFO
            })
            .with_target(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    let registry = Arc::new(MovieIoRegistry::bundled());
    let movies = match scan_inputs(&args.input, args.output.as_deref(), &registry) {
        Ok(movies) => movies,
        Err(error) => {
            eprintln!("{} {}", style("Error:").red().bold(), error);
            std::process::exit(1);
        }
    };

    let config = BatchConfig {
        concurrency: args
            .jobs
            .filter(|&jobs| jobs > 0)
            .unwrap_or_else(deinterlace::default_concurrency),
        poll_interval: Duration::from_secs(2),
    };

    if mode != OutputMode::Quiet {
        println!();
        println!("{}", style("Deinterlace").cyan().bold());
        println!("  Input:   {}", style(args.input.display()).white());
        if let Some(output) = &args.output {
            println!("  Output:  {}", style(output.display()).white());
        } else {
            println!(
                "  Output:  {}",
                style(deinterlace::default_output_root(&args.input).display()).white()
            );
        }
        println!("  Movies:  {}", style(movies.len()).white());
        println!("  Jobs:    {}", style(config.concurrency).white());
        println!();
    }

    let mut batch = Batch::new(movies, registry, config);

    // First SIGINT requests orderly cancellation; a second one gives up on
    // the orderly shutdown.
    let token = batch.cancel_token();
    let interrupted = Arc::new(AtomicBool::new(false));
    if let Err(error) = ctrlc::set_handler(move || {
        if interrupted.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        eprintln!("\ninterrupted, finishing in-flight movies...");
        token.store(true, Ordering::Relaxed);
    }) {
        warn!(%error, "could not install SIGINT handler");
    }

    let progress_bar = match mode {
        OutputMode::Quiet => None,
        _ => {
            let pb = ProgressBar::new(100);
            pb.set_style(create_progress_style());
            pb.enable_steady_tick(Duration::from_millis(100));
            Some(pb)
        }
    };

    let report = batch.run(|progress| {
        if let Some(pb) = &progress_bar {
            pb.set_position((progress.progress * 100.0).round() as u64);
            pb.set_message(format!(
                "{} running | {}/{} done",
                progress.running, progress.completed, progress.total
            ));
        }
    });
    if let Some(pb) = &progress_bar {
        pb.finish_and_clear();
    }

    if mode != OutputMode::Quiet {
        println!();
        if report.cancelled {
            println!("{}", style("Batch Cancelled:").yellow().bold());
        } else {
            println!("{}", style("Batch Complete:").cyan().bold());
        }
        println!("  Total:    {} movies", report.total);
        println!("  Success:  {}", style(report.succeeded).green());
        if report.failed > 0 {
            println!("  Failed:   {}", style(report.failed).red());
        }
        println!("  Time:     {:.1}s", report.elapsed.as_secs_f64());

        let failed: Vec<_> = batch
            .jobs()
            .iter()
            .filter(|job| !job.status().succeeded())
            .collect();
        if !failed.is_empty() && !report.cancelled {
            println!();
            println!("Failed movies:");
            for job in failed {
                println!("  {} {}", style("✗").red(), job.input.display());
            }
        }
    }

    // Per-movie failures and cancellation are reported above but do not
    // make the process exit non-zero; only argument and scan errors do.
}

/// Create the progress bar style.
fn create_progress_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}% | {msg}",
    )
    .unwrap()
    .progress_chars("#>-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_mode_selection() {
        let args = Args::parse_from(["deinterlace", "tapes/"]);
        assert_eq!(args.output_mode(), OutputMode::Normal);

        let args = Args::parse_from(["deinterlace", "tapes/", "--quiet"]);
        assert_eq!(args.output_mode(), OutputMode::Quiet);

        let args = Args::parse_from(["deinterlace", "tapes/", "-v"]);
        assert_eq!(args.output_mode(), OutputMode::Verbose);
    }

    #[test]
    fn test_missing_input_is_a_usage_error() {
        assert!(Args::try_parse_from(["deinterlace"]).is_err());
    }

    #[test]
    fn test_positional_output() {
        let args = Args::parse_from(["deinterlace", "tapes/", "restored/"]);
        assert_eq!(args.output, Some(PathBuf::from("restored/")));
        assert_eq!(args.jobs, None);
    }

    #[test]
    fn test_jobs_flag() {
        let args = Args::parse_from(["deinterlace", "tapes/", "--jobs", "3"]);
        assert_eq!(args.jobs, Some(3));
    }
}
