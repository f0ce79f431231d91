//! pagefetch command line.

use clap::Parser;
use pagefetch::config::{Config, DEFAULT_CONFIG};
use pagefetch::logging;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pagefetch")]
#[command(about = "Fetch many copies of one page concurrently from a single thread")]
struct Args {
    /// Number of pages to fetch (one connection each)
    pages: Option<usize>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Destination as host:port
    #[arg(short, long)]
    destination: Option<String>,

    /// Output directory, removed and recreated on every run
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Give up after this many seconds without socket activity
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Print default configuration and exit
    #[arg(long)]
    print_config: bool,
}

fn main() {
    let args = Args::parse();

    if args.print_config {
        print!("{DEFAULT_CONFIG}");
        return;
    }

    let mut config = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load config: {}", e);
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };

    if let Some(destination) = args.destination {
        config.fetch.destination = destination;
    }
    if let Some(output) = args.output {
        config.output.directory = output;
    }
    if let Some(secs) = args.timeout_secs {
        config.fetch.idle_timeout_secs = secs;
    }
    if let Err(e) = config.validate() {
        eprintln!("{e}");
        std::process::exit(1);
    }

    let Some(pages) = args.pages.or(config.fetch.pages) else {
        eprintln!("please specify the number of web pages in the first command line argument");
        return;
    };

    logging::init(&config.logging);

    match pagefetch::fetch(&config, pages) {
        Ok(summary) => {
            println!("Time elapsed: {}ms", summary.report.elapsed.as_millis());
        }
        Err(e) => {
            tracing::error!(error = %e, "fetch failed");
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
