//! pagefetch: fetch many copies of one page concurrently.
//!
//! Opens one connection per page to a single destination, sends the same
//! request on each, and saves every response under an output directory.
//! All connections are driven from the calling thread by
//! [`fetch_reactor`].

pub mod config;
pub mod logging;
pub mod output;
pub mod resolve;

pub use config::Config;
pub use output::OutputDir;

use config::ConfigError;
use fetch_reactor::{BatchReport, CollectSink, Reactor, ReactorError};
use output::OutputError;
use resolve::ResolveError;
use thiserror::Error;
use tracing::info;

/// Batch-fatal error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error("fetch failed: {0}")]
    Reactor(#[from] ReactorError),
}

/// Outcome of one batch.
#[derive(Debug, Clone)]
pub struct Summary {
    pub report: BatchReport,
    /// Number of page files written.
    pub written: usize,
}

/// Fetch `pages` pages as described by `config` and write them out.
///
/// `pages` is bounded by [`config::MAX_PAGES`]. The output directory is
/// recreated before any connection is opened. Pages are written only after
/// the batch finishes, so `report.elapsed` covers the network work alone.
pub fn fetch(config: &Config, pages: usize) -> Result<Summary, Error> {
    config::check_pages(pages)?;
    let destination = resolve::resolve(&config.fetch.destination)?;
    let out = OutputDir::recreate(&config.output.directory, config.output.extension.as_str())?;

    let mut sink = CollectSink::new(pages);
    let report = Reactor::new(config.fetch_config(destination, pages))?.run(&mut sink)?;

    let written = out.write_all(&sink)?;
    info!(
        written,
        directory = %out.path().display(),
        "pages saved"
    );

    Ok(Summary { report, written })
}
