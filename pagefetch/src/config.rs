//! pagefetch configuration.
//!
//! Loaded from an optional TOML file. Every field has a default, so an empty
//! file (or no file at all) describes the stock batch: `GET /` against the
//! default destination, results under `./out/`.

use fetch_reactor::{
    DEFAULT_CHUNK_SIZE, DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_EVENTS, DEFAULT_REQUEST, FetchConfig,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default destination, `host:port`.
pub const DEFAULT_DESTINATION: &str = "142.251.46.228:80";

/// Largest page count accepted. Each page holds one socket and one
/// ephemeral port for the whole batch.
pub const MAX_PAGES: usize = 65_536;

/// Commented default configuration, printed by `--print-config`.
pub const DEFAULT_CONFIG: &str = r#"# pagefetch configuration

[fetch]
# Destination as host:port. Hostnames are resolved once, IPv4 preferred.
destination = "142.251.46.228:80"
# Number of concurrent connections (one output file each).
# Usually given on the command line instead.
# pages = 8
# Give up after this many seconds without any socket activity
idle_timeout_secs = 10
# Maximum bytes per read
chunk_size = 1023
# Maximum readiness events handled per wait
max_events = 100
# Request written on every connection. Keep HTTP/1.0 so the server closes
# the connection once the response is sent.
request = "GET / HTTP/1.0\r\n\r\n"

[output]
# Directory for the fetched pages. Removed and recreated on every run.
directory = "out"
# File extension, files are named <slot>.<extension>
extension = "html"

[logging]
# Log level: "error", "warn", "info", "debug", "trace"
# Can be overridden with RUST_LOG environment variable
level = "warn"
# Log format: "pretty" (human-readable), "json", or "compact"
format = "pretty"
# Include timestamps
timestamps = true
"#;

/// Configuration file error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Batch settings
    #[serde(default)]
    pub fetch: FetchSection,

    /// Where fetched pages are written
    #[serde(default)]
    pub output: OutputConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[fetch]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FetchSection {
    /// Destination as `host:port`.
    #[serde(default = "default_destination")]
    pub destination: String,

    /// Number of pages. The command line argument wins when both are set.
    #[serde(default)]
    pub pages: Option<usize>,

    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_max_events")]
    pub max_events: usize,

    #[serde(default = "default_request")]
    pub request: String,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            destination: default_destination(),
            pages: None,
            idle_timeout_secs: default_idle_timeout_secs(),
            chunk_size: default_chunk_size(),
            max_events: default_max_events(),
            request: default_request(),
        }
    }
}

/// `[output]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,

    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            extension: default_extension(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, multi-field
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
    /// Single-line human-readable
    Compact,
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level filter, `RUST_LOG` syntax.
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default = "default_true")]
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            timestamps: true,
        }
    }
}

fn default_destination() -> String {
    DEFAULT_DESTINATION.to_string()
}

fn default_idle_timeout_secs() -> u64 {
    DEFAULT_IDLE_TIMEOUT.as_secs()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_max_events() -> usize {
    DEFAULT_MAX_EVENTS
}

fn default_request() -> String {
    String::from_utf8_lossy(DEFAULT_REQUEST).into_owned()
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("out")
}

fn default_extension() -> String {
    "html".to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(pages) = self.fetch.pages {
            check_pages(pages)?;
        }

        if self.fetch.destination.trim().is_empty() {
            return Err(ConfigError::Invalid("destination must not be empty".into()));
        }

        if self.fetch.idle_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "idle_timeout_secs must be at least 1".into(),
            ));
        }

        if self.fetch.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be at least 1".into()));
        }

        if self.fetch.max_events == 0 {
            return Err(ConfigError::Invalid("max_events must be at least 1".into()));
        }

        if !self.fetch.request.ends_with("\r\n\r\n") {
            return Err(ConfigError::Invalid(
                "request must end with an empty line (\\r\\n\\r\\n)".into(),
            ));
        }

        let ext = &self.output.extension;
        if ext.is_empty() || ext.contains(['/', '\\', '.']) {
            return Err(ConfigError::Invalid(format!(
                "extension {ext:?} must be a non-empty name without separators or dots"
            )));
        }

        Ok(())
    }

    /// Idle window as a duration.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.idle_timeout_secs)
    }

    /// Engine configuration for a batch of `pages` connections to `destination`.
    pub fn fetch_config(&self, destination: SocketAddr, pages: usize) -> FetchConfig {
        let mut config = FetchConfig::new(destination);
        config.connections = pages;
        config.idle_timeout = self.idle_timeout();
        config.chunk_size = self.fetch.chunk_size;
        config.max_events = self.fetch.max_events;
        config.request = self.fetch.request.clone().into_bytes().into();
        config
    }
}

/// Reject page counts above [`MAX_PAGES`].
pub fn check_pages(pages: usize) -> Result<(), ConfigError> {
    if pages > MAX_PAGES {
        return Err(ConfigError::Invalid(format!(
            "pages ({pages}) must be at most {MAX_PAGES}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_text_matches_defaults() {
        let parsed: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(parsed, Config::default());
        parsed.validate().unwrap();
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let parsed: Config = toml::from_str("").unwrap();
        assert_eq!(parsed, Config::default());
        assert_eq!(parsed.fetch.request, "GET / HTTP/1.0\r\n\r\n");
        assert_eq!(parsed.output.directory, PathBuf::from("out"));
        assert_eq!(parsed.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_partial_sections() {
        let parsed: Config = toml::from_str(
            r#"
            [fetch]
            destination = "localhost:8080"
            pages = 4

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.fetch.destination, "localhost:8080");
        assert_eq!(parsed.fetch.pages, Some(4));
        assert_eq!(parsed.fetch.chunk_size, 1023);
        assert_eq!(parsed.logging.format, LogFormat::Json);
        assert!(parsed.logging.timestamps);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(toml::from_str::<Config>("[fetch]\nretries = 3\n").is_err());
        assert!(toml::from_str::<Config>("[metrics]\nport = 9090\n").is_err());
    }

    #[test]
    fn test_unknown_log_format_rejected() {
        assert!(toml::from_str::<Config>("[logging]\nformat = \"xml\"\n").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.fetch.chunk_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.fetch.max_events = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.fetch.idle_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.fetch.request = "GET / HTTP/1.0\r\n".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.output.extension = "../html".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.output.extension.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_page_count_is_capped() {
        check_pages(0).unwrap();
        check_pages(MAX_PAGES).unwrap();
        assert!(matches!(
            check_pages(MAX_PAGES + 1),
            Err(ConfigError::Invalid(_))
        ));

        let mut config = Config::default();
        config.fetch.pages = Some(usize::MAX);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pagefetch.toml");
        std::fs::write(&path, "[output]\ndirectory = \"pages\"\nextension = \"txt\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.output.directory, PathBuf::from("pages"));
        assert_eq!(config.output.extension, "txt");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(&dir.path().join("missing.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_load_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pagefetch.toml");
        std::fs::write(&path, "[fetch]\nmax_events = 0\n").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_fetch_config() {
        let mut config = Config::default();
        config.fetch.idle_timeout_secs = 3;
        config.fetch.chunk_size = 512;

        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let fetch = config.fetch_config(addr, 5);
        assert_eq!(fetch.destination, addr);
        assert_eq!(fetch.connections, 5);
        assert_eq!(fetch.idle_timeout, Duration::from_secs(3));
        assert_eq!(fetch.chunk_size, 512);
        assert_eq!(fetch.max_events, 100);
        assert_eq!(&fetch.request[..], DEFAULT_REQUEST);
    }
}
