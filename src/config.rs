use crate::core::{QueryError, Result};
use crate::sink::{LogSink, TracingSink, WriterSink};
use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Process-wide default configuration, installed at most once.
static GLOBAL_CONFIG: OnceCell<QueryConfig> = OnceCell::new();

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    pub query: Option<QuerySection>,
}

/// Query logging configuration.
#[derive(Debug, Default, Deserialize)]
pub struct QuerySection {
    pub verbose: Option<bool>,
    pub sink: Option<SinkKind>,
    /// Append diagnostics to this file; takes precedence over `sink`
    pub log_file: Option<PathBuf>,
}

/// Built-in sinks selectable from a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    Tracing,
    Stderr,
    Stdout,
}

/// Settings threaded into every `QueryContext` at construction.
#[derive(Clone, Default)]
pub struct QueryConfig {
    /// Where flushed diagnostics go; `TracingSink` when unset
    pub logger: Option<Arc<dyn LogSink>>,
    /// Log successful steps too, not just failures
    pub verbose: bool,
}

impl fmt::Debug for QueryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryConfig")
            .field("logger", &self.logger.as_ref().map(|_| "<sink>"))
            .field("verbose", &self.verbose)
            .finish()
    }
}

impl QueryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_logger(mut self, logger: Arc<dyn LogSink>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// The configured sink, or the tracing fallback
    pub fn sink(&self) -> Arc<dyn LogSink> {
        match &self.logger {
            Some(logger) => Arc::clone(logger),
            None => Arc::new(TracingSink),
        }
    }

    /// Builds a config from a parsed file, opening a log file if one is named.
    pub fn from_file(file: &ConfigFile) -> Result<Self> {
        let Some(section) = &file.query else {
            return Ok(Self::default());
        };

        let logger: Option<Arc<dyn LogSink>> = match (&section.log_file, section.sink) {
            (Some(path), _) => Some(Arc::new(WriterSink::file(path)?)),
            (None, Some(SinkKind::Stderr)) => Some(Arc::new(WriterSink::stderr())),
            (None, Some(SinkKind::Stdout)) => Some(Arc::new(WriterSink::stdout())),
            (None, Some(SinkKind::Tracing)) | (None, None) => None,
        };

        Ok(QueryConfig {
            logger,
            verbose: section.verbose.unwrap_or(false),
        })
    }

    /// The process-wide default, if one was installed
    pub fn global() -> Option<&'static QueryConfig> {
        GLOBAL_CONFIG.get()
    }

    /// What `QueryContext::new` uses: the process-wide default or `Default`
    pub fn global_or_default() -> QueryConfig {
        Self::global().cloned().unwrap_or_default()
    }
}

/// Installs the process-wide default configuration.
///
/// Only the first call succeeds; the default cannot be changed afterwards.
pub fn install_global(config: QueryConfig) -> Result<()> {
    GLOBAL_CONFIG
        .set(config)
        .map_err(|_| QueryError::Config("Global query configuration already installed".to_string()))
}

/// Parses configuration from TOML text.
pub fn parse_config(content: &str) -> Result<QueryConfig> {
    let file: ConfigFile = toml::from_str(content)?;
    QueryConfig::from_file(&file)
}

/// Loads configuration from a TOML file at the given path.
///
/// # Example
///
/// ```no_run
/// let config = querylog::config::load_config("querylog.toml").expect("Failed to load config");
/// println!("{:?}", config);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<QueryConfig> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// `<config dir>/querylog/config.toml`, when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("querylog").join("config.toml"))
}
