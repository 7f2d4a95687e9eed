use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Number of supervised workers. Worker identity is positional (1-based),
/// so the input sizes list must have exactly this many entries.
pub const WORKER_COUNT: usize = 3;

/// Top-level configuration loaded from memvisor.toml.
#[derive(Debug, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct VisorConfig {
    pub workers: WorkersConfig,
    pub monitor: MonitorConfig,
    pub log: LogConfig,
    pub inputs: InputsConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    /// Input file size per worker, in megabytes.
    pub sizes_mb: Vec<u32>,
    /// Bytes read from the input per chunk.
    pub chunk_bytes: usize,
    /// Working buffer size per worker, in bytes. Must stay above the
    /// monitor threshold so the threshold is crossed during a normal run.
    pub buffer_bytes: usize,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Resident-memory watermark, in kilobytes.
    pub threshold_kb: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Shared append-only event log file.
    pub file: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct InputsConfig {
    /// Directory the generated input files are written to.
    pub dir: PathBuf,
    /// Byte value the input files are filled with.
    pub filler_byte: u8,
}

// --- Default implementations ---

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            sizes_mb: vec![5, 50, 500],
            chunk_bytes: 4096,
            buffer_bytes: 50 * 1024 * 1024,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            threshold_kb: 50_000,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("syslog.log"),
        }
    }
}

impl Default for InputsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("inputs"),
            filler_byte: b'X',
        }
    }
}

/// Errors that can occur while loading or validating configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The config file is not valid TOML.
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// The configuration is syntactically valid but unusable.
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config file {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse config file {}: {}", path.display(), source)
            }
            ConfigError::Invalid(msg) => write!(f, "invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Invalid(_) => None,
        }
    }
}

/// Load configuration from `path`, falling back to pure defaults when the
/// file does not exist. A file that exists but cannot be read or parsed is
/// a startup error, not a silent fallback.
pub fn load(path: &Path) -> Result<VisorConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(VisorConfig::default());
    }
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    toml::from_str(&text).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

impl VisorConfig {
    /// Check cross-field invariants after CLI overrides have been applied.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers.sizes_mb.len() != WORKER_COUNT {
            return Err(ConfigError::Invalid(format!(
                "expected {} worker sizes, got {}",
                WORKER_COUNT,
                self.workers.sizes_mb.len()
            )));
        }
        if self.workers.sizes_mb.iter().any(|&mb| mb == 0) {
            return Err(ConfigError::Invalid(
                "worker sizes must be positive".to_string(),
            ));
        }
        if self.workers.chunk_bytes == 0 {
            return Err(ConfigError::Invalid(
                "chunk_bytes must be positive".to_string(),
            ));
        }
        if self.workers.chunk_bytes >= self.workers.buffer_bytes {
            return Err(ConfigError::Invalid(format!(
                "chunk_bytes ({}) must be smaller than buffer_bytes ({})",
                self.workers.chunk_bytes, self.workers.buffer_bytes
            )));
        }
        // The working buffer must overshoot the watermark, otherwise the
        // threshold event cannot fire from the buffer alone.
        if (self.workers.buffer_bytes as u64) <= self.monitor.threshold_kb * 1024 {
            return Err(ConfigError::Invalid(format!(
                "buffer_bytes ({}) must exceed threshold_kb ({} KB)",
                self.workers.buffer_bytes, self.monitor.threshold_kb
            )));
        }
        Ok(())
    }
}
