use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Resident-memory self-observation via `/proc/self/status`.
///
/// The handle to the metric source is opened once and rewound on every
/// reading. Reopening per reading also works but costs an open/parse/close
/// for every chunk a worker consumes, so the cached handle is the strategy
/// used here.
#[derive(Debug)]
pub struct MemoryMonitor {
    status: File,
}

/// Errors from the memory monitor.
#[derive(Debug)]
pub enum MonitorError {
    /// The host does not expose per-process memory introspection.
    Unavailable { source: std::io::Error },
    /// The metric source could not be re-read.
    Read { source: std::io::Error },
    /// The metric source had no resident-memory line.
    Malformed,
}

impl std::fmt::Display for MonitorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorError::Unavailable { source } => {
                write!(f, "process memory introspection unavailable: {source}")
            }
            MonitorError::Read { source } => {
                write!(f, "failed to read process status: {source}")
            }
            MonitorError::Malformed => write!(f, "process status has no VmRSS line"),
        }
    }
}

impl std::error::Error for MonitorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MonitorError::Unavailable { source } => Some(source),
            MonitorError::Read { source } => Some(source),
            MonitorError::Malformed => None,
        }
    }
}

impl MemoryMonitor {
    /// Open the calling process's own status interface.
    ///
    /// Fails with `Unavailable` when the host has no procfs; callers treat
    /// that as fatal rather than degrading to a silent zero reading.
    pub fn new() -> Result<Self, MonitorError> {
        Self::open(Path::new("/proc/self/status"))
    }

    fn open(path: &Path) -> Result<Self, MonitorError> {
        let status = File::open(path).map_err(|e| MonitorError::Unavailable { source: e })?;
        Ok(Self { status })
    }

    /// Current resident set size of the calling process, in kilobytes.
    ///
    /// Cheap enough to call after every chunk read: one rewind plus one
    /// short read of the cached handle.
    pub fn resident_kb(&mut self) -> Result<u64, MonitorError> {
        self.status
            .seek(SeekFrom::Start(0))
            .map_err(|e| MonitorError::Read { source: e })?;
        let mut text = String::new();
        self.status
            .read_to_string(&mut text)
            .map_err(|e| MonitorError::Read { source: e })?;
        parse_resident_kb(&text).ok_or(MonitorError::Malformed)
    }
}

/// Pull the kilobyte value out of the `VmRSS:` line of a status dump.
fn parse_resident_kb(text: &str) -> Option<u64> {
    let line = text.lines().find(|l| l.starts_with("VmRSS:"))?;
    line["VmRSS:".len()..]
        .split_whitespace()
        .next()?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_resident_line() {
        let text = "Name:\tmemvisor\nVmPeak:\t  123456 kB\nVmRSS:\t   51234 kB\nThreads:\t4\n";
        assert_eq!(parse_resident_kb(text), Some(51_234));
    }

    #[test]
    fn parse_is_deterministic_for_a_fixed_snapshot() {
        let text = "VmRSS:\t     812 kB\n";
        assert_eq!(parse_resident_kb(text), parse_resident_kb(text));
    }

    #[test]
    fn missing_resident_line_is_none() {
        assert_eq!(parse_resident_kb("Name:\tmemvisor\nThreads:\t4\n"), None);
    }

    #[test]
    fn garbage_resident_line_is_none() {
        assert_eq!(parse_resident_kb("VmRSS:\tnot-a-number kB\n"), None);
    }

    #[test]
    fn open_failure_is_unavailable() {
        let err = MemoryMonitor::open(Path::new("/nonexistent/status")).unwrap_err();
        assert!(matches!(err, MonitorError::Unavailable { .. }));
    }

    #[test]
    fn cached_handle_survives_repeated_readings() {
        let mut monitor = MemoryMonitor::new().unwrap();
        for _ in 0..10 {
            assert!(monitor.resident_kb().unwrap() > 0);
        }
    }

    #[test]
    fn readings_do_not_decrease_while_only_allocating() {
        let mut monitor = MemoryMonitor::new().unwrap();
        let before = monitor.resident_kb().unwrap();

        // Touch every page so the growth is actually resident and dwarfs
        // any unrelated jitter from sibling test threads.
        let mut block = vec![0u8; 32 * 1024 * 1024];
        for page in block.chunks_mut(4096) {
            page[0] = 1;
        }
        std::hint::black_box(&block);

        let after = monitor.resident_kb().unwrap();
        assert!(
            after >= before,
            "resident reading fell from {before} KB to {after} KB during pure allocation"
        );
        drop(block);
    }
}
