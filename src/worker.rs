/// Single worker lifecycle: stream one input file in bounded chunks,
/// watch own resident memory after every chunk, and raise at most one
/// threshold notification plus exactly one completion notification.
use crate::monitor::{MemoryMonitor, MonitorError};
use crate::notify::{Notification, Notifier};
use std::collections::TryReserveError;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

/// Immutable launch order for one worker. Built by the input-generation
/// step, consumed once by the supervisor.
#[derive(Debug, Clone)]
pub struct WorkerSpec {
    /// 1-based launch ordinal; the worker's identity in every notification.
    pub id: u32,
    /// Readable input file.
    pub input: PathBuf,
    /// Expected input size in bytes (diagnostics only; the read loop trusts
    /// end-of-file, not this number).
    pub size_bytes: u64,
}

/// Knobs shared by every worker, resolved from config at startup.
#[derive(Debug, Clone, Copy)]
pub struct WorkerTuning {
    /// Bytes per bounded read.
    pub chunk_bytes: usize,
    /// Working buffer size. Deliberately overshoots the threshold so that a
    /// normal run reliably crosses the watermark; a demo property, not a
    /// production sizing rule.
    pub buffer_bytes: usize,
    /// Resident-memory watermark in kilobytes.
    pub threshold_kb: u64,
}

/// What a worker reports back after consuming its whole input.
#[derive(Debug)]
pub struct WorkerReport {
    pub id: u32,
    /// Total bytes read from the input.
    pub bytes_consumed: u64,
    /// Highest resident reading observed across the run.
    pub peak_resident_kb: u64,
    /// Whether the threshold notification fired.
    pub threshold_crossed: bool,
}

/// Errors fatal to the owning worker. None of these abort the supervisor
/// or sibling workers; a worker that fails here never sends its completion
/// notification.
#[derive(Debug)]
pub enum WorkerError {
    /// The input file could not be opened.
    ResourceOpen {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The working buffer could not be allocated.
    Allocation {
        bytes: usize,
        source: TryReserveError,
    },
    /// The memory monitor is unavailable or broke mid-run.
    Monitor { source: MonitorError },
    /// A chunk read failed.
    Io { source: std::io::Error },
}

impl std::fmt::Display for WorkerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerError::ResourceOpen { path, source } => {
                write!(f, "failed to open input {}: {}", path.display(), source)
            }
            WorkerError::Allocation { bytes, source } => {
                write!(f, "failed to allocate {bytes}-byte working buffer: {source}")
            }
            WorkerError::Monitor { source } => {
                write!(f, "memory monitoring failed: {source}")
            }
            WorkerError::Io { source } => write!(f, "input read failed: {source}"),
        }
    }
}

impl std::error::Error for WorkerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorkerError::ResourceOpen { source, .. } => Some(source),
            WorkerError::Allocation { source, .. } => Some(source),
            WorkerError::Monitor { source } => Some(source),
            WorkerError::Io { source } => Some(source),
        }
    }
}

/// Run one worker to completion.
///
/// Emits 0 or 1 `ThresholdExceeded` followed by exactly 1 `Completed` on
/// the success path; on any error the worker terminates with no completion
/// notification, which is how the supervisor distinguishes an incomplete
/// worker from a finished one.
pub async fn run(
    spec: WorkerSpec,
    tuning: WorkerTuning,
    notifier: Notifier,
) -> Result<WorkerReport, WorkerError> {
    let mut input =
        tokio::fs::File::open(&spec.input)
            .await
            .map_err(|e| WorkerError::ResourceOpen {
                path: spec.input.clone(),
                source: e,
            })?;

    let mut buffer = acquire_buffer(tuning.buffer_bytes)?;
    let mut monitor = MemoryMonitor::new().map_err(|e| WorkerError::Monitor { source: e })?;

    tracing::debug!(
        worker = spec.id,
        input = %spec.input.display(),
        buffer_bytes = tuning.buffer_bytes,
        "worker streaming input"
    );

    let mut consumed: u64 = 0;
    let mut peak_kb: u64 = 0;
    let mut threshold_sent = false;
    // The write offset wraps inside the buffer: inputs larger than the
    // buffer keep landing in it without ever running past the end.
    let window = tuning
        .buffer_bytes
        .saturating_sub(tuning.chunk_bytes)
        .max(1) as u64;

    loop {
        let offset = (consumed % window) as usize;
        let end = (offset + tuning.chunk_bytes).min(buffer.len());
        let n = input
            .read(&mut buffer[offset..end])
            .await
            .map_err(|e| WorkerError::Io { source: e })?;
        if n == 0 {
            break;
        }
        consumed += n as u64;

        let resident_kb = monitor
            .resident_kb()
            .map_err(|e| WorkerError::Monitor { source: e })?;
        peak_kb = peak_kb.max(resident_kb);

        if resident_kb > tuning.threshold_kb && !threshold_sent {
            tracing::debug!(worker = spec.id, resident_kb, "memory threshold crossed");
            notifier.notify(Notification::threshold_exceeded(spec.id));
            threshold_sent = true;
        }
    }

    // All reads and monitor polls have ceased; release resources before
    // the terminal notification.
    drop(buffer);
    drop(input);
    notifier.notify(Notification::completed(spec.id));

    Ok(WorkerReport {
        id: spec.id,
        bytes_consumed: consumed,
        peak_resident_kb: peak_kb,
        threshold_crossed: threshold_sent,
    })
}

/// Fallibly allocate the working buffer and fill it, so its pages are
/// actually resident rather than lazily mapped.
fn acquire_buffer(bytes: usize) -> Result<Vec<u8>, WorkerError> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(bytes)
        .map_err(|e| WorkerError::Allocation { bytes, source: e })?;
    buffer.resize(bytes, 0);
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuning(threshold_kb: u64) -> WorkerTuning {
        WorkerTuning {
            chunk_bytes: 4096,
            buffer_bytes: 64 * 1024,
            threshold_kb,
        }
    }

    fn spec(id: u32, input: &std::path::Path, size_bytes: u64) -> WorkerSpec {
        WorkerSpec {
            id,
            input: input.to_path_buf(),
            size_bytes,
        }
    }

    async fn drain(mut rx: tokio::sync::mpsc::UnboundedReceiver<Notification>) -> Vec<Notification> {
        let mut events = Vec::new();
        while let Some(n) = rx.recv().await {
            events.push(n);
        }
        events
    }

    #[tokio::test]
    async fn zero_byte_input_completes_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.bin");
        std::fs::write(&path, b"").unwrap();

        let (notifier, rx) = Notifier::channel();
        let report = run(spec(1, &path, 0), tuning(u64::MAX), notifier)
            .await
            .unwrap();

        assert_eq!(report.bytes_consumed, 0);
        assert!(!report.threshold_crossed);
        assert_eq!(drain(rx).await, vec![Notification::completed(1)]);
    }

    #[tokio::test]
    async fn floor_threshold_fires_exactly_once_before_completion() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.bin");
        // Five chunks; every post-chunk poll exceeds a zero threshold, so
        // only the latch keeps this to a single event.
        std::fs::write(&path, vec![b'X'; 5 * 4096]).unwrap();

        let (notifier, rx) = Notifier::channel();
        let report = run(spec(2, &path, 5 * 4096), tuning(0), notifier)
            .await
            .unwrap();

        assert!(report.threshold_crossed);
        assert!(report.peak_resident_kb > 0);
        assert_eq!(
            drain(rx).await,
            vec![
                Notification::threshold_exceeded(2),
                Notification::completed(2),
            ]
        );
    }

    #[tokio::test]
    async fn unreachable_threshold_never_fires() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.bin");
        std::fs::write(&path, vec![b'X'; 3 * 4096]).unwrap();

        let (notifier, rx) = Notifier::channel();
        let report = run(spec(1, &path, 3 * 4096), tuning(u64::MAX), notifier)
            .await
            .unwrap();

        assert!(!report.threshold_crossed);
        assert_eq!(drain(rx).await, vec![Notification::completed(1)]);
    }

    #[tokio::test]
    async fn input_larger_than_buffer_is_consumed_in_full() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        let size = 32 * 1024u64;
        std::fs::write(&path, vec![b'X'; size as usize]).unwrap();

        let (notifier, rx) = Notifier::channel();
        let small = WorkerTuning {
            chunk_bytes: 4096,
            buffer_bytes: 10 * 1024,
            threshold_kb: u64::MAX,
        };
        let report = run(spec(3, &path, size), small, notifier).await.unwrap();

        assert_eq!(report.bytes_consumed, size);
        assert_eq!(drain(rx).await, vec![Notification::completed(3)]);
    }

    #[tokio::test]
    async fn missing_input_fails_without_any_notification() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.bin");

        let (notifier, rx) = Notifier::channel();
        let err = run(spec(1, &path, 0), tuning(u64::MAX), notifier)
            .await
            .unwrap_err();

        assert!(matches!(err, WorkerError::ResourceOpen { .. }));
        assert!(err.to_string().contains("failed to open input"));
        assert_eq!(drain(rx).await, vec![]);
    }

    #[tokio::test]
    async fn short_final_chunk_is_counted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odd.bin");
        std::fs::write(&path, vec![b'X'; 4096 + 100]).unwrap();

        let (notifier, rx) = Notifier::channel();
        let report = run(spec(1, &path, 4196), tuning(u64::MAX), notifier)
            .await
            .unwrap();

        assert_eq!(report.bytes_consumed, 4196);
        assert_eq!(drain(rx).await, vec![Notification::completed(1)]);
    }

    #[test]
    fn acquire_buffer_fills_to_requested_size() {
        let buffer = acquire_buffer(8 * 1024).unwrap();
        assert_eq!(buffer.len(), 8 * 1024);
    }
}
