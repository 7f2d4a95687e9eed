/// Launches the worker pool, consumes their notifications, and blocks
/// until every worker has been reaped.
use crate::event_log::EventLog;
use crate::notify::{Notification, Notifier};
use crate::worker::{self, WorkerError, WorkerReport, WorkerSpec, WorkerTuning};
use tokio::sync::mpsc::UnboundedReceiver;

/// Terminal state of one reaped worker, in launch order.
#[derive(Debug)]
pub enum WorkerOutcome {
    /// Consumed its whole input; its completion notification was sent.
    Completed(WorkerReport),
    /// Hit a fatal worker-local error; no completion notification exists.
    /// Observable in the log only by the absence of a completion record.
    Failed { id: u32, error: WorkerError },
    /// The worker's task panicked; treated like a local failure.
    Panicked { id: u32, reason: String },
}

impl WorkerOutcome {
    #[allow(dead_code)]
    pub fn id(&self) -> u32 {
        match self {
            WorkerOutcome::Completed(report) => report.id,
            WorkerOutcome::Failed { id, .. } | WorkerOutcome::Panicked { id, .. } => *id,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, WorkerOutcome::Completed(_))
    }
}

/// Launch every worker as its own concurrent unit and block until all of
/// them have terminated, one way or another.
///
/// The notification consumer is running before the first worker launches,
/// so an early notification can never arrive without a handler. Worker
/// failures are confined to their own outcome: siblings and the supervisor
/// keep going. No unit is left unreaped on any path out of this function.
pub async fn run_all(
    specs: Vec<WorkerSpec>,
    tuning: WorkerTuning,
    log: EventLog,
) -> Vec<WorkerOutcome> {
    let (notifier, rx) = Notifier::channel();
    let consumer = tokio::spawn(consume_notifications(rx, log));

    let mut handles = Vec::with_capacity(specs.len());
    for spec in specs {
        let id = spec.id;
        tracing::info!(
            worker = id,
            input = %spec.input.display(),
            size_bytes = spec.size_bytes,
            "launching worker"
        );
        handles.push((id, tokio::spawn(worker::run(spec, tuning, notifier.clone()))));
    }
    // Workers hold the remaining sender clones; once the last worker ends,
    // the consumer sees the channel close and drains out.
    drop(notifier);

    let mut outcomes = Vec::with_capacity(handles.len());
    for (id, handle) in handles {
        let outcome = match handle.await {
            Ok(Ok(report)) => {
                tracing::info!(
                    worker = id,
                    bytes_consumed = report.bytes_consumed,
                    peak_resident_kb = report.peak_resident_kb,
                    threshold_crossed = report.threshold_crossed,
                    "worker reaped"
                );
                WorkerOutcome::Completed(report)
            }
            Ok(Err(error)) => {
                tracing::error!(worker = id, error = %error, "worker failed");
                WorkerOutcome::Failed { id, error }
            }
            Err(join_error) => {
                tracing::error!(worker = id, error = %join_error, "worker panicked");
                WorkerOutcome::Panicked {
                    id,
                    reason: join_error.to_string(),
                }
            }
        };
        outcomes.push(outcome);
    }

    if let Err(join_error) = consumer.await {
        tracing::error!(error = %join_error, "notification consumer panicked");
    }
    outcomes
}

/// The supervisor's single notification handler: a loop over the channel.
///
/// Appends funnel through this one task plus the log's own file lock, so
/// records never interleave even with other processes on the same file. A
/// failed append is diverted to standard error; the record is never
/// silently dropped.
async fn consume_notifications(mut rx: UnboundedReceiver<Notification>, log: EventLog) {
    while let Some(notification) = rx.recv().await {
        let message = notification.message();
        tracing::info!(worker = notification.worker, "{message}");
        if let Err(error) = log.append(&message) {
            tracing::warn!(error = %error, "event log append failed, diverting record to stderr");
            eprintln!("[unlogged] {message}");
        }
    }
}
