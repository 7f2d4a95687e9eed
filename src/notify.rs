use tokio::sync::mpsc;

/// The two distinguishable signals a worker can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// The worker's resident memory crossed the configured watermark.
    ThresholdExceeded,
    /// The worker exhausted its input and released its resources.
    Completed,
}

/// One asynchronous signal from a worker to the supervisor.
///
/// Carries only the sender's identity (its 1-based launch ordinal) and the
/// kind; everything else the supervisor needs it derives itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub worker: u32,
}

impl Notification {
    pub fn threshold_exceeded(worker: u32) -> Self {
        Self {
            kind: NotificationKind::ThresholdExceeded,
            worker,
        }
    }

    pub fn completed(worker: u32) -> Self {
        Self {
            kind: NotificationKind::Completed,
            worker,
        }
    }

    /// The human-readable record text this event contributes to the log.
    pub fn message(&self) -> String {
        match self.kind {
            NotificationKind::ThresholdExceeded => {
                format!("Worker {} exceeded memory threshold", self.worker)
            }
            NotificationKind::Completed => format!("Worker {} completed", self.worker),
        }
    }
}

/// Sending half of the notification channel, cloned into every worker.
///
/// Sends never block and never fail as far as the sender is concerned: the
/// channel is unbounded, and a send after the receiver is gone is dropped
/// silently (fire-and-forget). No ordering is guaranteed across different
/// senders; per-sender order is preserved.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    /// Create the channel: one `Notifier` to clone among senders, one
    /// receiver for the supervisor's consumer.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn notify(&self, notification: Notification) {
        let _ = self.tx.send(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_templates_carry_the_worker_identity() {
        assert_eq!(
            Notification::threshold_exceeded(2).message(),
            "Worker 2 exceeded memory threshold"
        );
        assert_eq!(Notification::completed(3).message(), "Worker 3 completed");
    }

    #[tokio::test]
    async fn per_sender_order_is_preserved() {
        let (notifier, mut rx) = Notifier::channel();
        notifier.notify(Notification::threshold_exceeded(1));
        notifier.notify(Notification::completed(1));
        drop(notifier);

        assert_eq!(rx.recv().await, Some(Notification::threshold_exceeded(1)));
        assert_eq!(rx.recv().await, Some(Notification::completed(1)));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn send_after_receiver_is_gone_is_silently_dropped() {
        let (notifier, rx) = Notifier::channel();
        drop(rx);
        // Must not panic or block; the sender does not care.
        notifier.notify(Notification::completed(1));
    }

    #[tokio::test]
    async fn receiver_drains_after_all_senders_drop() {
        let (notifier, mut rx) = Notifier::channel();
        let second = notifier.clone();
        notifier.notify(Notification::completed(1));
        second.notify(Notification::completed(2));
        drop(notifier);
        drop(second);

        let mut seen = Vec::new();
        while let Some(n) = rx.recv().await {
            seen.push(n.worker);
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2]);
    }
}
