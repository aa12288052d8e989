use crate::infra::queue::{EmailJob, QueueClient};

/// Outbound-notification dispatch. Every notify is detached from the calling
/// request: the state transition that triggered it has already committed, and
/// enqueue failures are logged and swallowed, never surfaced to the caller.
#[derive(Clone)]
pub struct Notifier {
    queue: QueueClient,
}

impl Notifier {
    pub fn new(queue: QueueClient) -> Self {
        Self { queue }
    }

    pub fn notify(&self, recipient: String, subject: String, body: String) {
        let queue = self.queue.clone();
        tokio::spawn(async move {
            let job = EmailJob {
                recipient,
                subject,
                body,
            };
            if let Err(err) = queue.enqueue_email(&job).await {
                tracing::warn!(
                    error = ?err,
                    subject = %job.subject,
                    "failed to enqueue outbound email"
                );
            }
        });
    }
}
