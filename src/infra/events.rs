use serde::Serialize;
use tokio::sync::broadcast;

pub const EVENT_NEW_PENDING_POST: &str = "new_pending_post";
pub const EVENT_NEW_MESSAGE: &str = "new_message";

#[derive(Debug, Clone)]
pub struct RealtimeEvent {
    pub name: &'static str,
    pub payload: serde_json::Value,
}

/// Fan-out of state-change events to currently connected clients. No backlog:
/// subscribers that connect later, or fall behind, miss events.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RealtimeEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Fire-and-forget publish. A send with no subscribers is not an error.
    pub fn publish(&self, name: &'static str, payload: &impl Serialize) {
        let payload = match serde_json::to_value(payload) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(error = ?err, event = name, "failed to serialize realtime event");
                return;
            }
        };
        let _ = self.sender.send(RealtimeEvent { name, payload });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_subscribers() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(EVENT_NEW_MESSAGE, &serde_json::json!({ "body": "hi" }));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name, EVENT_NEW_MESSAGE);
        assert_eq!(event.payload["body"], "hi");
    }

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let bus = EventBus::new(8);
        bus.publish(EVENT_NEW_PENDING_POST, &serde_json::json!({}));
    }
}
