use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

// Single variant today; kept as a closed enum so the column cannot drift
// into free text if delivery states are added later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
}

impl MessageStatus {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "sent" => Some(Self::Sent),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub body: String,
    pub status: MessageStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
