use anyhow::{anyhow, Result};
use sqlx::Row;
use uuid::Uuid;

use crate::domain::message::{Message, MessageStatus};
use crate::infra::db::Db;
use crate::infra::events::{EventBus, EVENT_NEW_MESSAGE};

#[derive(Clone)]
pub struct MessageService {
    db: Db,
    events: EventBus,
}

impl MessageService {
    pub fn new(db: Db, events: EventBus) -> Self {
        Self { db, events }
    }

    /// Appends a message and pushes it to connected clients. Returns None
    /// when the receiver does not exist.
    pub async fn send(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        body: String,
    ) -> Result<Option<Message>> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(receiver_id)
            .fetch_one(self.db.pool())
            .await?;
        if !exists {
            return Ok(None);
        }

        let row = sqlx::query(
            "INSERT INTO messages (sender_id, receiver_id, body) VALUES ($1, $2, $3) \
             RETURNING id, sender_id, receiver_id, body, status::text AS status, created_at",
        )
        .bind(sender_id)
        .bind(receiver_id)
        .bind(body)
        .fetch_one(self.db.pool())
        .await?;

        let message = message_from_row(&row)?;
        self.events.publish(EVENT_NEW_MESSAGE, &message);
        Ok(Some(message))
    }

    /// Both directions of the unordered pair, ascending by timestamp — the
    /// same sequence no matter which side asks.
    pub async fn conversation(&self, user_id: Uuid, friend_id: Uuid) -> Result<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT id, sender_id, receiver_id, body, status::text AS status, created_at \
             FROM messages \
             WHERE (sender_id = $1 AND receiver_id = $2) \
                OR (sender_id = $2 AND receiver_id = $1) \
             ORDER BY created_at ASC, id ASC",
        )
        .bind(user_id)
        .bind(friend_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(message_from_row).collect()
    }
}

fn message_from_row(row: &sqlx::postgres::PgRow) -> Result<Message> {
    let status: String = row.get("status");
    let status = MessageStatus::from_db(&status)
        .ok_or_else(|| anyhow!("unknown message status: {}", status))?;
    Ok(Message {
        id: row.get("id"),
        sender_id: row.get("sender_id"),
        receiver_id: row.get("receiver_id"),
        body: row.get("body"),
        status,
        created_at: row.get("created_at"),
    })
}
