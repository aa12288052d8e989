use anyhow::{anyhow, Result};
use sqlx::Row;
use std::collections::HashMap;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::friendship::{canonical_pair, FriendStatus, Friendship, FriendshipStatus};
use crate::infra::db::Db;

/// A pending request as shown in the receiver's inbox.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FriendRequest {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub sender_username: String,
    pub sender_first_name: String,
    pub sender_last_name: String,
    pub sender_city: Option<String>,
    pub sender_country: Option<String>,
    #[serde(skip_serializing)]
    pub sender_avatar_key: Option<String>,
    pub sender_avatar_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct FriendshipService {
    db: Db,
}

impl FriendshipService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Creates a pending edge. Returns None when an active (pending or
    /// accepted) edge already exists for the unordered pair — the partial
    /// unique index on the canonical pair decides, so two racing requests
    /// in opposite directions cannot both land.
    pub async fn send_request(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
    ) -> Result<Option<Friendship>> {
        let (user_lo, user_hi) = canonical_pair(sender_id, receiver_id);

        let row = sqlx::query(
            "INSERT INTO friendships (user_lo, user_hi, requested_by) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (user_lo, user_hi) WHERE status IN ('pending', 'accepted') \
             DO NOTHING \
             RETURNING id, user_lo, user_hi, requested_by, status::text AS status, \
                       created_at, responded_at",
        )
        .bind(user_lo)
        .bind(user_hi)
        .bind(sender_id)
        .fetch_optional(self.db.pool())
        .await?;

        match row {
            Some(row) => Ok(Some(friendship_from_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Accepts a pending request by its id. Only the side that did not send
    /// the request may accept.
    pub async fn accept_request(
        &self,
        receiver_id: Uuid,
        request_id: Uuid,
    ) -> Result<Option<Friendship>> {
        self.respond(receiver_id, request_id, FriendshipStatus::Accepted)
            .await
    }

    pub async fn reject_request(
        &self,
        receiver_id: Uuid,
        request_id: Uuid,
    ) -> Result<Option<Friendship>> {
        self.respond(receiver_id, request_id, FriendshipStatus::Rejected)
            .await
    }

    /// Accepts the pending request addressed to `receiver_id` by sender id,
    /// for callers that know the counterpart rather than the request.
    pub async fn accept_from(&self, receiver_id: Uuid, sender_id: Uuid) -> Result<Option<Friendship>> {
        let (user_lo, user_hi) = canonical_pair(sender_id, receiver_id);

        let row = sqlx::query(
            "UPDATE friendships \
             SET status = 'accepted', responded_at = now() \
             WHERE user_lo = $1 AND user_hi = $2 \
               AND status = 'pending' AND requested_by = $3 \
             RETURNING id, user_lo, user_hi, requested_by, status::text AS status, \
                       created_at, responded_at",
        )
        .bind(user_lo)
        .bind(user_hi)
        .bind(sender_id)
        .fetch_optional(self.db.pool())
        .await?;

        match row {
            Some(row) => Ok(Some(friendship_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn respond(
        &self,
        receiver_id: Uuid,
        request_id: Uuid,
        status: FriendshipStatus,
    ) -> Result<Option<Friendship>> {
        let row = sqlx::query(
            "UPDATE friendships \
             SET status = $3::friendship_status, responded_at = now() \
             WHERE id = $1 \
               AND status = 'pending' \
               AND requested_by <> $2 \
               AND (user_lo = $2 OR user_hi = $2) \
             RETURNING id, user_lo, user_hi, requested_by, status::text AS status, \
                       created_at, responded_at",
        )
        .bind(request_id)
        .bind(receiver_id)
        .bind(status.as_db())
        .fetch_optional(self.db.pool())
        .await?;

        match row {
            Some(row) => Ok(Some(friendship_from_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Removes the active edge between the unordered pair, whichever side
    /// asks. Removing a still-pending request cancels it.
    pub async fn remove_friend(&self, user_id: Uuid, friend_id: Uuid) -> Result<bool> {
        let (user_lo, user_hi) = canonical_pair(user_id, friend_id);

        let result = sqlx::query(
            "DELETE FROM friendships \
             WHERE user_lo = $1 AND user_hi = $2 AND status IN ('pending', 'accepted')",
        )
        .bind(user_lo)
        .bind(user_hi)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Classifies every user with an active edge touching the viewer.
    /// Users without an entry are not friends.
    pub async fn friend_statuses(&self, viewer_id: Uuid) -> Result<HashMap<Uuid, FriendStatus>> {
        let rows = sqlx::query(
            "SELECT user_lo, user_hi, requested_by, status::text AS status \
             FROM friendships \
             WHERE (user_lo = $1 OR user_hi = $1) \
               AND status IN ('pending', 'accepted')",
        )
        .bind(viewer_id)
        .fetch_all(self.db.pool())
        .await?;

        let mut statuses = HashMap::with_capacity(rows.len());
        for row in rows {
            let user_lo: Uuid = row.get("user_lo");
            let user_hi: Uuid = row.get("user_hi");
            let requested_by: Uuid = row.get("requested_by");
            let status: String = row.get("status");
            let status = FriendshipStatus::from_db(&status)
                .ok_or_else(|| anyhow!("unknown friendship status: {}", status))?;

            let other = if user_lo == viewer_id { user_hi } else { user_lo };
            let classified = match status {
                FriendshipStatus::Accepted => FriendStatus::Friends,
                FriendshipStatus::Pending if requested_by == viewer_id => FriendStatus::RequestSent,
                FriendshipStatus::Pending => FriendStatus::RequestReceived,
                FriendshipStatus::Rejected => continue,
            };
            statuses.insert(other, classified);
        }

        Ok(statuses)
    }

    /// Pending requests addressed to the viewer, oldest first.
    pub async fn list_incoming(&self, viewer_id: Uuid) -> Result<Vec<FriendRequest>> {
        let rows = sqlx::query(
            "SELECT f.id, f.created_at, u.id AS sender_id, u.username, u.first_name, \
                    u.last_name, u.city, u.country, u.avatar_key \
             FROM friendships f \
             JOIN users u ON u.id = f.requested_by \
             WHERE (f.user_lo = $1 OR f.user_hi = $1) \
               AND f.requested_by <> $1 \
               AND f.status = 'pending' \
             ORDER BY f.created_at ASC",
        )
        .bind(viewer_id)
        .fetch_all(self.db.pool())
        .await?;

        let mut requests = Vec::with_capacity(rows.len());
        for row in rows {
            requests.push(FriendRequest {
                id: row.get("id"),
                sender_id: row.get("sender_id"),
                sender_username: row.get("username"),
                sender_first_name: row.get("first_name"),
                sender_last_name: row.get("last_name"),
                sender_city: row.get("city"),
                sender_country: row.get("country"),
                sender_avatar_key: row.get("avatar_key"),
                sender_avatar_url: None,
                created_at: row.get("created_at"),
            });
        }

        Ok(requests)
    }
}

fn friendship_from_row(row: &sqlx::postgres::PgRow) -> Result<Friendship> {
    let status: String = row.get("status");
    let status = FriendshipStatus::from_db(&status)
        .ok_or_else(|| anyhow!("unknown friendship status: {}", status))?;
    Ok(Friendship {
        id: row.get("id"),
        user_lo: row.get("user_lo"),
        user_hi: row.get("user_hi"),
        requested_by: row.get("requested_by"),
        status,
        created_at: row.get("created_at"),
        responded_at: row.get("responded_at"),
    })
}
