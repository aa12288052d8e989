use anyhow::Result;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::engagement::Comment;
use crate::infra::db::Db;

#[derive(Debug, Clone, serde::Serialize)]
pub struct LikeToggle {
    pub liked: bool,
    pub like_count: i64,
}

#[derive(Clone)]
pub struct EngagementService {
    db: Db,
}

impl EngagementService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Idempotent like toggle. The unique (user_id, post_id) constraint is
    /// the arbiter: a racing double-toggle resolves to at most one row, never
    /// two. Returns None when the post does not exist.
    pub async fn toggle_like(&self, user_id: Uuid, post_id: Uuid) -> Result<Option<LikeToggle>> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM posts WHERE id = $1)")
            .bind(post_id)
            .fetch_one(self.db.pool())
            .await?;
        if !exists {
            return Ok(None);
        }

        let inserted = sqlx::query(
            "INSERT INTO likes (user_id, post_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(post_id)
        .execute(self.db.pool())
        .await?;

        let liked = if inserted.rows_affected() > 0 {
            true
        } else {
            sqlx::query("DELETE FROM likes WHERE user_id = $1 AND post_id = $2")
                .bind(user_id)
                .bind(post_id)
                .execute(self.db.pool())
                .await?;
            false
        };

        let like_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(self.db.pool())
            .await?;

        Ok(Some(LikeToggle { liked, like_count }))
    }

    pub async fn comment_post(
        &self,
        user_id: Uuid,
        post_id: Uuid,
        body: String,
    ) -> Result<Option<Comment>> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM posts WHERE id = $1)")
            .bind(post_id)
            .fetch_one(self.db.pool())
            .await?;
        if !exists {
            return Ok(None);
        }

        let row = sqlx::query(
            "WITH inserted_comment AS ( \
                INSERT INTO comments (user_id, post_id, body) VALUES ($1, $2, $3) \
                RETURNING id, user_id, post_id, body, created_at \
             ) \
             SELECT c.*, u.username AS author_username \
             FROM inserted_comment c \
             JOIN users u ON u.id = c.user_id",
        )
        .bind(user_id)
        .bind(post_id)
        .bind(body)
        .fetch_one(self.db.pool())
        .await?;

        Ok(Some(comment_from_row(&row)))
    }

    /// Comments for display, newest first.
    pub async fn list_comments(&self, post_id: Uuid) -> Result<Vec<Comment>> {
        let rows = sqlx::query(
            "SELECT c.id, c.user_id, c.post_id, c.body, c.created_at, \
                    u.username AS author_username \
             FROM comments c \
             JOIN users u ON u.id = c.user_id \
             WHERE c.post_id = $1 \
             ORDER BY c.created_at DESC, c.id DESC",
        )
        .bind(post_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(comment_from_row).collect())
    }
}

fn comment_from_row(row: &sqlx::postgres::PgRow) -> Comment {
    Comment {
        id: row.get("id"),
        user_id: row.get("user_id"),
        author_username: row.try_get("author_username").ok(),
        post_id: row.get("post_id"),
        body: row.get("body"),
        created_at: row.get("created_at"),
    }
}
