use anyhow::{anyhow, Result};
use sqlx::Row;
use uuid::Uuid;

use crate::app::notifier::Notifier;
use crate::domain::post::{Post, PostStatus};
use crate::infra::db::Db;
use crate::infra::events::{EventBus, EVENT_NEW_PENDING_POST};

/// A user whose rejected-post count reaches this value is blocked.
/// The comparison is `>=`: the block lands on the third rejection.
pub const REJECTION_BLOCK_THRESHOLD: i32 = 3;

fn crosses_block_threshold(rejected_count: i32) -> bool {
    rejected_count >= REJECTION_BLOCK_THRESHOLD
}

#[derive(Debug)]
pub struct UpdatedPost {
    pub post: Post,
    /// Image key displaced by the edit, for the caller to release.
    pub replaced_image_key: Option<String>,
}

#[derive(Debug)]
pub struct DeletedPost {
    pub image_key: Option<String>,
}

/// Outcome of an admin approve call.
pub enum Approval {
    Approved { post: Post },
    NotPending,
    NotFound,
}

/// Outcome of an admin reject call.
pub enum Rejection {
    Rejected {
        post: Post,
        rejected_count: i32,
        owner_blocked: bool,
    },
    NotPending,
    NotFound,
}

#[derive(Clone)]
pub struct PostService {
    db: Db,
    notifier: Notifier,
    events: EventBus,
}

impl PostService {
    pub fn new(db: Db, notifier: Notifier, events: EventBus) -> Self {
        Self {
            db,
            notifier,
            events,
        }
    }

    /// Submits a post into the review queue. Every new post starts pending.
    pub async fn create_post(
        &self,
        owner_id: Uuid,
        content: String,
        image_key: Option<String>,
    ) -> Result<Post> {
        let row = sqlx::query(
            "WITH inserted_post AS ( \
                INSERT INTO posts (owner_id, content, image_key) \
                VALUES ($1, $2, $3) \
                RETURNING id, owner_id, content, image_key, status::text AS status, \
                          rejection_reason, approved_by, created_at, updated_at \
             ) \
             SELECT p.*, u.username AS owner_username \
             FROM inserted_post p \
             JOIN users u ON u.id = p.owner_id",
        )
        .bind(owner_id)
        .bind(content)
        .bind(image_key)
        .fetch_one(self.db.pool())
        .await?;

        let post = post_from_row(&row)?;
        self.events.publish(EVENT_NEW_PENDING_POST, &post);
        Ok(post)
    }

    pub async fn list_mine(&self, owner_id: Uuid) -> Result<Vec<Post>> {
        let rows = sqlx::query(
            "SELECT p.id, p.owner_id, p.content, p.image_key, p.status::text AS status, \
                    p.rejection_reason, p.approved_by, p.created_at, p.updated_at, \
                    u.username AS owner_username \
             FROM posts p \
             JOIN users u ON u.id = p.owner_id \
             WHERE p.owner_id = $1 \
             ORDER BY p.created_at DESC, p.id DESC",
        )
        .bind(owner_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(post_from_row).collect()
    }

    /// The review queue, oldest first.
    pub async fn list_pending(&self) -> Result<Vec<Post>> {
        let rows = sqlx::query(
            "SELECT p.id, p.owner_id, p.content, p.image_key, p.status::text AS status, \
                    p.rejection_reason, p.approved_by, p.created_at, p.updated_at, \
                    u.username AS owner_username \
             FROM posts p \
             JOIN users u ON u.id = p.owner_id \
             WHERE p.status = 'pending' \
             ORDER BY p.created_at ASC, p.id ASC",
        )
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(post_from_row).collect()
    }

    /// Applies an edit. Any accepted edit sends the post back to review:
    /// status returns to pending and the previous verdict (rejection reason,
    /// approving admin) is wiped.
    pub async fn update_post(
        &self,
        owner_id: Uuid,
        post_id: Uuid,
        content: Option<String>,
        new_image_key: Option<String>,
        remove_image: bool,
    ) -> Result<Option<UpdatedPost>> {
        let mut tx = self.db.pool().begin().await?;

        let current: Option<Option<String>> = sqlx::query_scalar(
            "SELECT image_key FROM posts WHERE id = $1 AND owner_id = $2 FOR UPDATE",
        )
        .bind(post_id)
        .bind(owner_id)
        .fetch_optional(&mut *tx)
        .await?;

        let current_image_key = match current {
            Some(key) => key,
            None => {
                tx.rollback().await?;
                return Ok(None);
            }
        };

        let (next_image_key, replaced_image_key) = if let Some(new_key) = new_image_key {
            (Some(new_key), current_image_key)
        } else if remove_image {
            (None, current_image_key)
        } else {
            (current_image_key, None)
        };

        let row = sqlx::query(
            "WITH updated_post AS ( \
                UPDATE posts \
                SET content = COALESCE($3, content), \
                    image_key = $4, \
                    status = 'pending', \
                    rejection_reason = NULL, \
                    approved_by = NULL, \
                    updated_at = now() \
                WHERE id = $1 AND owner_id = $2 \
                RETURNING id, owner_id, content, image_key, status::text AS status, \
                          rejection_reason, approved_by, created_at, updated_at \
             ) \
             SELECT p.*, u.username AS owner_username \
             FROM updated_post p \
             JOIN users u ON u.id = p.owner_id",
        )
        .bind(post_id)
        .bind(owner_id)
        .bind(content)
        .bind(next_image_key)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(UpdatedPost {
            post: post_from_row(&row)?,
            replaced_image_key,
        }))
    }

    pub async fn delete_post(&self, owner_id: Uuid, post_id: Uuid) -> Result<Option<DeletedPost>> {
        let row = sqlx::query(
            "DELETE FROM posts WHERE id = $1 AND owner_id = $2 RETURNING image_key",
        )
        .bind(post_id)
        .bind(owner_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| DeletedPost {
            image_key: row.get("image_key"),
        }))
    }

    /// Admin approval. Only a pending post can be approved; the owner is
    /// notified after the transition commits.
    pub async fn approve(&self, admin_id: Uuid, post_id: Uuid) -> Result<Approval> {
        let row = sqlx::query(
            "WITH updated_post AS ( \
                UPDATE posts \
                SET status = 'approved', approved_by = $1, updated_at = now() \
                WHERE id = $2 AND status = 'pending' \
                RETURNING id, owner_id, content, image_key, status::text AS status, \
                          rejection_reason, approved_by, created_at, updated_at \
             ) \
             SELECT p.*, u.username AS owner_username, u.email AS owner_email \
             FROM updated_post p \
             JOIN users u ON u.id = p.owner_id",
        )
        .bind(admin_id)
        .bind(post_id)
        .fetch_optional(self.db.pool())
        .await?;

        let row = match row {
            Some(row) => row,
            None => return self.missing_moderation_target(post_id).await,
        };

        let owner_email: String = row.get("owner_email");
        let post = post_from_row(&row)?;

        self.notifier.notify(
            owner_email,
            "Your post was approved".to_string(),
            format!("Your post {} was approved by an administrator.", post.id),
        );

        Ok(Approval::Approved { post })
    }

    /// Admin rejection. One transaction covers the status flip, the reason,
    /// the owner's rejection counter and the block flag, so a crash cannot
    /// leave them disagreeing. Notifications go out only after commit.
    pub async fn reject(&self, post_id: Uuid, reason: String) -> Result<Rejection> {
        let mut tx = self.db.pool().begin().await?;

        let row = sqlx::query(
            "UPDATE posts \
             SET status = 'rejected', rejection_reason = $2, updated_at = now() \
             WHERE id = $1 AND status = 'pending' \
             RETURNING id, owner_id, content, image_key, status::text AS status, \
                       rejection_reason, approved_by, created_at, updated_at",
        )
        .bind(post_id)
        .bind(&reason)
        .fetch_optional(&mut *tx)
        .await?;

        let row = match row {
            Some(row) => row,
            None => {
                tx.rollback().await?;
                return match self.missing_moderation_target(post_id).await? {
                    Approval::NotFound => Ok(Rejection::NotFound),
                    _ => Ok(Rejection::NotPending),
                };
            }
        };

        let owner_id: Uuid = row.get("owner_id");

        let owner_row = sqlx::query(
            "SELECT username, email, is_blocked FROM users WHERE id = $1 FOR UPDATE",
        )
        .bind(owner_id)
        .fetch_one(&mut *tx)
        .await?;
        let owner_username: String = owner_row.get("username");
        let owner_email: String = owner_row.get("email");
        let was_blocked: bool = owner_row.get("is_blocked");

        let rejected_count: i32 = sqlx::query_scalar(
            "UPDATE users SET rejected_posts_count = rejected_posts_count + 1 \
             WHERE id = $1 \
             RETURNING rejected_posts_count",
        )
        .bind(owner_id)
        .fetch_one(&mut *tx)
        .await?;

        let newly_blocked = !was_blocked && crosses_block_threshold(rejected_count);
        if newly_blocked {
            sqlx::query("UPDATE users SET is_blocked = TRUE WHERE id = $1")
                .bind(owner_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        let mut post = post_from_row(&row)?;
        post.owner_username = Some(owner_username);

        self.notifier.notify(
            owner_email.clone(),
            "Your post was rejected".to_string(),
            format!(
                "Your post {} was rejected by an administrator. Reason: {}",
                post.id, reason
            ),
        );
        if newly_blocked {
            self.notifier.notify(
                owner_email,
                "Your account has been blocked".to_string(),
                format!(
                    "Your account was blocked after {} rejected posts. \
                     An administrator can lift the block.",
                    rejected_count
                ),
            );
        }

        Ok(Rejection::Rejected {
            post,
            rejected_count,
            owner_blocked: newly_blocked || was_blocked,
        })
    }

    async fn missing_moderation_target(&self, post_id: Uuid) -> Result<Approval> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM posts WHERE id = $1)")
            .bind(post_id)
            .fetch_one(self.db.pool())
            .await?;
        if exists {
            Ok(Approval::NotPending)
        } else {
            Ok(Approval::NotFound)
        }
    }
}

fn post_from_row(row: &sqlx::postgres::PgRow) -> Result<Post> {
    let status: String = row.get("status");
    let status =
        PostStatus::from_db(&status).ok_or_else(|| anyhow!("unknown post status: {}", status))?;
    let owner_username: Option<String> = row.try_get("owner_username").ok();
    Ok(Post {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        owner_username,
        content: row.get("content"),
        image_key: row.get("image_key"),
        image_url: None,
        status,
        rejection_reason: row.get("rejection_reason"),
        approved_by: row.get("approved_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_threshold_spares_the_second_rejection() {
        assert!(!crosses_block_threshold(REJECTION_BLOCK_THRESHOLD - 1));
    }

    #[test]
    fn block_threshold_fires_on_the_third_rejection() {
        assert!(crosses_block_threshold(REJECTION_BLOCK_THRESHOLD));
        assert!(crosses_block_threshold(REJECTION_BLOCK_THRESHOLD + 1));
    }
}
