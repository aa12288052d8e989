use anyhow::Result;
use uuid::Uuid;

use crate::app::auth::user_from_row;
use crate::domain::user::User;
use crate::infra::db::Db;

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, address, city, country, \
                            phone_number, role::text AS role, is_blocked, rejected_posts_count, \
                            avatar_key, created_at";

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Clone)]
pub struct UserService {
    db: Db,
}

impl UserService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?;

        match row {
            Some(row) => Ok(Some(user_from_row(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn username_taken(&self, username: &str) -> Result<bool> {
        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE username = $1)")
                .bind(username)
                .fetch_one(self.db.pool())
                .await?;
        Ok(taken)
    }

    /// Everyone except the viewer, for the people-browser view.
    pub async fn list_others(&self, viewer_id: Uuid) -> Result<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM users WHERE id <> $1 ORDER BY username",
            USER_COLUMNS
        ))
        .bind(viewer_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(user_from_row).collect()
    }

    pub async fn search(&self, query: &str) -> Result<Vec<User>> {
        let pattern = format!("%{}%", query);
        let rows = sqlx::query(&format!(
            "SELECT {} FROM users \
             WHERE username ILIKE $1 \
                OR email ILIKE $1 \
                OR first_name ILIKE $1 \
                OR last_name ILIKE $1 \
                OR address ILIKE $1 \
                OR city ILIKE $1 \
             ORDER BY username",
            USER_COLUMNS
        ))
        .bind(pattern)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(user_from_row).collect()
    }

    /// Username is immutable; everything else updates field-wise.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "UPDATE users SET \
                first_name = COALESCE($2, first_name), \
                last_name = COALESCE($3, last_name), \
                address = COALESCE($4, address), \
                city = COALESCE($5, city), \
                country = COALESCE($6, country), \
                phone_number = COALESCE($7, phone_number) \
             WHERE id = $1 \
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(update.first_name)
        .bind(update.last_name)
        .bind(update.address)
        .bind(update.city)
        .bind(update.country)
        .bind(update.phone_number)
        .fetch_optional(self.db.pool())
        .await?;

        match row {
            Some(row) => Ok(Some(user_from_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Swaps the avatar key and returns the updated user together with the
    /// replaced key so the caller can release the old blob.
    pub async fn set_avatar(
        &self,
        user_id: Uuid,
        avatar_key: String,
    ) -> Result<Option<(User, Option<String>)>> {
        let mut tx = self.db.pool().begin().await?;

        let old_key: Option<Option<String>> =
            sqlx::query_scalar("SELECT avatar_key FROM users WHERE id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;

        let old_key = match old_key {
            Some(old_key) => old_key,
            None => {
                tx.rollback().await?;
                return Ok(None);
            }
        };

        let row = sqlx::query(&format!(
            "UPDATE users SET avatar_key = $2 WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(avatar_key)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some((user_from_row(&row)?, old_key)))
    }

    pub async fn list_blocked(&self) -> Result<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM users WHERE is_blocked ORDER BY username",
            USER_COLUMNS
        ))
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(user_from_row).collect()
    }

    /// Lifts a moderation block. The rejection counter is left as is, so the
    /// next rejection re-blocks immediately.
    pub async fn unblock(&self, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET is_blocked = FALSE WHERE id = $1 AND is_blocked")
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
