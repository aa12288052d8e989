use anyhow::Result;
use redis::AsyncCommands;
use sqlx::Row;
use tracing::warn;
use uuid::Uuid;

use crate::domain::post::FeedPost;
use crate::infra::{cache::RedisCache, db::Db};

const FEED_CACHE_TTL_SECONDS: u64 = 30;

#[derive(Clone)]
pub struct FeedService {
    db: Db,
    cache: RedisCache,
}

impl FeedService {
    pub fn new(db: Db, cache: RedisCache) -> Self {
        Self { db, cache }
    }

    /// Approved posts authored by the viewer's accepted friends, newest
    /// first, annotated with like counts and the viewer's own like state.
    /// Cached per viewer with a short TTL to absorb spikes; the store stays
    /// authoritative.
    pub async fn friends_feed(&self, viewer_id: Uuid, limit: i64) -> Result<Vec<FeedPost>> {
        let cache_key = format!("feed:friends:{}:{}", viewer_id, limit);

        if let Ok(mut conn) = self.cache.client().get_multiplexed_async_connection().await {
            if let Ok(Some(payload)) = conn.get::<_, Option<String>>(&cache_key).await {
                if let Ok(posts) = serde_json::from_str::<Vec<FeedPost>>(&payload) {
                    return Ok(posts);
                }
            }
        }

        let rows = sqlx::query(
            "SELECT p.id, p.owner_id, u.username AS owner_username, \
                    u.avatar_key AS owner_avatar_key, p.content, p.image_key, p.created_at, \
                    COALESCE((SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id), 0) AS like_count, \
                    EXISTS (SELECT 1 FROM likes l WHERE l.post_id = p.id AND l.user_id = $1) AS viewer_liked \
             FROM posts p \
             JOIN users u ON u.id = p.owner_id \
             WHERE p.status = 'approved' \
               AND p.owner_id IN ( \
                   SELECT CASE WHEN f.user_lo = $1 THEN f.user_hi ELSE f.user_lo END \
                   FROM friendships f \
                   WHERE (f.user_lo = $1 OR f.user_hi = $1) AND f.status = 'accepted' \
               ) \
             ORDER BY p.created_at DESC, p.id DESC \
             LIMIT $2",
        )
        .bind(viewer_id)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        let mut posts = Vec::with_capacity(rows.len());
        for row in rows {
            posts.push(FeedPost {
                id: row.get("id"),
                owner_id: row.get("owner_id"),
                owner_username: row.get("owner_username"),
                owner_avatar_key: row.get("owner_avatar_key"),
                owner_avatar_url: None,
                content: row.get("content"),
                image_key: row.get("image_key"),
                image_url: None,
                like_count: row.get("like_count"),
                viewer_liked: row.get("viewer_liked"),
                created_at: row.get("created_at"),
            });
        }

        if let Ok(mut conn) = self.cache.client().get_multiplexed_async_connection().await {
            if let Ok(payload) = serde_json::to_string(&posts) {
                if let Err(err) = conn
                    .set_ex::<_, _, ()>(&cache_key, payload, FEED_CACHE_TTL_SECONDS)
                    .await
                {
                    warn!(error = ?err, "failed to write feed cache");
                }
            }
        }

        Ok(posts)
    }
}
