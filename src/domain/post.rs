use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Pending,
    Approved,
    Rejected,
}

impl PostStatus {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub owner_username: Option<String>,
    pub content: String,
    #[serde(skip_serializing)]
    pub image_key: Option<String>,
    /// Public URL for the image (populated at response time)
    #[serde(skip_deserializing)]
    pub image_url: Option<String>,
    pub status: PostStatus,
    /// Present iff the post is currently rejected; cleared when an edit
    /// resubmits the post for review.
    pub rejection_reason: Option<String>,
    pub approved_by: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// An approved post as it appears in the friends feed, annotated with the
/// viewer's like state. Round-trips through the feed cache, so the key
/// fields stay serializable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedPost {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub owner_username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_avatar_key: Option<String>,
    #[serde(default, skip_deserializing)]
    pub owner_avatar_url: Option<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_key: Option<String>,
    #[serde(default, skip_deserializing)]
    pub image_url: Option<String>,
    pub like_count: i64,
    pub viewer_liked: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
