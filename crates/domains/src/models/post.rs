use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{CommentId, GroupId, PostId, UserId};
use super::poll::Poll;

/// Lifetime chosen by the author when the post is created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpiryOption {
    #[default]
    #[serde(rename = "none")]
    Never,
    #[serde(rename = "10s")]
    TenSeconds,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "30d")]
    ThirtyDays,
}

impl ExpiryOption {
    /// Parses a client label. Anything unrecognised means no expiry.
    pub fn from_label(label: &str) -> Self {
        match label {
            "10s" => Self::TenSeconds,
            "1d" => Self::OneDay,
            "7d" => Self::SevenDays,
            "30d" => Self::ThirtyDays,
            _ => Self::Never,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Never => "none",
            Self::TenSeconds => "10s",
            Self::OneDay => "1d",
            Self::SevenDays => "7d",
            Self::ThirtyDays => "30d",
        }
    }

    pub fn lifetime(&self) -> Option<TimeDelta> {
        match self {
            Self::Never => None,
            Self::TenSeconds => Some(TimeDelta::seconds(10)),
            Self::OneDay => Some(TimeDelta::days(1)),
            Self::SevenDays => Some(TimeDelta::days(7)),
            Self::ThirtyDays => Some(TimeDelta::days(30)),
        }
    }

    pub fn expires_at(&self, created_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.lifetime().map(|d| created_at + d)
    }
}

/// A feed or group entry, optionally carrying a poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    pub author_id: UserId,
    pub author_display_name: Option<String>,
    #[serde(rename = "authorPhotoURL")]
    pub author_photo_url: Option<String>,
    pub content: String,
    pub media_urls: Vec<String>,
    pub tags: Vec<String>,
    /// `None` for the public feed.
    pub group: Option<GroupId>,
    /// Serialized inline as `polls` and `expiresAt`.
    #[serde(flatten)]
    pub poll: Poll,
    pub expiry_option: ExpiryOption,
    pub comment_refs: Vec<CommentId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.poll.expires_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        !self.poll.is_open(now)
    }
}
