//! Domain models and value objects

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::media;

/// A social platform the engine can publish to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// A Facebook page, via the Graph API
    Facebook,
    /// A Telegram channel or chat, via the Bot API
    Telegram,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::Facebook, Platform::Telegram];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Telegram => "telegram",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown platform '{0}' (expected facebook or telegram)")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "facebook" | "fb" => Ok(Platform::Facebook),
            "telegram" | "tg" => Ok(Platform::Telegram),
            other => Err(UnknownPlatform(other.to_string())),
        }
    }
}

/// Media category derived from a location string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Unknown,
}

/// A media location paired with its classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    /// URL (or opaque location) as submitted
    pub location: String,
    /// Kind derived from `location`
    pub kind: MediaKind,
}

impl MediaRef {
    /// Classify a location and wrap it
    pub fn new(location: impl Into<String>) -> Self {
        let location = location.into();
        let kind = media::classify(&location);
        Self { location, kind }
    }

    pub fn is_image(&self) -> bool {
        self.kind == MediaKind::Image
    }

    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }
}

/// One logical post aimed at one platform
#[derive(Debug, Clone)]
pub struct PostRequest {
    /// Text body; may be empty only when media is present
    pub message: String,
    /// Media locations in submission order
    pub media: Vec<String>,
    /// Target platform
    pub platform: Platform,
}

impl PostRequest {
    pub fn new(platform: Platform, message: impl Into<String>, media: Vec<String>) -> Self {
        Self {
            message: message.into(),
            media,
            platform,
        }
    }

    /// Whether the request carries nothing to publish
    pub fn is_empty(&self) -> bool {
        self.message.trim().is_empty() && self.media.is_empty()
    }
}

/// Credential resolved for one (user, platform) pair
#[derive(Debug, Clone)]
pub struct AccountCredential {
    /// Page access token (Facebook); unused for Telegram, where the bot token is adapter config
    pub access_token: SecretString,
    /// Page id (Facebook) or chat id (Telegram)
    pub platform_account_id: String,
}

impl AccountCredential {
    pub fn new(access_token: SecretString, platform_account_id: impl Into<String>) -> Self {
        Self {
            access_token,
            platform_account_id: platform_account_id.into(),
        }
    }
}

/// A connected social account as stored by the account directory
#[derive(Debug, Clone)]
pub struct SocialAccount {
    pub user_id: Uuid,
    pub platform: Platform,
    pub platform_account_id: String,
    pub access_token: SecretString,
    /// Display name reported by the platform, if known
    pub display_name: Option<String>,
    pub connected_at: OffsetDateTime,
}

impl SocialAccount {
    pub fn credential(&self) -> AccountCredential {
        AccountCredential {
            access_token: self.access_token.clone(),
            platform_account_id: self.platform_account_id.clone(),
        }
    }
}

/// Result of one remote call for one media item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUploadOutcome {
    pub media_ref: MediaRef,
    /// Identifier the platform assigned to the item, when the call succeeded
    pub remote_media_id: Option<String>,
    /// Error text, when the call failed
    pub error: Option<String>,
}

impl RemoteUploadOutcome {
    pub fn succeeded(media_ref: MediaRef, remote_media_id: impl Into<String>) -> Self {
        Self {
            media_ref,
            remote_media_id: Some(remote_media_id.into()),
            error: None,
        }
    }

    pub fn failed(media_ref: MediaRef, error: impl Into<String>) -> Self {
        Self {
            media_ref,
            remote_media_id: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.remote_media_id.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    /// Every call of the plan succeeded
    Published,
    /// The post exists remotely but at least one independent item failed
    Failed,
}

impl PublishStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishStatus::Published => "published",
            PublishStatus::Failed => "failed",
        }
    }
}

impl FromStr for PublishStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "published" => Ok(PublishStatus::Published),
            "failed" => Ok(PublishStatus::Failed),
            other => Err(format!("unknown publish status: {}", other)),
        }
    }
}

/// Canonical outcome of one publish.
///
/// Only built once the platform returned a post identifier, so a result always
/// refers to a post that exists remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResult {
    pub platform: Platform,
    /// Identifier of the post created on the platform
    pub platform_post_id: String,
    pub message: String,
    /// Media actually attached, in input order
    pub attached_media: Vec<MediaRef>,
    pub status: PublishStatus,
    /// Per-item outcomes, in input order
    pub outcomes: Vec<RemoteUploadOutcome>,
}

impl PublishResult {
    /// Items whose remote call failed
    pub fn failed_items(&self) -> impl Iterator<Item = &RemoteUploadOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

/// Durable record of a published post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    pub platform: Platform,
    pub platform_post_id: String,
    pub message: String,
    pub media_urls: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub posted_at: OffsetDateTime,
    pub status: PublishStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Post {
    /// Build the record for a result owned by `user_id`
    pub fn from_result(result: &PublishResult, user_id: Uuid, now: OffsetDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            platform: result.platform,
            platform_post_id: result.platform_post_id.clone(),
            message: result.message.clone(),
            media_urls: result
                .attached_media
                .iter()
                .map(|m| m.location.clone())
                .collect(),
            posted_at: now,
            status: result.status,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_parses_aliases() {
        assert_eq!("facebook".parse::<Platform>().unwrap(), Platform::Facebook);
        assert_eq!(" TG ".parse::<Platform>().unwrap(), Platform::Telegram);
        assert!("myspace".parse::<Platform>().is_err());
    }

    #[test]
    fn test_request_empty_ignores_whitespace() {
        let request = PostRequest::new(Platform::Telegram, "   ", vec![]);
        assert!(request.is_empty());

        let request = PostRequest::new(Platform::Telegram, "", vec!["a.png".to_string()]);
        assert!(!request.is_empty());
    }

    #[test]
    fn test_post_from_result_keeps_media_order() {
        let result = PublishResult {
            platform: Platform::Facebook,
            platform_post_id: "123_456".to_string(),
            message: "hello".to_string(),
            attached_media: vec![MediaRef::new("b.png"), MediaRef::new("a.png")],
            status: PublishStatus::Published,
            outcomes: vec![],
        };
        let user_id = Uuid::new_v4();

        let post = Post::from_result(&result, user_id, OffsetDateTime::now_utc());

        assert_eq!(post.user_id, user_id);
        assert_eq!(post.media_urls, vec!["b.png", "a.png"]);
        assert_eq!(post.platform_post_id, "123_456");
    }
}
