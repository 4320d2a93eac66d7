//! Port definitions (traits) for external dependencies
//!
//! These traits define the boundaries between the domain and external systems.
//! Adapters implement these traits to connect to real infrastructure.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::capability::PublishPlan;
use crate::model::{
    AccountCredential, MediaRef, Platform, Post, PublishResult, RemoteUploadOutcome,
    SocialAccount,
};

/// Error type for a publish
#[derive(Debug, Clone, Error)]
pub enum PublishError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Unsupported: {0}")]
    Unsupported(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Remote error{}: {body}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    Remote { status: Option<u16>, body: String },
    /// The platform accepted the post but the local record could not be written
    #[error("Published as {} but saving the post failed: {reason}", .result.platform_post_id)]
    PersistFailed {
        result: Box<PublishResult>,
        reason: String,
    },
    /// Some independent calls succeeded and others failed
    #[error("Partially published as {}: {} call(s) failed", .result.platform_post_id, .failures.len())]
    PartialFailure {
        result: Box<PublishResult>,
        failures: Vec<String>,
    },
    #[error("No adapter configured for {0}")]
    NotConfigured(Platform),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishErrorKind {
    InvalidRequest,
    Unsupported,
    Transport,
    Remote,
    PersistFailed,
    PartialFailure,
    NotConfigured,
}

impl PublishErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishErrorKind::InvalidRequest => "invalid_request",
            PublishErrorKind::Unsupported => "unsupported",
            PublishErrorKind::Transport => "transport",
            PublishErrorKind::Remote => "remote",
            PublishErrorKind::PersistFailed => "persist_failed",
            PublishErrorKind::PartialFailure => "partial_failure",
            PublishErrorKind::NotConfigured => "not_configured",
        }
    }
}

impl std::fmt::Display for PublishErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl PublishError {
    pub fn kind(&self) -> PublishErrorKind {
        match self {
            PublishError::InvalidRequest(_) => PublishErrorKind::InvalidRequest,
            PublishError::Unsupported(_) => PublishErrorKind::Unsupported,
            PublishError::Transport(_) => PublishErrorKind::Transport,
            PublishError::Remote { .. } => PublishErrorKind::Remote,
            PublishError::PersistFailed { .. } => PublishErrorKind::PersistFailed,
            PublishError::PartialFailure { .. } => PublishErrorKind::PartialFailure,
            PublishError::NotConfigured(_) => PublishErrorKind::NotConfigured,
        }
    }

    /// Result carried by errors raised after a remote post was created
    pub fn result(&self) -> Option<&PublishResult> {
        match self {
            PublishError::PersistFailed { result, .. }
            | PublishError::PartialFailure { result, .. } => Some(result.as_ref()),
            _ => None,
        }
    }

    /// Whether the error was raised before any remote call
    pub fn is_side_effect_free(&self) -> bool {
        matches!(
            self,
            PublishError::InvalidRequest(_)
                | PublishError::Unsupported(_)
                | PublishError::NotConfigured(_)
        )
    }
}

/// What an adapter reports after running a plan
#[derive(Debug, Clone, Default)]
pub struct AdapterReport {
    /// Identifier of the first post the platform created, if any call succeeded
    pub platform_post_id: Option<String>,
    /// Media attached by successful calls, in input order
    pub attached_media: Vec<MediaRef>,
    /// Per-item outcomes, in input order
    pub outcomes: Vec<RemoteUploadOutcome>,
    /// Errors from calls that failed, in execution order
    pub failures: Vec<PublishError>,
}

/// Port for executing a plan against one platform
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Platform this adapter talks to
    fn platform(&self) -> Platform;

    /// Run every call in `plan`.
    ///
    /// Returns `Err` when a failure aborts the sequence before anything was
    /// published. Independent call failures are listed in the report instead.
    async fn execute(
        &self,
        plan: &PublishPlan,
        message: &str,
        credential: &AccountCredential,
    ) -> Result<AdapterReport, PublishError>;
}

/// Error type for persisting results
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Port for storing published results as durable posts
#[async_trait]
pub trait ResultPersister: Send + Sync {
    /// Store `result` for `user_id`, returning the created record
    async fn save(&self, result: &PublishResult, user_id: Uuid) -> Result<Post, PersistError>;
}

/// Error type for account lookup
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("{platform} account not connected for user {user_id}")]
    NotConnected { user_id: Uuid, platform: Platform },
    #[error("Database error: {0}")]
    Database(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Port for connected social accounts
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Resolve the credential for one (user, platform) pair
    async fn credential(
        &self,
        user_id: Uuid,
        platform: Platform,
    ) -> Result<AccountCredential, AccountError>;

    /// Insert or replace the account for its (user, platform) pair
    async fn connect(&self, account: &SocialAccount) -> Result<(), AccountError>;

    /// All accounts of a user
    async fn list_accounts(&self, user_id: Uuid) -> Result<Vec<SocialAccount>, AccountError>;
}

/// Port for reading stored posts
#[async_trait]
pub trait PostHistory: Send + Sync {
    async fn list_posts(
        &self,
        user_id: Uuid,
        platform: Option<Platform>,
    ) -> Result<Vec<Post>, PersistError>;

    async fn get_post(&self, id: Uuid) -> Result<Option<Post>, PersistError>;
}

/// Metric name to its latest value
pub type PostInsights = BTreeMap<String, serde_json::Value>;

/// Port for fetching engagement metrics of a published post
#[async_trait]
pub trait InsightsSource: Send + Sync {
    async fn post_insights(
        &self,
        platform_post_id: &str,
        credential: &AccountCredential,
    ) -> Result<PostInsights, PublishError>;
}

/// Port for time/clock operations (enables deterministic testing)
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> OffsetDateTime;
}

/// Real clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
