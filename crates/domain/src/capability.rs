//! Per-platform capability table and publish plan selection
//!
//! Shape resolution is a pure function of the platform and the multiset of
//! classified media. The table says which shapes a platform accepts; the
//! accepted shape is then expanded into the platform's concrete call plan.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::model::{MediaKind, MediaRef, Platform};

/// Composition of one post, derived from its media
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishShape {
    /// No media
    TextOnly,
    /// Exactly one video, no images
    SingleVideo,
    /// More than one video, no images
    MultiVideo,
    /// One or more images, no videos
    MultiImage,
    /// Images and videos together
    Mixed,
}

impl PublishShape {
    /// Derive the shape from classified media. Unknown items are not counted.
    pub fn of(media: &[MediaRef]) -> Self {
        let images = media.iter().filter(|m| m.is_image()).count();
        let videos = media.iter().filter(|m| m.is_video()).count();

        match (images, videos) {
            (0, 0) => PublishShape::TextOnly,
            (0, 1) => PublishShape::SingleVideo,
            (0, _) => PublishShape::MultiVideo,
            (_, 0) => PublishShape::MultiImage,
            _ => PublishShape::Mixed,
        }
    }
}

impl fmt::Display for PublishShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PublishShape::TextOnly => "text_only",
            PublishShape::SingleVideo => "single_video",
            PublishShape::MultiVideo => "multi_video",
            PublishShape::MultiImage => "multi_image",
            PublishShape::Mixed => "mixed",
        };
        f.pad(name)
    }
}

/// Whether a platform accepts a shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Support {
    Supported,
    Rejected(&'static str),
}

/// One row of the capability table
#[derive(Debug, Clone)]
pub struct PlatformCapabilities {
    pub text_only: Support,
    pub single_video: Support,
    pub multi_video: Support,
    pub multi_image: Support,
    pub mixed: Support,
}

impl PlatformCapabilities {
    pub fn facebook() -> Self {
        Self {
            text_only: Support::Supported,
            single_video: Support::Supported,
            multi_video: Support::Rejected("only one video at a time"),
            multi_image: Support::Supported,
            mixed: Support::Rejected("mixed media unsupported"),
        }
    }

    pub fn telegram() -> Self {
        Self {
            text_only: Support::Supported,
            single_video: Support::Supported,
            multi_video: Support::Supported,
            multi_image: Support::Supported,
            mixed: Support::Supported,
        }
    }

    pub fn support_for(&self, shape: PublishShape) -> Support {
        match shape {
            PublishShape::TextOnly => self.text_only,
            PublishShape::SingleVideo => self.single_video,
            PublishShape::MultiVideo => self.multi_video,
            PublishShape::MultiImage => self.multi_image,
            PublishShape::Mixed => self.mixed,
        }
    }
}

/// Why a request cannot be published on a platform
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{platform} cannot publish this post: {reason}")]
pub struct ShapeRejection {
    pub platform: Platform,
    pub shape: Option<PublishShape>,
    pub reason: String,
}

/// Facebook call sequence for an accepted shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FacebookPlan {
    /// One feed post carrying the message
    Feed,
    /// One video post; the message becomes the description
    Video(MediaRef),
    /// Phase 1 uploads each photo unpublished, phase 2 attaches them to one feed post
    StagedPhotos(Vec<MediaRef>),
}

/// One outbound Telegram call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelegramCall {
    SendText,
    SendPhoto { photo: MediaRef, caption: bool },
    /// Caption, when set, goes on the first element only
    SendMediaGroup { photos: Vec<MediaRef>, caption: bool },
    SendVideo { video: MediaRef, caption: bool },
}

impl TelegramCall {
    pub fn method(&self) -> &'static str {
        match self {
            TelegramCall::SendText => "sendMessage",
            TelegramCall::SendPhoto { .. } => "sendPhoto",
            TelegramCall::SendMediaGroup { .. } => "sendMediaGroup",
            TelegramCall::SendVideo { .. } => "sendVideo",
        }
    }
}

/// Telegram call sequence; calls are independent of each other
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramPlan {
    pub calls: Vec<TelegramCall>,
}

/// Platform-tagged plan chosen for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishPlan {
    Facebook {
        shape: PublishShape,
        plan: FacebookPlan,
    },
    Telegram {
        shape: PublishShape,
        plan: TelegramPlan,
    },
}

impl PublishPlan {
    pub fn platform(&self) -> Platform {
        match self {
            PublishPlan::Facebook { .. } => Platform::Facebook,
            PublishPlan::Telegram { .. } => Platform::Telegram,
        }
    }

    pub fn shape(&self) -> PublishShape {
        match self {
            PublishPlan::Facebook { shape, .. } | PublishPlan::Telegram { shape, .. } => *shape,
        }
    }

    /// Number of outbound calls the plan issues when every call succeeds
    pub fn call_count(&self) -> usize {
        match self {
            PublishPlan::Facebook { plan, .. } => match plan {
                FacebookPlan::Feed | FacebookPlan::Video(_) => 1,
                FacebookPlan::StagedPhotos(photos) => photos.len() + 1,
            },
            PublishPlan::Telegram { plan, .. } => plan.calls.len(),
        }
    }

    /// Human-readable call list, used for dry runs
    pub fn describe(&self) -> Vec<String> {
        match self {
            PublishPlan::Facebook { plan, .. } => match plan {
                FacebookPlan::Feed => vec!["feed".to_string()],
                FacebookPlan::Video(video) => vec![format!("videos file_url={}", video.location)],
                FacebookPlan::StagedPhotos(photos) => photos
                    .iter()
                    .map(|p| format!("photos published=false url={}", p.location))
                    .chain(std::iter::once(format!(
                        "feed attached_media={}",
                        photos.len()
                    )))
                    .collect(),
            },
            PublishPlan::Telegram { plan, .. } => plan
                .calls
                .iter()
                .map(|call| match call {
                    TelegramCall::SendText => call.method().to_string(),
                    TelegramCall::SendPhoto { photo, .. } => {
                        format!("{} {}", call.method(), photo.location)
                    }
                    TelegramCall::SendMediaGroup { photos, .. } => {
                        format!("{} ({} photos)", call.method(), photos.len())
                    }
                    TelegramCall::SendVideo { video, .. } => {
                        format!("{} {}", call.method(), video.location)
                    }
                })
                .collect(),
        }
    }
}

/// Capability rows for every known platform
#[derive(Debug, Clone)]
pub struct CapabilityTable {
    rows: HashMap<Platform, PlatformCapabilities>,
}

impl Default for CapabilityTable {
    fn default() -> Self {
        let mut rows = HashMap::new();
        rows.insert(Platform::Facebook, PlatformCapabilities::facebook());
        rows.insert(Platform::Telegram, PlatformCapabilities::telegram());
        Self { rows }
    }
}

impl CapabilityTable {
    /// Replace the row for one platform
    pub fn with_row(mut self, platform: Platform, capabilities: PlatformCapabilities) -> Self {
        self.rows.insert(platform, capabilities);
        self
    }

    pub fn capabilities(&self, platform: Platform) -> Option<&PlatformCapabilities> {
        self.rows.get(&platform)
    }

    /// Pick the plan for `media` on `platform`, or report why it cannot be published
    pub fn resolve_shape(
        &self,
        platform: Platform,
        media: &[MediaRef],
    ) -> Result<PublishPlan, ShapeRejection> {
        if let Some(unknown) = media.iter().find(|m| m.kind == MediaKind::Unknown) {
            return Err(ShapeRejection {
                platform,
                shape: None,
                reason: format!("unrecognized media type: {}", unknown.location),
            });
        }

        let shape = PublishShape::of(media);

        let Some(row) = self.capabilities(platform) else {
            return Err(ShapeRejection {
                platform,
                shape: Some(shape),
                reason: "platform has no capability entry".to_string(),
            });
        };

        if let Support::Rejected(reason) = row.support_for(shape) {
            return Err(ShapeRejection {
                platform,
                shape: Some(shape),
                reason: reason.to_string(),
            });
        }

        let plan = match platform {
            Platform::Facebook => PublishPlan::Facebook {
                shape,
                plan: facebook_plan(shape, media),
            },
            Platform::Telegram => PublishPlan::Telegram {
                shape,
                plan: telegram_plan(media),
            },
        };

        Ok(plan)
    }
}

fn facebook_plan(shape: PublishShape, media: &[MediaRef]) -> FacebookPlan {
    match (shape, media.first()) {
        (PublishShape::SingleVideo, Some(video)) => FacebookPlan::Video(video.clone()),
        (PublishShape::MultiImage, _) => FacebookPlan::StagedPhotos(media.to_vec()),
        _ => FacebookPlan::Feed,
    }
}

fn telegram_plan(media: &[MediaRef]) -> TelegramPlan {
    if media.is_empty() {
        return TelegramPlan {
            calls: vec![TelegramCall::SendText],
        };
    }

    let images: Vec<MediaRef> = media.iter().filter(|m| m.is_image()).cloned().collect();
    let videos = media.iter().filter(|m| m.is_video());

    let mut calls = Vec::new();
    match images.len() {
        0 => {}
        1 => calls.push(TelegramCall::SendPhoto {
            photo: images[0].clone(),
            caption: true,
        }),
        _ => calls.push(TelegramCall::SendMediaGroup {
            photos: images,
            caption: true,
        }),
    }

    for video in videos {
        calls.push(TelegramCall::SendVideo {
            video: video.clone(),
            caption: calls.is_empty(),
        });
    }

    TelegramPlan { calls }
}
