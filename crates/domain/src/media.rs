//! Media classification from location patterns

use crate::model::{MediaKind, MediaRef};

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "wmv", "flv", "webm"];

/// Path segment some CDNs use for videos served without an extension
const VIDEO_PATH_SEGMENT: &str = "/video/";

/// Classify a media location by its suffix or path pattern.
///
/// Matching is case-sensitive and ignores any query string or fragment, so
/// `https://cdn.example/a.png?sig=1` is an image. Never touches the network.
pub fn classify(location: &str) -> MediaKind {
    let path = strip_query(location);

    if has_extension(path, IMAGE_EXTENSIONS) {
        MediaKind::Image
    } else if has_extension(path, VIDEO_EXTENSIONS) || path.contains(VIDEO_PATH_SEGMENT) {
        MediaKind::Video
    } else {
        MediaKind::Unknown
    }
}

/// Classify every location, preserving order
pub fn classify_all<S: AsRef<str>>(locations: &[S]) -> Vec<MediaRef> {
    locations
        .iter()
        .map(|location| MediaRef::new(location.as_ref()))
        .collect()
}

fn strip_query(location: &str) -> &str {
    let end = location.find(['?', '#']).unwrap_or(location.len());
    &location[..end]
}

fn has_extension(path: &str, extensions: &[&str]) -> bool {
    extensions.iter().any(|ext| {
        path.len() > ext.len()
            && path.ends_with(ext)
            && path.as_bytes()[path.len() - ext.len() - 1] == b'.'
    })
}
