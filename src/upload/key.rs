//! Storage key construction

use crate::media::{MediaType, Orientation};

/// Key under which a stored object is addressed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// `{prefix}/{token}.mp4`, or `{token}.mp4` when there is no prefix
    pub fn video(orientation: Orientation, token: &str) -> Self {
        match orientation.prefix() {
            "" => Self(format!("{}.mp4", token)),
            prefix => Self(format!("{}/{}.mp4", prefix, token)),
        }
    }

    /// `{token}.{extension}`
    pub fn thumbnail(token: &str, media_type: &MediaType) -> Self {
        Self(format!("{}.{}", token, media_type.extension()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
