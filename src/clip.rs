// Clip identity and location
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque key for a logical audio clip, independent of where its audio is stored.
/// Stays stable for as long as the question it belongs to is on screen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClipId(String);

impl ClipId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClipId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ClipId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A clip together with the URI its audio is loaded from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clip {
    pub clip_id: ClipId,
    pub uri: String,
}

impl Clip {
    pub fn new(clip_id: impl Into<ClipId>, uri: impl Into<String>) -> Self {
        Self {
            clip_id: clip_id.into(),
            uri: uri.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_id_is_independent_of_uri() {
        let first = Clip::new("q1", "a.mp3");
        let second = Clip::new("q1", "b.mp3");
        assert_eq!(first.clip_id, second.clip_id);
        assert_ne!(first, second);
    }

    #[test]
    fn test_clip_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&ClipId::new("q1")).unwrap();
        assert_eq!(json, "\"q1\"");
    }
}
