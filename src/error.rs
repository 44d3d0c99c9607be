// Errors surfaced to callers of the clip player
use thiserror::Error;

use crate::audio::media::LoadError;
use crate::clip::ClipId;

#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The clip's audio could not be loaded into the output. The player is left idle.
    #[error("failed to load clip '{clip_id}' from {uri}: {source}")]
    LoadFailed {
        clip_id: ClipId,
        uri: String,
        #[source]
        source: LoadError,
    },
}

impl PlaybackError {
    pub fn clip_id(&self) -> &ClipId {
        match self {
            PlaybackError::LoadFailed { clip_id, .. } => clip_id,
        }
    }
}
