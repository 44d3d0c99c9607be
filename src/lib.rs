// Audio clips - playback of short recordings attached to form questions
// Module declarations
pub mod audio;
pub mod clip;
pub mod error;
pub mod live;
pub mod settings;
pub mod state;

#[cfg(test)]
mod testing;

pub use audio::{AudioClipPlayer, PlaybackState};
pub use clip::{Clip, ClipId};
pub use error::PlaybackError;
pub use live::{LiveValue, MappedObserver, Observer};
pub use settings::{AppSettings, PlaybackSettings};
pub use state::AppState;
