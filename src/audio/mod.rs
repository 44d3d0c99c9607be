// Audio playback module
// The clip player sits on top of two capabilities: a media output and a
// scheduler. The device backend uses Symphonia for decoding and cpal for output.

pub mod decoder;
pub mod device;
pub mod media;
pub mod output;
pub mod player;
pub mod resample;
pub mod scheduler;

pub use device::{DeviceOutput, DeviceOutputFactory};
pub use media::{CompletionCallback, LoadError, MediaOutput, MediaOutputFactory};
pub use player::{AudioClipPlayer, PlaybackState};
pub use scheduler::{Scheduler, Task, TokioScheduler};
