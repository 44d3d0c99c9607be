// Audio output capability consumed by the clip player
use std::sync::Arc;
use thiserror::Error;

/// Called by an output when the loaded clip plays through to its end, with
/// the number of the `start` call (counting from 1 on each output) whose
/// playback ended. May be invoked from any thread, but never from inside a
/// `MediaOutput` method.
pub type CompletionCallback = Arc<dyn Fn(u64) + Send + Sync>;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported media: {0}")]
    Unsupported(String),

    #[error("failed to prepare media: {0}")]
    Decode(String),

    #[error("audio device unavailable: {0}")]
    Device(String),
}

/// Something that can play one media resource at a time.
///
/// Positions are milliseconds from the start of the loaded resource.
pub trait MediaOutput: Send {
    /// Reset any previous resource and prepare `uri` for playback from the start
    fn load(&mut self, uri: &str) -> Result<(), LoadError>;

    fn seek(&mut self, position_ms: u32);

    fn start(&mut self);

    fn pause(&mut self);

    fn stop(&mut self);

    fn current_position(&self) -> u32;

    /// Free the underlying resources. The output is not used again afterwards.
    fn release(&mut self);

    fn set_on_completion(&mut self, callback: CompletionCallback);
}

/// Builds outputs on demand, so a released output can be replaced later
pub trait MediaOutputFactory: Send + Sync {
    fn create(&self) -> Box<dyn MediaOutput>;
}

impl<F> MediaOutputFactory for F
where
    F: Fn() -> Box<dyn MediaOutput> + Send + Sync,
{
    fn create(&self) -> Box<dyn MediaOutput> {
        self()
    }
}
