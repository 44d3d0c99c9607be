// Test doubles for the output and scheduler capabilities
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::audio::media::{CompletionCallback, LoadError, MediaOutput, MediaOutputFactory};
use crate::audio::scheduler::{Scheduler, Task};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaCall {
    Load(String),
    Seek(u32),
    Start,
    Pause,
    Stop,
    Release,
}

type LoadHook = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
struct FakeMediaState {
    calls: Vec<MediaCall>,
    position: u32,
    created: usize,
    runs: u64,
    failing_uri: Option<String>,
    on_completion: Option<CompletionCallback>,
    on_load: Option<LoadHook>,
}

/// Shared view of every output a `FakeMedia` factory has handed out
#[derive(Clone, Default)]
pub struct FakeMedia {
    state: Arc<Mutex<FakeMediaState>>,
}

impl FakeMedia {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<MediaCall> {
        self.state.lock().calls.clone()
    }

    pub fn loads(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                MediaCall::Load(uri) => Some(uri),
                _ => None,
            })
            .collect()
    }

    pub fn last_call(&self) -> Option<MediaCall> {
        self.state.lock().calls.last().cloned()
    }

    pub fn created(&self) -> usize {
        self.state.lock().created
    }

    /// Pretend playback has advanced to `position_ms`
    pub fn set_position(&self, position_ms: u32) {
        self.state.lock().position = position_ms;
    }

    pub fn fail_loading(&self, uri: &str) {
        self.state.lock().failing_uri = Some(uri.to_string());
    }

    /// Run `hook` inside every `load`, while the player is mid-call
    pub fn on_load(&self, hook: impl Fn(&str) + Send + Sync + 'static) {
        self.state.lock().on_load = Some(Arc::new(hook));
    }

    /// Fire the completion callback as the output would at end of clip
    pub fn complete(&self) {
        let run = self.state.lock().runs;
        self.complete_run(run);
    }

    /// Fire the completion callback for the playback begun by the `run`th start
    pub fn complete_run(&self, run: u64) {
        let callback = self.state.lock().on_completion.clone();
        if let Some(callback) = callback {
            callback(run);
        }
    }
}

impl MediaOutputFactory for FakeMedia {
    fn create(&self) -> Box<dyn MediaOutput> {
        let mut state = self.state.lock();
        state.created += 1;
        state.runs = 0;
        Box::new(FakeMediaOutput {
            state: Arc::clone(&self.state),
        })
    }
}

struct FakeMediaOutput {
    state: Arc<Mutex<FakeMediaState>>,
}

impl FakeMediaOutput {
    fn record(&self, call: MediaCall) {
        self.state.lock().calls.push(call);
    }
}

impl MediaOutput for FakeMediaOutput {
    fn load(&mut self, uri: &str) -> Result<(), LoadError> {
        self.record(MediaCall::Load(uri.to_string()));
        let hook = self.state.lock().on_load.clone();
        if let Some(hook) = hook {
            hook(uri);
        }

        let mut state = self.state.lock();
        if state.failing_uri.as_deref() == Some(uri) {
            return Err(LoadError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no such clip",
            )));
        }
        state.position = 0;
        Ok(())
    }

    fn seek(&mut self, position_ms: u32) {
        self.record(MediaCall::Seek(position_ms));
        self.state.lock().position = position_ms;
    }

    fn start(&mut self) {
        self.record(MediaCall::Start);
        self.state.lock().runs += 1;
    }

    fn pause(&mut self) {
        self.record(MediaCall::Pause);
    }

    fn stop(&mut self) {
        self.record(MediaCall::Stop);
    }

    fn current_position(&self) -> u32 {
        self.state.lock().position
    }

    fn release(&mut self) {
        self.record(MediaCall::Release);
    }

    fn set_on_completion(&mut self, callback: CompletionCallback) {
        self.state.lock().on_completion = Some(callback);
    }
}

#[derive(Default)]
struct FakeSchedulerState {
    task: Option<(Task, Duration)>,
    scheduled: usize,
}

/// Scheduler whose task only runs when the test says so
#[derive(Clone, Default)]
pub struct FakeScheduler {
    state: Arc<Mutex<FakeSchedulerState>>,
}

impl FakeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run_foreground(&self) {
        let task = self.state.lock().task.as_ref().map(|(task, _)| Arc::clone(task));
        if let Some(task) = task {
            task();
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.state.lock().task.is_some()
    }

    pub fn period(&self) -> Option<Duration> {
        self.state.lock().task.as_ref().map(|(_, period)| *period)
    }

    pub fn times_scheduled(&self) -> usize {
        self.state.lock().scheduled
    }
}

impl Scheduler for FakeScheduler {
    fn schedule(&mut self, task: Task, period: Duration) {
        let mut state = self.state.lock();
        state.task = Some((task, period));
        state.scheduled += 1;
    }

    fn cancel(&mut self) {
        self.state.lock().task = None;
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
