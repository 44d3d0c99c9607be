// Repeating task scheduling for position updates
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::runtime::{Handle, TryCurrentError};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

pub type Task = Arc<dyn Fn() + Send + Sync>;

/// Single slot repeating task facility. Scheduling while a task is active
/// replaces it; `cancel` with nothing scheduled is a no-op.
pub trait Scheduler: Send {
    fn schedule(&mut self, task: Task, period: Duration);

    fn cancel(&mut self);
}

/// Runs the scheduled task on a tokio runtime. The first run happens one
/// period after scheduling, missed ticks are skipped rather than bunched.
pub struct TokioScheduler {
    handle: Handle,
    active: Option<JoinHandle<()>>,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            active: None,
        }
    }

    /// Use the runtime of the calling context
    pub fn from_current() -> Result<Self, TryCurrentError> {
        Handle::try_current().map(Self::new)
    }

    pub fn is_scheduled(&self) -> bool {
        self.active.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&mut self, task: Task, period: Duration) {
        self.cancel();

        debug!("Scheduling repeating task every {:?}", period);
        let join = self.handle.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                task();
            }
        });
        self.active = Some(join);
    }

    fn cancel(&mut self) {
        if let Some(task) = self.active.take() {
            task.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
