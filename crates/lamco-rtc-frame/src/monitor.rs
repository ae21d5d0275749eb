//! Background resource monitor
//!
//! Runs [`FrameConverter::sweep`] on a fixed period from a tokio task. The
//! task holds only a weak reference to the engine and never touches the
//! frame-path lock while releasing buffers.
//!
//! [`ResourceMonitor::stop`] cancels the task and waits for it to finish, so
//! no sweep can run after it returns. Dropping the handle aborts the task.

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

use crate::converter::{self, FrameConverter, Inner};

/// Handle to a running resource monitor
#[derive(Debug)]
pub struct ResourceMonitor {
    cancel: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ResourceMonitor {
    /// Start sweeping `converter` every configured sweep interval
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(converter: &FrameConverter) -> Self {
        let period = converter.config().sweep_interval;
        let (cancel, cancelled) = oneshot::channel();
        let task = tokio::spawn(run(converter.downgrade(), period, cancelled));
        debug!("Resource monitor started, sweeping every {:?}", period);

        Self {
            cancel: Some(cancel),
            task: Some(task),
        }
    }

    /// Whether the monitor task is still running
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the monitor and wait for the task to exit
    pub async fn stop(mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ResourceMonitor {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run(engine: Weak<Inner>, period: Duration, mut cancelled: oneshot::Receiver<()>) {
    let mut ticker = time::interval_at(time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut cancelled => break,
            _ = ticker.tick() => {
                let Some(inner) = engine.upgrade() else {
                    break;
                };
                FrameConverter::from_inner(inner).sweep(converter::now());
            }
        }
    }
    debug!("Resource monitor stopped");
}
