//! Synthetic "thinking" animation shown while a question is outstanding.
//!
//! The animator is a tokio task that emits `Analyzing.`, `Analyzing..`,
//! `Analyzing...`, `Analyzing.` ... on a fixed period. It never touches the
//! conversation itself; the owner supplies the callback that does.

use std::ops::ControlFlow;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

pub const DEFAULT_LABEL: &str = "Analyzing";
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);
const DOT_CYCLE: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationSettings {
    pub label: String,
    pub interval: Duration,
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self {
            label: DEFAULT_LABEL.to_string(),
            interval: DEFAULT_INTERVAL,
        }
    }
}

/// Dot count after `step`: 1, 2, 3, 1, 2, 3, ...
pub fn next_step(step: usize) -> usize {
    step % DOT_CYCLE + 1
}

pub fn frame(label: &str, dots: usize) -> String {
    format!("{label}{}", ".".repeat(dots))
}

/// Handle to a running animation. Dropping it cancels the task.
#[derive(Debug)]
pub struct ProgressAnimator {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ProgressAnimator {
    /// Start ticking. The first frame arrives one interval after the call.
    ///
    /// `on_frame` runs once per tick; returning `Break` ends the animation.
    pub fn spawn<F>(settings: AnimationSettings, mut on_frame: F) -> Self
    where
        F: FnMut(String) -> ControlFlow<()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let period = settings.interval.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            trace!(?period, "progress animator started");
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut dots = 0;

            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => {
                        dots = next_step(dots);
                        if on_frame(frame(&settings.label, dots)).is_break() {
                            break;
                        }
                    }
                }
            }
            trace!("progress animator stopped");
        });

        Self {
            token,
            task: Some(task),
        }
    }

    /// Request the task to stop. Safe to call any number of times.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Cancel and wait until the task has exited, so no further frame can be
    /// delivered once this returns.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("progress animator ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for ProgressAnimator {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
