use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ProgressState {
    pub completed: usize,
    pub total: usize,
}

impl ProgressState {
    pub(crate) fn new(total: usize) -> Self {
        Self { completed: 0, total }
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.completed >= self.total
    }

    pub(crate) fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 100f64;
        }
        self.completed as f64 / self.total as f64 * 100f64
    }
}

impl fmt::Display for ProgressState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({:.2}%)", self.completed, self.total, self.percentage())
    }
}

/// Consumes probe completion signals and logs progress in batches.
///
/// Wakes up every `interval`, drains whatever signals piled up meanwhile and
/// logs once per wake that saw at least one signal. Cancelling the task that
/// runs it stops it silently.
pub(crate) struct ProgressTracker {
    state: ProgressState,
    interval: Duration,
    signals: UnboundedReceiver<()>,
}

impl ProgressTracker {
    pub(crate) fn new(total: usize, interval: Duration, signals: UnboundedReceiver<()>) -> Self {
        Self {
            state: ProgressState::new(total),
            interval,
            signals,
        }
    }

    pub(crate) async fn run(mut self) -> ProgressState {
        while !self.state.is_complete() {
            tokio::time::sleep(self.interval).await;

            let (drained, disconnected) = self.drain();
            if drained > 0 {
                info!("Progress: {}", self.state);
            }
            if disconnected && !self.state.is_complete() {
                warn!("progress channel closed at {}", self.state);
                break;
            }
        }
        self.state
    }

    /// Returns how many signals were taken and whether every sender is gone.
    fn drain(&mut self) -> (usize, bool) {
        let mut drained = 0;
        loop {
            match self.signals.try_recv() {
                Ok(()) => {
                    drained += 1;
                    self.state.completed += 1;
                }
                Err(TryRecvError::Empty) => return (drained, false),
                Err(TryRecvError::Disconnected) => return (drained, true),
            }
        }
    }
}
