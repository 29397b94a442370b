//! Periodic tick sources.
//!
//! The coordinator does not own a thread. It arms a [`TickScheduler`] while a
//! session is running and cancels it on pause/stop. The driver delivers each
//! tick back to the coordinator with [`TimerCoordinator::on_tick`], passing the
//! handle it was armed with; ticks carrying a cancelled handle are ignored.
//!
//! [`TimerCoordinator::on_tick`]: super::TimerCoordinator::on_tick

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Identifies one armed repeating schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickHandle(u64);

impl TickHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Scheduling primitive behind the coordinator's periodic tick.
pub trait TickScheduler: Send {
    /// Start delivering ticks every `interval`.
    fn schedule_repeating(&mut self, interval: Duration) -> TickHandle;

    /// Stop delivering ticks for `handle`. Cancelling twice is harmless.
    fn cancel(&mut self, handle: TickHandle);
}

#[derive(Debug, Default)]
struct ManualTickerState {
    next_id: u64,
    armed: Option<(TickHandle, Duration)>,
}

/// Virtual tick source: records what the coordinator asked for and lets the
/// test decide when ticks happen.
#[derive(Debug, Clone, Default)]
pub struct ManualTicker {
    state: Arc<Mutex<ManualTickerState>>,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently armed handle, if any.
    pub fn armed(&self) -> Option<TickHandle> {
        self.lock().armed.map(|(handle, _)| handle)
    }

    /// Interval of the currently armed schedule.
    pub fn interval(&self) -> Option<Duration> {
        self.lock().armed.map(|(_, interval)| interval)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualTickerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TickScheduler for ManualTicker {
    fn schedule_repeating(&mut self, interval: Duration) -> TickHandle {
        let mut state = self.lock();
        state.next_id += 1;
        let handle = TickHandle(state.next_id);
        state.armed = Some((handle, interval));
        handle
    }

    fn cancel(&mut self, handle: TickHandle) {
        let mut state = self.lock();
        if state.armed.map(|(h, _)| h) == Some(handle) {
            state.armed = None;
        }
    }
}

/// Tick source backed by a tokio interval task.
///
/// Ticks arrive on the receiver returned by [`TokioTicker::new`]; the owner of
/// the coordinator forwards them to `on_tick`. Must be used from within a
/// tokio runtime.
#[derive(Debug)]
pub struct TokioTicker {
    tx: mpsc::UnboundedSender<TickHandle>,
    next_id: u64,
    task: Option<(TickHandle, JoinHandle<()>)>,
}

impl TokioTicker {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TickHandle>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let ticker = Self {
            tx,
            next_id: 0,
            task: None,
        };
        (ticker, rx)
    }
}

impl TickScheduler for TokioTicker {
    fn schedule_repeating(&mut self, interval: Duration) -> TickHandle {
        if let Some((_, task)) = self.task.take() {
            task.abort();
        }

        self.next_id += 1;
        let handle = TickHandle(self.next_id);
        let tx = self.tx.clone();
        let period = interval.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            let mut interval = time::interval_at(time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if tx.send(handle).is_err() {
                    break;
                }
            }
        });

        self.task = Some((handle, task));
        handle
    }

    fn cancel(&mut self, handle: TickHandle) {
        if matches!(self.task, Some((h, _)) if h == handle) {
            if let Some((_, task)) = self.task.take() {
                task.abort();
            }
        }
    }
}

impl Drop for TokioTicker {
    fn drop(&mut self) {
        if let Some((_, task)) = self.task.take() {
            task.abort();
        }
    }
}
