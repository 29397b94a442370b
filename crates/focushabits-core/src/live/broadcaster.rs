use std::time::Duration;

use tracing::{debug, warn};

use super::{LiveSnapshot, LiveStatusSink, NullSink};

/// Best-effort bridge between the coordinator and a [`LiveStatusSink`].
///
/// Keeps at most one channel open. Sink failures are logged and swallowed;
/// nothing here can change session state.
pub struct LiveStatusBroadcaster {
    sink: Box<dyn LiveStatusSink>,
    open: bool,
    last: Option<LiveSnapshot>,
    /// Minimum elapsed-time delta between two tick-driven pushes.
    min_update_interval: Duration,
}

impl LiveStatusBroadcaster {
    pub fn new(sink: Box<dyn LiveStatusSink>) -> Self {
        Self {
            sink,
            open: false,
            last: None,
            min_update_interval: Duration::from_secs(1),
        }
    }

    /// A broadcaster that drops everything.
    pub fn disabled() -> Self {
        Self::new(Box::new(NullSink))
    }

    pub fn with_min_update_interval(mut self, interval: Duration) -> Self {
        self.min_update_interval = interval;
        self
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Open a channel for a new session, ending any channel still open.
    pub fn begin(&mut self, snapshot: LiveSnapshot) {
        if self.open {
            let previous = self.last.clone().unwrap_or_else(|| snapshot.clone());
            self.end(previous);
        }

        match self.sink.begin(&snapshot) {
            Ok(()) => {
                debug!(title = %snapshot.title, kind = %snapshot.kind_label, "live status started");
                self.open = true;
            }
            Err(e) => {
                warn!(error = %e, "failed to start live status");
                self.open = false;
            }
        }
        self.last = Some(snapshot);
    }

    /// Push a snapshot after a state transition. Always forwarded.
    pub fn update(&mut self, snapshot: LiveSnapshot) {
        if !self.open {
            return;
        }
        if let Err(e) = self.sink.update(&snapshot) {
            warn!(error = %e, "failed to update live status");
        }
        self.last = Some(snapshot);
    }

    /// Push a tick-driven snapshot, skipped unless enough session time has
    /// passed since the last push.
    pub fn update_throttled(&mut self, snapshot: LiveSnapshot) {
        if !self.open {
            return;
        }
        let due = match &self.last {
            Some(last) => {
                (snapshot.elapsed_secs - last.elapsed_secs).abs()
                    >= self.min_update_interval.as_secs_f64()
            }
            None => true,
        };
        if due {
            self.update(snapshot);
        }
    }

    /// Close the channel with a final snapshot. No-op when nothing is open.
    pub fn end(&mut self, snapshot: LiveSnapshot) {
        if !self.open {
            self.last = None;
            return;
        }
        let final_snapshot = snapshot.finalized();
        if let Err(e) = self.sink.end(&final_snapshot) {
            warn!(error = %e, "failed to end live status");
        }
        debug!(title = %final_snapshot.title, "live status ended");
        self.open = false;
        self.last = None;
    }
}

impl Default for LiveStatusBroadcaster {
    fn default() -> Self {
        Self::disabled()
    }
}

impl std::fmt::Debug for LiveStatusBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveStatusBroadcaster")
            .field("open", &self.open)
            .field("min_update_interval", &self.min_update_interval)
            .finish()
    }
}
