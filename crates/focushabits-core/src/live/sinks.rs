use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{LiveSnapshot, LiveStatusSink};
use crate::error::BroadcastError;

/// Sink used when live status is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl LiveStatusSink for NullSink {
    fn begin(&mut self, _snapshot: &LiveSnapshot) -> Result<(), BroadcastError> {
        Ok(())
    }

    fn update(&mut self, _snapshot: &LiveSnapshot) -> Result<(), BroadcastError> {
        Ok(())
    }

    fn end(&mut self, _snapshot: &LiveSnapshot) -> Result<(), BroadcastError> {
        Ok(())
    }
}

/// Writes the current snapshot as JSON to a file that a status bar or
/// desktop widget can watch. The file is removed when the session ends.
#[derive(Debug, Clone)]
pub struct StatusFileSink {
    path: PathBuf,
}

impl StatusFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back the snapshot currently on disk, if any.
    pub fn read(&self) -> Result<Option<LiveSnapshot>, BroadcastError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, snapshot: &LiveSnapshot) -> Result<(), BroadcastError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Write-then-rename so readers never see a torn file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(snapshot)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl LiveStatusSink for StatusFileSink {
    fn begin(&mut self, snapshot: &LiveSnapshot) -> Result<(), BroadcastError> {
        self.write(snapshot)
    }

    fn update(&mut self, snapshot: &LiveSnapshot) -> Result<(), BroadcastError> {
        self.write(snapshot)
    }

    fn end(&mut self, _snapshot: &LiveSnapshot) -> Result<(), BroadcastError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// One call received by a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    Begin(LiveSnapshot),
    Update(LiveSnapshot),
    End(LiveSnapshot),
}

#[derive(Debug, Default)]
struct RecordingState {
    calls: Vec<SinkCall>,
    failure: Option<String>,
}

/// In-memory sink that records every accepted call. Clones share the log.
///
/// Can be switched into a failing mode to exercise the best-effort path.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.lock().calls.clone()
    }

    pub fn update_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, SinkCall::Update(_)))
            .count()
    }

    /// Channels begun and not yet ended.
    pub fn open_channels(&self) -> usize {
        let state = self.lock();
        let begun = state
            .calls
            .iter()
            .filter(|c| matches!(c, SinkCall::Begin(_)))
            .count();
        let ended = state
            .calls
            .iter()
            .filter(|c| matches!(c, SinkCall::End(_)))
            .count();
        begun.saturating_sub(ended)
    }

    pub fn last(&self) -> Option<SinkCall> {
        self.lock().calls.last().cloned()
    }

    /// Make every subsequent call fail with `message`.
    pub fn fail_with(&self, message: &str) {
        self.lock().failure = Some(message.to_string());
    }

    pub fn recover(&self) {
        self.lock().failure = None;
    }

    fn record(&self, call: SinkCall) -> Result<(), BroadcastError> {
        let mut state = self.lock();
        if let Some(message) = &state.failure {
            return Err(BroadcastError::Unavailable(message.clone()));
        }
        state.calls.push(call);
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, RecordingState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LiveStatusSink for RecordingSink {
    fn begin(&mut self, snapshot: &LiveSnapshot) -> Result<(), BroadcastError> {
        self.record(SinkCall::Begin(snapshot.clone()))
    }

    fn update(&mut self, snapshot: &LiveSnapshot) -> Result<(), BroadcastError> {
        self.record(SinkCall::Update(snapshot.clone()))
    }

    fn end(&mut self, snapshot: &LiveSnapshot) -> Result<(), BroadcastError> {
        self.record(SinkCall::End(snapshot.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::sample_snapshot;

    #[test]
    fn status_file_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = StatusFileSink::new(dir.path().join("live").join("status.json"));

        sink.begin(&sample_snapshot(0.0)).unwrap();
        sink.update(&sample_snapshot(42.0)).unwrap();
        let on_disk = sink.read().unwrap().unwrap();
        assert_eq!(on_disk.elapsed_secs, 42.0);
        assert_eq!(on_disk.title, "Focus");

        sink.end(&sample_snapshot(42.0)).unwrap();
        assert!(sink.read().unwrap().is_none());
        // Ending twice is fine.
        sink.end(&sample_snapshot(42.0)).unwrap();
    }

    #[test]
    fn recording_sink_failure_mode() {
        let mut sink = RecordingSink::new();
        sink.fail_with("denied");
        let err = sink.begin(&sample_snapshot(0.0)).unwrap_err();
        assert!(err.to_string().contains("denied"));
        assert!(sink.calls().is_empty());
    }
}
