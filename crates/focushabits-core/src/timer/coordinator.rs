//! The timer coordinator.
//!
//! One coordinator owns the single [`SessionState`] of the application and is
//! the only thing that mutates it. Starting any session (habit, task or
//! Pomodoro) replaces whatever was active before.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused
//!           |           |
//!           +--> Idle <-+   (stop, or countdown reaching zero)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut timer = TimerCoordinator::new(SystemClock, ticker);
//! timer.start_pomodoro(25.0 * 60.0, "Focus");
//! // Whenever the tick source fires:
//! if let Some(Event::CountdownCompleted { .. }) = timer.on_tick(handle) { ... }
//! ```
//!
//! All operations are total: calls that make no sense in the current phase
//! are ignored and report `None` / `0.0`.

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};

use super::clock::{secs_between, Clock};
use super::session::{SessionKind, SessionState, TimerPhase};
use super::ticker::{TickHandle, TickScheduler};
use super::format_clock;
use crate::events::{Event, EventBus, Subscriber, SubscriptionId};
use crate::live::{LiveSnapshot, LiveStatusBroadcaster};

/// Default color of Pomodoro sessions.
pub const POMODORO_COLOR: &str = "#FF6B6B";

/// Tunables of the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorConfig {
    /// Tick period while running.
    pub tick_interval: Duration,
    /// Upper bound of a Pomodoro target, also the cap for `add_one_minute`.
    pub max_pomodoro_secs: f64,
    /// Amount added by `add_one_minute`.
    pub extend_step_secs: f64,
    pub pomodoro_color: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            max_pomodoro_secs: 60.0 * 60.0,
            extend_step_secs: 60.0,
            pomodoro_color: POMODORO_COLOR.to_string(),
        }
    }
}

/// What a finished session looked like right before the reset.
struct FinishedSession {
    kind: SessionKind,
    elapsed_secs: f64,
    target_duration_secs: f64,
    title: String,
    started_at: Option<chrono::DateTime<Utc>>,
}

/// Single-session timer state machine.
pub struct TimerCoordinator {
    state: SessionState,
    config: CoordinatorConfig,
    clock: Box<dyn Clock>,
    ticker: Box<dyn TickScheduler>,
    tick_handle: Option<TickHandle>,
    broadcaster: LiveStatusBroadcaster,
    events: EventBus,
}

impl TimerCoordinator {
    /// Create an idle coordinator with live status disabled.
    pub fn new(clock: impl Clock + 'static, ticker: impl TickScheduler + 'static) -> Self {
        Self {
            state: SessionState::idle(),
            config: CoordinatorConfig::default(),
            clock: Box::new(clock),
            ticker: Box::new(ticker),
            tick_handle: None,
            broadcaster: LiveStatusBroadcaster::disabled(),
            events: EventBus::new(),
        }
    }

    pub fn with_config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_broadcaster(mut self, broadcaster: LiveStatusBroadcaster) -> Self {
        self.broadcaster = broadcaster;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> TimerPhase {
        self.state.phase
    }

    pub fn kind(&self) -> Option<&SessionKind> {
        self.state.kind.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.state.phase.is_active()
    }

    /// True when `kind` is the session currently being timed.
    pub fn is_timing(&self, kind: &SessionKind) -> bool {
        self.is_active() && self.state.kind.as_ref() == Some(kind)
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.state.elapsed_secs
    }

    pub fn remaining_secs(&self) -> f64 {
        self.state.remaining_secs
    }

    pub fn target_duration_secs(&self) -> f64 {
        self.state.target_duration_secs
    }

    pub fn title(&self) -> &str {
        &self.state.title
    }

    pub fn color(&self) -> &str {
        &self.state.color
    }

    pub fn is_countdown_mode(&self) -> bool {
        self.state.is_countdown_mode()
    }

    /// 0.0 ..= 1.0 of the target reached.
    pub fn progress(&self) -> f64 {
        self.state.progress()
    }

    pub fn formatted_elapsed(&self) -> String {
        format_clock(self.state.elapsed_secs)
    }

    pub fn formatted_remaining(&self) -> String {
        format_clock(self.state.remaining_secs)
    }

    /// Handle of the currently armed tick schedule.
    pub fn tick_handle(&self) -> Option<TickHandle> {
        self.tick_handle
    }

    pub fn broadcaster(&self) -> &LiveStatusBroadcaster {
        &self.broadcaster
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Current state in live status form.
    pub fn snapshot(&self) -> LiveSnapshot {
        LiveSnapshot {
            elapsed_secs: self.state.elapsed_secs,
            remaining_secs: self.state.remaining_secs,
            target_duration_secs: self.state.target_duration_secs,
            is_running: self.state.phase == TimerPhase::Running,
            is_countdown_mode: self.state.is_countdown_mode(),
            title: self.state.title.clone(),
            color: self.state.color.clone(),
            kind_label: self
                .state
                .kind
                .as_ref()
                .map(|k| k.label().to_string())
                .unwrap_or_else(|| "Timer".to_string()),
            updated_at: self.clock.now(),
        }
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe(&mut self, subscriber: Subscriber) -> SubscriptionId {
        self.events.subscribe(subscriber)
    }

    pub fn subscribe_channel(&mut self) -> (SubscriptionId, std::sync::mpsc::Receiver<Event>) {
        self.events.subscribe_channel()
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start timing a habit. `target_duration_secs` only drives the progress
    /// ratio; habit timers never count down or stop on their own.
    pub fn start_habit_timer(
        &mut self,
        habit_id: impl Into<String>,
        title: impl Into<String>,
        color: impl Into<String>,
        target_duration_secs: Option<f64>,
    ) -> Event {
        let kind = SessionKind::Habit {
            habit_id: habit_id.into(),
        };
        let target = sanitize_secs(target_duration_secs.unwrap_or(0.0));
        self.begin_session(kind, title.into(), color.into(), target)
    }

    /// Start timing a task. Task timers are count-up only.
    pub fn start_task_timer(
        &mut self,
        task_id: impl Into<String>,
        title: impl Into<String>,
        color: impl Into<String>,
    ) -> Event {
        let kind = SessionKind::Task {
            task_id: task_id.into(),
        };
        self.begin_session(kind, title.into(), color.into(), 0.0)
    }

    /// Start a Pomodoro countdown of `duration_secs`, capped at the
    /// configured maximum.
    pub fn start_pomodoro(&mut self, duration_secs: f64, title: impl Into<String>) -> Event {
        let target = sanitize_secs(duration_secs).min(self.config.max_pomodoro_secs);
        let color = self.config.pomodoro_color.clone();
        self.begin_session(SessionKind::Pomodoro, title.into(), color, target)
    }

    pub fn pause_current_timer(&mut self) -> Option<Event> {
        if self.state.phase != TimerPhase::Running {
            debug!(phase = ?self.state.phase, "pause ignored");
            return None;
        }

        self.refresh_elapsed();
        if self.countdown_finished() {
            return self.complete_countdown();
        }

        self.cancel_ticker();
        self.state.phase = TimerPhase::Paused;
        self.state.started_at = None;
        self.state.accumulated_before_pause = self.state.elapsed_secs;
        self.broadcaster.update(self.snapshot());

        let event = Event::TimerPaused {
            elapsed_secs: self.state.elapsed_secs,
            at: self.clock.now(),
        };
        self.events.publish(&event);
        Some(event)
    }

    pub fn resume_timer(&mut self) -> Option<Event> {
        if self.state.phase != TimerPhase::Paused {
            debug!(phase = ?self.state.phase, "resume ignored");
            return None;
        }

        let now = self.clock.now();
        self.state.started_at = Some(now);
        self.state.accumulated_before_pause = self.state.elapsed_secs;
        self.state.phase = TimerPhase::Running;
        self.arm_ticker();
        self.broadcaster.update(self.snapshot());

        let event = Event::TimerResumed {
            elapsed_secs: self.state.elapsed_secs,
            at: now,
        };
        self.events.publish(&event);
        Some(event)
    }

    /// Stop the active session and hand its elapsed seconds to the caller,
    /// who decides what to persist. Returns 0 when idle.
    pub fn stop_timer(&mut self) -> f64 {
        let Some(finished) = self.finish_session() else {
            debug!("stop ignored: no active session");
            return 0.0;
        };

        info!(
            kind = finished.kind.label(),
            title = %finished.title,
            elapsed_secs = finished.elapsed_secs,
            "session stopped"
        );
        let event = Event::TimerStopped {
            kind: finished.kind,
            elapsed_secs: finished.elapsed_secs,
            at: self.clock.now(),
        };
        self.events.publish(&event);
        finished.elapsed_secs
    }

    /// Extend a Pomodoro by one step (60 s by default), never beyond the
    /// maximum. Returns the seconds actually added.
    pub fn add_one_minute(&mut self) -> f64 {
        if !self.state.is_countdown_mode() {
            debug!("add_one_minute ignored: not a pomodoro");
            return 0.0;
        }

        self.refresh_elapsed();
        let current = self.state.target_duration_secs;
        let new_target =
            (current + self.config.extend_step_secs).min(self.config.max_pomodoro_secs);
        let added = (new_target - current).max(0.0);
        if added <= 0.0 {
            return 0.0;
        }

        self.state.target_duration_secs = new_target;
        self.state.remaining_secs += added;
        self.broadcaster.update(self.snapshot());

        let event = Event::TimeAdded {
            added_secs: added,
            target_duration_secs: new_target,
            at: self.clock.now(),
        };
        self.events.publish(&event);
        added
    }

    pub fn toggle_play_pause(&mut self) -> Option<Event> {
        match self.state.phase {
            TimerPhase::Running => self.pause_current_timer(),
            TimerPhase::Paused => self.resume_timer(),
            TimerPhase::Idle => None,
        }
    }

    /// Recompute elapsed/remaining from the clock. Returns
    /// `Some(Event::CountdownCompleted)` when a countdown just finished.
    pub fn tick(&mut self) -> Option<Event> {
        if self.state.phase != TimerPhase::Running {
            return None;
        }

        self.refresh_elapsed();
        if self.countdown_finished() {
            return self.complete_countdown();
        }

        self.broadcaster.update_throttled(self.snapshot());
        None
    }

    /// Tick delivered by a scheduler. Ticks from a cancelled schedule are
    /// dropped.
    pub fn on_tick(&mut self, handle: TickHandle) -> Option<Event> {
        if self.tick_handle != Some(handle) {
            debug!(handle = handle.id(), "stale tick dropped");
            return None;
        }
        self.tick()
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn begin_session(
        &mut self,
        kind: SessionKind,
        title: String,
        color: String,
        target_duration_secs: f64,
    ) -> Event {
        self.discard_active();

        let now = self.clock.now();
        self.state = SessionState {
            kind: Some(kind.clone()),
            phase: TimerPhase::Running,
            elapsed_secs: 0.0,
            target_duration_secs,
            remaining_secs: target_duration_secs,
            title: title.clone(),
            color,
            started_at: Some(now),
            accumulated_before_pause: 0.0,
            session_started_at: Some(now),
        };
        self.arm_ticker();
        self.broadcaster.begin(self.snapshot());

        info!(kind = kind.label(), title = %title, target_duration_secs, "session started");
        let event = Event::TimerStarted {
            kind,
            title,
            target_duration_secs,
            at: now,
        };
        self.events.publish(&event);
        event
    }

    /// Drop the active session without reporting its time anywhere.
    fn discard_active(&mut self) {
        let Some(finished) = self.finish_session() else {
            return;
        };

        info!(
            kind = finished.kind.label(),
            title = %finished.title,
            elapsed_secs = finished.elapsed_secs,
            "active session discarded by a new start"
        );
        let event = Event::SessionDiscarded {
            kind: finished.kind,
            elapsed_secs: finished.elapsed_secs,
            at: self.clock.now(),
        };
        self.events.publish(&event);
    }

    fn complete_countdown(&mut self) -> Option<Event> {
        let finished = self.finish_session()?;

        info!(
            title = %finished.title,
            planned_duration_secs = finished.target_duration_secs,
            "countdown completed"
        );
        let event = Event::CountdownCompleted {
            planned_duration_secs: finished.target_duration_secs,
            elapsed_secs: finished.elapsed_secs,
            title: finished.title,
            started_at: finished.started_at,
            at: self.clock.now(),
        };
        self.events.publish(&event);
        Some(event)
    }

    /// Shared tail of stop/complete/discard: freeze time, cancel ticking,
    /// close the live channel, reset to idle.
    fn finish_session(&mut self) -> Option<FinishedSession> {
        if !self.state.phase.is_active() {
            return None;
        }

        self.refresh_elapsed();
        self.cancel_ticker();
        self.broadcaster.end(self.snapshot());

        let state = std::mem::take(&mut self.state);
        Some(FinishedSession {
            kind: state.kind?,
            elapsed_secs: state.elapsed_secs,
            target_duration_secs: state.target_duration_secs,
            title: state.title,
            started_at: state.session_started_at,
        })
    }

    /// elapsed = (now - started_at) + banked time. Only meaningful while
    /// running; a paused session keeps its frozen value.
    fn refresh_elapsed(&mut self) {
        if self.state.phase != TimerPhase::Running {
            return;
        }
        let Some(started_at) = self.state.started_at else {
            return;
        };

        let mut elapsed =
            secs_between(started_at, self.clock.now()) + self.state.accumulated_before_pause;
        if self.state.is_countdown_mode() {
            elapsed = elapsed.min(self.state.target_duration_secs);
            self.state.remaining_secs = (self.state.target_duration_secs - elapsed).max(0.0);
        }
        self.state.elapsed_secs = elapsed;
    }

    fn countdown_finished(&self) -> bool {
        self.state.is_countdown_mode() && self.state.remaining_secs <= 0.0
    }

    fn arm_ticker(&mut self) {
        self.cancel_ticker();
        self.tick_handle = Some(self.ticker.schedule_repeating(self.config.tick_interval));
    }

    fn cancel_ticker(&mut self) {
        if let Some(handle) = self.tick_handle.take() {
            self.ticker.cancel(handle);
        }
    }
}

impl Drop for TimerCoordinator {
    fn drop(&mut self) {
        self.cancel_ticker();
    }
}

impl std::fmt::Debug for TimerCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerCoordinator")
            .field("state", &self.state)
            .field("config", &self.config)
            .field("tick_handle", &self.tick_handle)
            .field("broadcaster", &self.broadcaster)
            .field("events", &self.events)
            .finish()
    }
}

fn sanitize_secs(secs: f64) -> f64 {
    if secs.is_finite() && secs > 0.0 {
        secs
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::{RecordingSink, SinkCall};
    use crate::timer::{ManualClock, ManualTicker};

    fn setup() -> (TimerCoordinator, ManualClock, ManualTicker) {
        let clock = ManualClock::default();
        let ticker = ManualTicker::new();
        let timer = TimerCoordinator::new(clock.clone(), ticker.clone());
        (timer, clock, ticker)
    }

    #[test]
    fn start_pause_resume_stop() {
        let (mut timer, clock, ticker) = setup();
        assert_eq!(timer.phase(), TimerPhase::Idle);

        timer.start_task_timer("t1", "Write report", "#6C5CE7");
        assert_eq!(timer.phase(), TimerPhase::Running);
        assert!(ticker.armed().is_some());

        clock.advance_secs(10.0);
        assert!(timer.pause_current_timer().is_some());
        assert_eq!(timer.phase(), TimerPhase::Paused);
        assert!(ticker.armed().is_none());
        assert_eq!(timer.elapsed_secs(), 10.0);

        assert!(timer.resume_timer().is_some());
        assert_eq!(timer.phase(), TimerPhase::Running);
        assert!(ticker.armed().is_some());

        clock.advance_secs(5.0);
        assert_eq!(timer.stop_timer(), 15.0);
        assert_eq!(timer.phase(), TimerPhase::Idle);
        assert!(timer.kind().is_none());
        assert!(ticker.armed().is_none());
    }

    #[test]
    fn invalid_transitions_are_ignored() {
        let (mut timer, _clock, _ticker) = setup();
        assert!(timer.pause_current_timer().is_none());
        assert!(timer.resume_timer().is_none());
        assert!(timer.toggle_play_pause().is_none());
        assert_eq!(timer.add_one_minute(), 0.0);
        assert!(timer.tick().is_none());

        timer.start_pomodoro(1500.0, "Focus");
        assert!(timer.resume_timer().is_none());
        assert_eq!(timer.phase(), TimerPhase::Running);
    }

    #[test]
    fn toggle_switches_between_running_and_paused() {
        let (mut timer, _clock, _ticker) = setup();
        timer.start_pomodoro(1500.0, "Focus");
        assert!(matches!(timer.toggle_play_pause(), Some(Event::TimerPaused { .. })));
        assert!(matches!(timer.toggle_play_pause(), Some(Event::TimerResumed { .. })));
    }

    #[test]
    fn pomodoro_uses_fixed_color_and_target() {
        let (mut timer, _clock, _ticker) = setup();
        timer.start_pomodoro(1500.0, "Focus");
        assert_eq!(timer.color(), POMODORO_COLOR);
        assert_eq!(timer.target_duration_secs(), 1500.0);
        assert_eq!(timer.remaining_secs(), 1500.0);
        assert!(timer.is_countdown_mode());
        assert_eq!(timer.formatted_remaining(), "25:00");
    }

    #[test]
    fn pomodoro_target_is_capped() {
        let (mut timer, _clock, _ticker) = setup();
        timer.start_pomodoro(2.0 * 3600.0, "Long");
        assert_eq!(timer.target_duration_secs(), 3600.0);
    }

    #[test]
    fn task_timer_has_no_target() {
        let (mut timer, clock, _ticker) = setup();
        timer.start_task_timer("t1", "Inbox", "#A8E6CF");
        clock.advance_secs(90.0);
        assert!(timer.tick().is_none());
        assert_eq!(timer.target_duration_secs(), 0.0);
        assert_eq!(timer.progress(), 0.0);
        assert_eq!(timer.formatted_elapsed(), "01:30");
    }

    #[test]
    fn habit_progress_uses_target() {
        let (mut timer, clock, _ticker) = setup();
        timer.start_habit_timer("h1", "Read", "#FFAA00", Some(600.0));
        clock.advance_secs(150.0);
        timer.tick();
        assert_eq!(timer.progress(), 0.25);
        assert!(!timer.is_countdown_mode());
    }

    #[test]
    fn stale_tick_after_stop_is_dropped() {
        let (mut timer, clock, ticker) = setup();
        timer.start_pomodoro(60.0, "Quick");
        let handle = ticker.armed().unwrap();
        timer.stop_timer();

        clock.advance_secs(120.0);
        assert!(timer.on_tick(handle).is_none());
        assert_eq!(timer.phase(), TimerPhase::Idle);
        assert_eq!(timer.elapsed_secs(), 0.0);
    }

    #[test]
    fn stale_tick_from_previous_session_is_dropped() {
        let (mut timer, clock, ticker) = setup();
        timer.start_pomodoro(60.0, "First");
        let old = ticker.armed().unwrap();
        timer.start_pomodoro(600.0, "Second");

        clock.advance_secs(61.0);
        assert!(timer.on_tick(old).is_none());
        assert_eq!(timer.phase(), TimerPhase::Running);
        assert_eq!(timer.title(), "Second");
    }

    #[test]
    fn pause_at_zero_completes_instead() {
        let (mut timer, clock, _ticker) = setup();
        timer.start_pomodoro(60.0, "Quick");
        clock.advance_secs(60.0);
        match timer.pause_current_timer() {
            Some(Event::CountdownCompleted {
                planned_duration_secs,
                ..
            }) => assert_eq!(planned_duration_secs, 60.0),
            other => panic!("expected completion, got {other:?}"),
        }
        assert_eq!(timer.phase(), TimerPhase::Idle);
    }

    #[test]
    fn restart_discards_previous_session() {
        let (mut timer, clock, _ticker) = setup();
        let (_, rx) = timer.subscribe_channel();

        timer.start_habit_timer("h1", "Read", "#FFAA00", None);
        clock.advance_secs(30.0);
        timer.start_task_timer("t1", "Inbox", "#6C5CE7");

        let events: Vec<Event> = rx.try_iter().collect();
        assert!(matches!(
            events[1],
            Event::SessionDiscarded { elapsed_secs, .. } if elapsed_secs == 30.0
        ));
        assert!(timer.is_timing(&SessionKind::Task {
            task_id: "t1".into()
        }));
        assert_eq!(timer.elapsed_secs(), 0.0);
    }

    #[test]
    fn broadcaster_follows_lifecycle() {
        let sink = RecordingSink::new();
        let clock = ManualClock::default();
        let mut timer = TimerCoordinator::new(clock.clone(), ManualTicker::new())
            .with_broadcaster(LiveStatusBroadcaster::new(Box::new(sink.clone())));

        timer.start_pomodoro(1500.0, "Focus");
        timer.pause_current_timer();
        timer.resume_timer();
        timer.add_one_minute();
        timer.stop_timer();

        let calls = sink.calls();
        assert!(matches!(calls.first(), Some(SinkCall::Begin(s)) if s.kind_label == "Pomodoro"));
        assert_eq!(sink.update_count(), 3);
        assert!(matches!(calls.last(), Some(SinkCall::End(s)) if !s.is_running));
        assert!(!timer.broadcaster().is_open());
    }

    #[test]
    fn broadcast_failure_does_not_affect_state() {
        let sink = RecordingSink::new();
        sink.fail_with("unsupported");
        let clock = ManualClock::default();
        let mut timer = TimerCoordinator::new(clock.clone(), ManualTicker::new())
            .with_broadcaster(LiveStatusBroadcaster::new(Box::new(sink.clone())));

        timer.start_pomodoro(60.0, "Quick");
        assert_eq!(timer.phase(), TimerPhase::Running);
        clock.advance_secs(30.0);
        timer.tick();
        assert_eq!(timer.remaining_secs(), 30.0);
        assert_eq!(timer.stop_timer(), 30.0);
        assert!(sink.calls().is_empty());
    }
}
