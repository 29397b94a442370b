//! # FocusHabits Core Library
//!
//! Core logic of FocusHabits, a habit tracker with a task list and a Pomodoro
//! timer. A standalone CLI binary drives everything through this library.
//!
//! ## Architecture
//!
//! - **Timer Coordinator**: a single wall-clock-based session state machine
//!   shared by habit timers, task timers and Pomodoro countdowns. Time and
//!   ticks are injected, so the coordinator never sleeps or does I/O.
//! - **Live Status**: best-effort mirroring of the active session to an
//!   always-visible surface
//! - **Storage**: SQLite for sessions, habits and tasks; TOML configuration
//!
//! ## Key Components
//!
//! - [`TimerCoordinator`]: the session state machine
//! - [`LiveStatusBroadcaster`]: live status channel lifecycle
//! - [`Database`]: persistence and statistics
//! - [`Config`]: application configuration management

pub mod error;
pub mod events;
pub mod habit;
pub mod live;
pub mod recorder;
pub mod storage;
pub mod task;
pub mod timer;

pub use error::{BroadcastError, ConfigError, CoreError, DatabaseError, ValidationError};
pub use events::{Event, EventBus, SubscriptionId};
pub use habit::{Habit, HabitLog, HabitStats, HabitUnit};
pub use live::{LiveSnapshot, LiveStatusBroadcaster, LiveStatusSink, StatusFileSink};
pub use recorder::{SessionRecord, SessionRecorder, SessionStatus, StopOutcome};
pub use storage::{Config, Database};
pub use task::{Task, TaskPriority};
pub use timer::{
    Clock, SessionKind, SessionState, SystemClock, TickHandle, TickScheduler, TimerCoordinator,
    TimerPhase, TokioTicker,
};
