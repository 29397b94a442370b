mod clock;
mod coordinator;
mod format;
mod session;
mod ticker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::{CoordinatorConfig, TimerCoordinator, POMODORO_COLOR};
pub use format::{format_clock, format_duration_short};
pub use session::{SessionKind, SessionState, TimerPhase};
pub use ticker::{ManualTicker, TickHandle, TickScheduler, TokioTicker};
