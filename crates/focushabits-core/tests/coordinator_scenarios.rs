//! End-to-end behavior of the timer coordinator on a virtual clock.

use focushabits_core::live::{LiveStatusBroadcaster, RecordingSink};
use focushabits_core::timer::{ManualClock, ManualTicker, SessionKind, TimerCoordinator, TimerPhase};
use focushabits_core::Event;
use proptest::prelude::*;

fn setup() -> (TimerCoordinator, ManualClock, ManualTicker) {
    let clock = ManualClock::default();
    let ticker = ManualTicker::new();
    let timer = TimerCoordinator::new(clock.clone(), ticker.clone());
    (timer, clock, ticker)
}

fn setup_with_sink() -> (TimerCoordinator, ManualClock, ManualTicker, RecordingSink) {
    let (timer, clock, ticker) = setup();
    let sink = RecordingSink::new();
    let timer = timer.with_broadcaster(LiveStatusBroadcaster::new(Box::new(sink.clone())));
    (timer, clock, ticker, sink)
}

/// Deliver a tick from whatever the coordinator currently has armed.
fn fire(timer: &mut TimerCoordinator, ticker: &ManualTicker) -> Option<Event> {
    let handle = ticker.armed()?;
    timer.on_tick(handle)
}

fn completions(events: &std::sync::mpsc::Receiver<Event>) -> usize {
    events
        .try_iter()
        .filter(|e| matches!(e, Event::CountdownCompleted { .. }))
        .count()
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn immediate_stop_returns_under_a_second() {
    let (mut timer, _clock, ticker) = setup();
    timer.start_pomodoro(1500.0, "Focus");

    let elapsed = timer.stop_timer();
    assert!((0.0..1.0).contains(&elapsed));
    assert_eq!(timer.phase(), TimerPhase::Idle);
    assert!(ticker.armed().is_none());
}

#[test]
fn habit_timer_runs_past_its_target() {
    let (mut timer, clock, ticker) = setup();
    let (_, events) = timer.subscribe_channel();
    timer.start_habit_timer("h1", "Read", "#FFAA00", Some(600.0));

    for _ in 0..65 {
        clock.advance_secs(10.0);
        assert!(fire(&mut timer, &ticker).is_none());
    }

    assert_eq!(timer.phase(), TimerPhase::Running);
    assert!((timer.elapsed_secs() - 650.0).abs() < 1e-6);
    assert!(timer.remaining_secs() > 0.0);
    assert!(!timer.is_countdown_mode());
    assert_eq!(timer.progress(), 1.0);
    assert_eq!(completions(&events), 0);
}

#[test]
fn short_pomodoro_completes_once() {
    let (mut timer, clock, ticker) = setup();
    let (_, events) = timer.subscribe_channel();
    timer.start_pomodoro(60.0, "Quick");

    clock.advance_secs(61.0);
    let event = fire(&mut timer, &ticker);
    match event {
        Some(Event::CountdownCompleted {
            planned_duration_secs,
            elapsed_secs,
            ref title,
            ..
        }) => {
            assert_eq!(planned_duration_secs, 60.0);
            assert_eq!(elapsed_secs, 60.0);
            assert_eq!(title, "Quick");
        }
        other => panic!("expected completion, got {other:?}"),
    }
    assert_eq!(timer.phase(), TimerPhase::Idle);

    // later ticks and stops do nothing
    clock.advance_secs(5.0);
    assert!(timer.tick().is_none());
    assert_eq!(timer.stop_timer(), 0.0);
    assert_eq!(completions(&events), 1);
}

#[test]
fn add_one_minute_caps_at_one_hour() {
    let (mut timer, _clock, _ticker) = setup();
    timer.start_pomodoro(55.0 * 60.0, "Long");

    assert_eq!(timer.add_one_minute(), 60.0);
    assert_eq!(timer.target_duration_secs(), 3360.0);

    // 56 minutes now; keep extending until the cap
    for _ in 0..4 {
        timer.add_one_minute();
    }
    assert_eq!(timer.target_duration_secs(), 3600.0);
    let remaining = timer.remaining_secs();
    assert_eq!(timer.add_one_minute(), 0.0);
    assert_eq!(timer.target_duration_secs(), 3600.0);
    assert_eq!(timer.remaining_secs(), remaining);
}

#[test]
fn add_one_minute_applies_partial_delta() {
    let (mut timer, clock, ticker) = setup();
    timer.start_pomodoro(3570.0, "Almost");
    clock.advance_secs(100.0);
    fire(&mut timer, &ticker);
    let before = timer.remaining_secs();

    let added = timer.add_one_minute();
    assert_eq!(added, 30.0);
    assert_eq!(timer.target_duration_secs(), 3600.0);
    assert!((timer.remaining_secs() - (before + 30.0)).abs() < 1e-9);
}

#[test]
fn paused_time_is_not_counted() {
    let (mut timer, clock, ticker) = setup();
    timer.start_task_timer("t1", "Refactor", "#6C5CE7");

    clock.advance_secs(30.0);
    timer.pause_current_timer();
    clock.advance_secs(3600.0);
    assert!(fire(&mut timer, &ticker).is_none());
    assert_eq!(timer.elapsed_secs(), 30.0);

    timer.resume_timer();
    clock.advance_secs(45.0);
    fire(&mut timer, &ticker);
    assert!((timer.elapsed_secs() - 75.0).abs() < 1e-6);
    assert!((timer.stop_timer() - 75.0).abs() < 1e-6);
}

#[test]
fn restart_discards_previous_session() {
    let (mut timer, clock, ticker, sink) = setup_with_sink();
    let (_, events) = timer.subscribe_channel();

    timer.start_habit_timer("h1", "Read", "#FFAA00", Some(600.0));
    let first = ticker.armed();
    clock.advance_secs(120.0);
    timer.start_task_timer("t1", "Write", "#6C5CE7");

    assert_eq!(
        timer.kind(),
        Some(&SessionKind::Task {
            task_id: "t1".into()
        })
    );
    assert_eq!(timer.elapsed_secs(), 0.0);
    assert_ne!(ticker.armed(), first);
    assert_eq!(sink.open_channels(), 1);

    // a tick from the first session's schedule is ignored
    clock.advance_secs(10.0);
    assert!(timer.on_tick(first.unwrap()).is_none());
    assert_eq!(timer.elapsed_secs(), 0.0);

    let names: Vec<&str> = events.try_iter().map(|e| e.name()).collect();
    assert_eq!(
        names,
        vec!["timer_started", "session_discarded", "timer_started"]
    );
}

#[test]
fn live_status_follows_the_session() {
    let (mut timer, clock, ticker, sink) = setup_with_sink();
    timer.start_pomodoro(300.0, "Focus");
    assert_eq!(sink.open_channels(), 1);

    for _ in 0..50 {
        clock.advance_secs(0.1);
        fire(&mut timer, &ticker);
    }
    // five seconds of ticks at 100 ms, throttled to roughly one update a second
    assert!(sink.update_count() <= 6);

    sink.fail_with("widget gone");
    timer.pause_current_timer();
    assert_eq!(timer.phase(), TimerPhase::Paused);
    sink.recover();

    timer.stop_timer();
    assert_eq!(sink.open_channels(), 0);
}

// ============================================================================
// Properties
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    StartHabit(u8),
    StartTask(u8),
    StartPomodoro(u16),
    Pause,
    Resume,
    Toggle,
    Stop,
    AddMinute,
    Advance(u16),
    Tick,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..3).prop_map(Op::StartHabit),
        (0u8..3).prop_map(Op::StartTask),
        (1u16..3600).prop_map(Op::StartPomodoro),
        Just(Op::Pause),
        Just(Op::Resume),
        Just(Op::Toggle),
        Just(Op::Stop),
        Just(Op::AddMinute),
        (0u16..900).prop_map(Op::Advance),
        Just(Op::Tick),
    ]
}

proptest! {
    #[test]
    fn at_most_one_session_is_active(ops in prop::collection::vec(op(), 1..60)) {
        let (mut timer, clock, ticker, sink) = setup_with_sink();

        for op in ops {
            match op {
                Op::StartHabit(n) => {
                    timer.start_habit_timer(format!("h{n}"), "Habit", "#FFAA00", Some(600.0));
                    let kind = SessionKind::Habit { habit_id: format!("h{n}") };
                    prop_assert_eq!(timer.kind(), Some(&kind));
                    prop_assert_eq!(timer.elapsed_secs(), 0.0);
                }
                Op::StartTask(n) => {
                    timer.start_task_timer(format!("t{n}"), "Task", "#6C5CE7");
                    let kind = SessionKind::Task { task_id: format!("t{n}") };
                    prop_assert_eq!(timer.kind(), Some(&kind));
                }
                Op::StartPomodoro(secs) => {
                    timer.start_pomodoro(f64::from(secs), "Focus");
                    prop_assert_eq!(timer.kind(), Some(&SessionKind::Pomodoro));
                    prop_assert_eq!(timer.phase(), TimerPhase::Running);
                }
                Op::Pause => { timer.pause_current_timer(); }
                Op::Resume => { timer.resume_timer(); }
                Op::Toggle => { timer.toggle_play_pause(); }
                Op::Stop => { timer.stop_timer(); }
                Op::AddMinute => { timer.add_one_minute(); }
                Op::Advance(secs) => clock.advance_secs(f64::from(secs)),
                Op::Tick => { fire(&mut timer, &ticker); }
            }

            let phase = timer.phase();
            prop_assert_eq!(phase == TimerPhase::Idle, timer.kind().is_none());
            prop_assert_eq!(phase == TimerPhase::Running, ticker.armed().is_some());
            prop_assert_eq!(ticker.armed(), timer.tick_handle());
            prop_assert!(sink.open_channels() <= 1);
            prop_assert_eq!(sink.open_channels() == 1, phase.is_active());
            prop_assert!(timer.remaining_secs() >= 0.0);
            prop_assert!(timer.target_duration_secs() <= 3600.0);
        }
    }

    #[test]
    fn countdown_never_increases_and_completes_once(
        target in 1u16..1200,
        steps in prop::collection::vec(0u16..120, 1..80),
    ) {
        let (mut timer, clock, ticker) = setup();
        let (_, events) = timer.subscribe_channel();
        timer.start_pomodoro(f64::from(target), "Focus");

        let mut last_remaining = timer.remaining_secs();
        let mut advanced = 0.0;
        for step in steps {
            clock.advance_secs(f64::from(step));
            advanced += f64::from(step);
            let event = fire(&mut timer, &ticker);

            if timer.phase() == TimerPhase::Running {
                let remaining = timer.remaining_secs();
                prop_assert!(remaining <= last_remaining);
                prop_assert!(remaining > 0.0);
                last_remaining = remaining;
            } else if let Some(Event::CountdownCompleted { elapsed_secs, .. }) = event {
                prop_assert_eq!(elapsed_secs, f64::from(target));
            }
        }

        let expected = usize::from(advanced >= f64::from(target));
        prop_assert_eq!(completions(&events), expected);
    }

    #[test]
    fn pause_resume_accounting(a in 0u16..3000, paused in 0u32..100_000, b in 0u16..3000) {
        let (mut timer, clock, ticker) = setup();
        timer.start_habit_timer("h1", "Read", "#FFAA00", None);

        clock.advance_secs(f64::from(a));
        timer.pause_current_timer();
        clock.advance_secs(f64::from(paused));
        timer.resume_timer();
        clock.advance_secs(f64::from(b));
        fire(&mut timer, &ticker);

        prop_assert!((timer.elapsed_secs() - f64::from(a + b)).abs() < 1e-3);
    }
}
