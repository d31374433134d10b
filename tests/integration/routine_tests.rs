//! Integration tests for the routine engine running on simulated time.

use relaynode::app::events::AppEvent;
use relaynode::config::ControllerConfig;
use relaynode::definitions::parse_document;
use relaynode::error::Error;
use relaynode::routine::{make_label, Routine};

use crate::mock_hw::{wait_until, Rig};

/// The completion event is emitted just after the run record is cleared.
fn wait_completed(rig: &Rig, runs: usize) {
    wait_until("routine completion", || {
        rig.sink
            .count(|e| matches!(e, AppEvent::RoutineCompleted { .. }))
            >= runs
    });
}

fn on_step(rig: &Rig, index: usize, channel: u8) -> bool {
    rig.service.routine_status().current_step == Some(index) && rig.relays.is_on(channel).unwrap()
}

#[test]
fn two_short_steps_finish_in_simulated_time() {
    let rig = Rig::new();
    rig.service
        .start_routine(Routine::new("pair").with_step(0, 5, "a").with_step(1, 5, "b"))
        .unwrap();
    wait_completed(&rig, 1);

    // 5 s + 500 ms settle + 5 s, plus at most a poll per step.
    let elapsed = rig.time.now_ms();
    assert!((10_000..=12_000).contains(&elapsed), "took {elapsed} ms");
    assert!(!rig.output.any_energized());
    assert!(rig.sink.contains(&AppEvent::RoutineCompleted {
        label: make_label("pair")
    }));
}

#[test]
fn events_follow_run_order() {
    let rig = Rig::new();
    rig.service
        .start_routine(Routine::new("r").with_step(2, 3, "a").with_step(3, 3, "b"))
        .unwrap();
    wait_completed(&rig, 1);

    let routine_events: Vec<AppEvent> = rig
        .sink
        .events()
        .into_iter()
        .filter(|e| !matches!(e, AppEvent::ChannelChanged { .. } | AppEvent::CutoffFired { .. }))
        .collect();
    assert_eq!(
        routine_events,
        vec![
            AppEvent::RoutineStarted {
                label: make_label("r"),
                steps: 2
            },
            AppEvent::StepStarted {
                index: 0,
                channel: 2,
                duration_secs: 3
            },
            AppEvent::StepStarted {
                index: 1,
                channel: 3,
                duration_secs: 3
            },
            AppEvent::RoutineCompleted {
                label: make_label("r")
            },
        ]
    );
}

#[test]
fn start_while_running_is_rejected() {
    let rig = Rig::new();
    rig.service
        .start_routine(Routine::new("A").with_step(0, 600, "long"))
        .unwrap();
    let second = rig
        .service
        .start_routine(Routine::new("B").with_step(1, 5, "short"));
    assert_eq!(second, Err(Error::RoutineAlreadyRunning));

    let status = rig.service.routine_status();
    assert!(status.running);
    assert_eq!(status.label.as_str(), "A");
    assert!(rig.sink.contains(&AppEvent::RoutineRejected {
        label: make_label("B")
    }));
    assert!(rig.service.stop_routine());
}

#[test]
fn skip_advances_exactly_one_step() {
    let rig = Rig::new();
    rig.service
        .start_routine(
            Routine::new("three")
                .with_step(0, 600, "a")
                .with_step(1, 600, "b")
                .with_step(2, 600, "c"),
        )
        .unwrap();
    wait_until("step 0", || on_step(&rig, 0, 0));

    assert!(rig.service.skip_step());
    wait_until("step 1", || on_step(&rig, 1, 1));

    assert!(!rig.relays.is_on(0).unwrap());
    assert!(!rig.output.level(0));
    let remaining = rig.relays.remaining_secs(1).unwrap();
    assert!(remaining >= 590, "step 1 lost time: {remaining}s left");

    let status = rig.service.routine_status();
    assert_eq!(status.steps[1].duration_secs, 600);
    assert_eq!(status.steps[2].duration_secs, 600);
    assert!(rig.sink.contains(&AppEvent::StepSkipped { index: 0 }));

    rig.service.stop_routine();
}

#[test]
fn skip_between_steps_ends_the_next_step() {
    let rig = Rig::with_config(ControllerConfig {
        settle_delay_ms: 20_000,
        ..ControllerConfig::default()
    });
    rig.service
        .start_routine(Routine::new("r").with_step(0, 1, "a").with_step(1, 600, "b"))
        .unwrap();
    // Step 0 ends at 1 s; the settle pause runs until about 21 s.
    wait_until("settle pause", || rig.time.now_ms() >= 3_000);
    let status = rig.service.routine_status();
    assert!(status.running);
    assert_eq!(status.current_step, Some(0));
    assert!(!rig.output.level(0));

    assert!(rig.service.skip_step());
    wait_until("routine completion", || !rig.service.routine_status().running);

    assert!(rig.time.now_ms() < 60_000, "step 1 ran its full duration");
    assert!(!rig.output.any_energized());
    assert!(rig.sink.contains(&AppEvent::StepSkipped { index: 1 }));
    assert!(!rig.sink.contains(&AppEvent::StepSkipped { index: 0 }));
}

#[test]
fn empty_routine_reports_start_before_completion() {
    let rig = Rig::new();
    rig.service.start_routine(Routine::new("none")).unwrap();
    wait_completed(&rig, 1);
    assert_eq!(
        rig.sink.events(),
        vec![
            AppEvent::RoutineStarted {
                label: make_label("none"),
                steps: 0
            },
            AppEvent::RoutineCompleted {
                label: make_label("none")
            },
        ]
    );
}

#[test]
fn stop_turns_every_channel_off() {
    let rig = Rig::new();
    rig.service.turn_on(3).unwrap();
    rig.service
        .start_routine(Routine::new("pair").with_step(0, 600, "a").with_step(2, 600, "b"))
        .unwrap();
    wait_until("step 0", || on_step(&rig, 0, 0));

    assert!(rig.service.stop_routine());
    assert!(!rig.output.any_energized());
    let status = rig.service.routine_status();
    assert!(!status.running);
    assert_eq!(status.current_step, None);

    // Nothing runs after stop returns.
    let writes = rig.output.write_count();
    rig.time.advance_secs(700);
    std::thread::sleep(std::time::Duration::from_millis(20));
    assert_eq!(rig.output.write_count(), writes);
    assert!(rig.relays.snapshot().iter().all(|s| !s.energized));
    assert!(rig.sink.contains(&AppEvent::RoutineStopped {
        label: make_label("pair")
    }));
}

#[test]
fn external_off_ends_the_step_early() {
    let rig = Rig::new();
    rig.service
        .start_routine(Routine::new("r").with_step(0, 600, "a").with_step(1, 600, "b"))
        .unwrap();
    wait_until("step 0", || on_step(&rig, 0, 0));

    rig.service.turn_off(0).unwrap();
    wait_until("step 1", || on_step(&rig, 1, 1));
    rig.service.stop_routine();
}

#[test]
fn step_still_on_past_its_margin_is_forced_off() {
    let rig = Rig::new();
    rig.service
        .start_routine(Routine::new("r").with_step(0, 60, "a").with_step(1, 600, "b"))
        .unwrap();
    wait_until("step 0", || on_step(&rig, 0, 0));

    // Re-energise manually: the channel's own timer now runs for 20 min,
    // but the step gives up after its duration plus the margin.
    rig.service.turn_on(0).unwrap();
    wait_until("step 1", || on_step(&rig, 1, 1));

    assert!(!rig.relays.is_on(0).unwrap());
    assert!(rig.time.now_ms() < 120_000);
    rig.service.stop_routine();
}

#[test]
fn routine_can_restart_after_completion() {
    let rig = Rig::new();
    for run in 1..=3 {
        rig.service
            .start_routine(Routine::new("again").with_step(1, 1, "x"))
            .unwrap();
        wait_completed(&rig, run);
    }
    let completed = rig
        .sink
        .count(|e| matches!(e, AppEvent::RoutineCompleted { .. }));
    assert_eq!(completed, 3);
}

#[test]
fn stored_document_drives_a_run() {
    let rig = Rig::new();
    let doc = parse_document(
        r#"[
            { "name": "Evening", "steps": [
                { "id": 1, "name": "Beds", "duration": 1, "order": 1 },
                { "id": 0, "name": "Lawn", "duration": 1, "order": 0 },
                { "id": 2, "name": "Off", "duration": 9, "order": 2, "enabled": false }
            ] }
        ]"#,
    )
    .unwrap();

    rig.service.start_routine_from_document(&doc, 0).unwrap();
    let status = rig.service.routine_status();
    assert_eq!(status.steps.len(), 2);
    assert_eq!(status.steps[0].channel_id, 0);
    assert_eq!(status.steps[0].duration_minutes, 1);

    wait_until("completion", || !rig.service.routine_status().running);
    let elapsed = rig.time.now_ms();
    assert!((120_000..=122_000).contains(&elapsed), "took {elapsed} ms");
    assert_eq!(
        rig.service.start_routine_from_document(&doc, 1),
        Err(Error::Definition("routine index out of range"))
    );
}

#[test]
fn manual_commands_work_alongside_a_routine() {
    let rig = Rig::new();
    rig.service
        .start_routine(Routine::new("r").with_step(0, 600, "a"))
        .unwrap();
    wait_until("step 0", || on_step(&rig, 0, 0));

    rig.service.turn_on_timed(2, 30).unwrap();
    assert!(rig.relays.is_on(2).unwrap());
    assert!(rig.relays.is_on(0).unwrap());
    rig.service.stop_routine();
    assert!(!rig.output.any_energized());
}
