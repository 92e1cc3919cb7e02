//! End-to-end playback against a headless host.

mod common;

use common::{click_events, host, host_with_button, init_tracing, settings};
use rewind_core::{Component, ElementSpec, Point, Rect, SceneGraph};
use rewind_recorder::replay::DragInterpolator;
use rewind_recorder::{
    EventOrigin, EventType, LogLevel, RecordingData, RecordingEngine, RecordingError, SyntheticEvent,
    TouchData, UnresolvedPolicy, PLAYBACK_COMPLETE_SIGNAL, SEGMENT_COMPLETE_SIGNAL,
};
use std::cell::RefCell;
use std::rc::Rc;

fn marker(time_delta: f64) -> TouchData {
    TouchData::marker(time_delta, "Main")
}

fn positional(event_type: EventType, x: f32, y: f32, time_delta: f64) -> TouchData {
    let mut td = TouchData::pointer(event_type, 0, Point::new(x, y), time_delta);
    td.scene = "Main".to_string();
    td
}

#[test]
fn test_click_replays_on_named_button() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let (mut host, _) = host_with_button(Rect::new(350.0, 250.0, 100.0, 100.0));
    let mut engine = RecordingEngine::new(settings(dir.path()));

    let data = RecordingData::from_events("Main", click_events());
    engine.begin_playback_data(data, dir.path(), &host).unwrap();

    let update = engine.tick(&host, 0.1);
    host.dispatch(&update);

    assert_eq!(update.events.len(), 2);
    assert!(matches!(update.events[0], SyntheticEvent::Press { .. }));
    assert!(matches!(update.events[1], SyntheticEvent::Release { .. }));
    assert_eq!(update.events[0].position(), Some(Point::new(400.0, 300.0)));
    assert!(update.completed);
    assert!(engine.is_playback_completed());
    assert_eq!(host.click_count("Btn"), 1);
    assert!(!engine.log().has_errors());

    let report = engine.report("click");
    assert!(report.passed());
    assert_eq!(report.steps.len(), 2);
    assert_eq!(report.steps[0].name, "Btn");
    assert_eq!(report.steps[0].hierarchy, "Canvas");
}

#[test]
fn test_moved_button_is_still_clicked() {
    let dir = tempfile::tempdir().unwrap();
    // Recorded at the center, replayed against a button in the corner
    let (mut host, _) = host_with_button(Rect::new(20.0, 20.0, 60.0, 40.0));
    let mut engine = RecordingEngine::new(settings(dir.path()));

    let data = RecordingData::from_events("Main", click_events());
    engine.begin_playback_data(data, dir.path(), &host).unwrap();
    let update = engine.tick(&host, 0.1);
    host.dispatch(&update);

    assert_eq!(update.events[0].position(), Some(Point::new(50.0, 40.0)));
    assert_eq!(host.click_count("Btn"), 1);
}

#[test]
fn test_events_wait_for_their_time_delta() {
    let dir = tempfile::tempdir().unwrap();
    let (host, _) = host();
    let mut engine = RecordingEngine::new(settings(dir.path()));

    let data = RecordingData::from_events(
        "Main",
        vec![
            positional(EventType::Press, 0.25, 0.25, 0.5),
            positional(EventType::Release, 0.25, 0.25, 0.5),
        ],
    );
    engine.begin_playback_data(data, dir.path(), &host).unwrap();

    for _ in 0..4 {
        assert!(!engine.tick(&host, 0.1).has_events());
    }
    engine.tick(&host, 0.2);
    assert_eq!(engine.cursor(), 1);
    for _ in 0..3 {
        engine.tick(&host, 0.1);
    }
    assert_eq!(engine.cursor(), 1);
    assert!(engine.tick(&host, 0.2).completed);
}

#[test]
fn test_wait_signal_pauses_and_excludes_waiting_time() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let (host, _) = host();
    let mut engine = RecordingEngine::new(settings(dir.path()));

    let data = RecordingData::from_events(
        "Main",
        vec![
            marker(0.0).with_wait_signal("s1"),
            positional(EventType::Press, 0.25, 0.25, 1.0),
            positional(EventType::Release, 0.25, 0.25, 0.0),
        ],
    );
    engine.begin_playback_data(data, dir.path(), &host).unwrap();

    for _ in 0..50 {
        engine.tick(&host, 0.1);
    }
    assert_eq!(engine.cursor(), 1);
    assert!(engine.is_waiting());
    assert!(engine.is_pending("s1"));

    assert!(engine.send_signal("s1"));
    assert!(!engine.send_signal("s1"));
    assert!(!engine.is_waiting());

    // The five seconds spent waiting do not count towards the next delta
    for _ in 0..8 {
        engine.tick(&host, 0.1);
    }
    assert_eq!(engine.cursor(), 1);
    engine.tick(&host, 0.1);
    engine.tick(&host, 0.1);
    assert!(engine.is_playback_completed());
}

#[test]
fn test_signal_handle_requests_apply_on_next_tick() {
    let dir = tempfile::tempdir().unwrap();
    let (host, _) = host();
    let mut engine = RecordingEngine::new(settings(dir.path()));
    let handle = engine.signal_handle();

    let data = RecordingData::from_events(
        "Main",
        vec![
            positional(EventType::Press, 0.5, 0.5, 0.0),
            positional(EventType::Release, 0.5, 0.5, 0.3),
        ],
    );
    engine.begin_playback_data(data, dir.path(), &host).unwrap();

    engine.tick(&host, 0.1);
    assert_eq!(engine.cursor(), 1);

    handle.pause("loaded");
    assert!(!engine.is_waiting());
    for _ in 0..10 {
        engine.tick(&host, 0.1);
    }
    assert!(engine.is_pending("loaded"));
    assert_eq!(engine.cursor(), 1);

    handle.send_signal("loaded");
    engine.tick(&host, 0.1);
    assert!(!engine.is_waiting());
    assert_eq!(engine.cursor(), 1);
    for _ in 0..3 {
        engine.tick(&host, 0.1);
    }
    assert!(engine.is_playback_completed());
}

#[test]
fn test_emitted_signals_reach_listeners() {
    let dir = tempfile::tempdir().unwrap();
    let (host, _) = host();
    let mut engine = RecordingEngine::new(settings(dir.path()));

    let heard = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&heard);
    engine.on_signal(move |signal| sink.borrow_mut().push(signal.to_string()));

    let mut data = RecordingData::from_events(
        "Main",
        vec![marker(0.1).with_emit_signal("menu_open")],
    );
    data.add_playback_complete(0.1, "Main");
    engine.begin_playback_data(data, dir.path(), &host).unwrap();

    let first = engine.tick(&host, 0.1);
    assert_eq!(first.emitted_signals, vec!["menu_open".to_string()]);
    engine.tick(&host, 0.15);

    assert_eq!(
        *heard.borrow(),
        vec!["menu_open".to_string(), PLAYBACK_COMPLETE_SIGNAL.to_string()]
    );
    assert!(engine.has_emitted(PLAYBACK_COMPLETE_SIGNAL));
}

#[test]
fn test_composite_recording_plays_segments_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let (host, _) = host();

    for (name, x) in [("seg1.json", 0.2), ("seg2.json", 0.8)] {
        let mut segment = RecordingData::from_events(
            "Main",
            vec![
                positional(EventType::Press, x, 0.5, 0.1),
                positional(EventType::Release, x, 0.5, 0.1),
            ],
        );
        segment.add_playback_complete(0.1, "Main");
        segment.save(dir.path().join(name)).unwrap();
    }
    let mut root = RecordingData::new("Main");
    root.add_segment("seg1.json");
    root.add_segment("seg2.json");
    root.add_playback_complete(0.1, "Main");
    let root_path = dir.path().join("root.json");
    root.save(&root_path).unwrap();

    let mut engine = RecordingEngine::new(settings(dir.path()));
    engine.begin_playback(&root_path, &host).unwrap();
    assert_eq!(engine.stream().len(), 7);

    let mut presses = Vec::new();
    for _ in 0..20 {
        let update = engine.tick(&host, 0.1);
        presses.extend(
            update
                .events
                .iter()
                .filter(|e| matches!(e, SyntheticEvent::Press { .. }))
                .filter_map(SyntheticEvent::position),
        );
    }

    assert!(engine.is_playback_completed());
    assert_eq!(presses, vec![Point::new(160.0, 300.0), Point::new(640.0, 300.0)]);
    assert_eq!(
        engine.emitted_signals(),
        [
            SEGMENT_COMPLETE_SIGNAL.to_string(),
            SEGMENT_COMPLETE_SIGNAL.to_string(),
            PLAYBACK_COMPLETE_SIGNAL.to_string(),
        ]
    );
}

#[test]
fn test_circular_segments_refuse_to_play() {
    let dir = tempfile::tempdir().unwrap();
    let (host, _) = host();

    let mut a = RecordingData::new("Main");
    a.add_segment("b.json");
    a.save(dir.path().join("a.json")).unwrap();
    let mut b = RecordingData::new("Main");
    b.add_segment("a.json");
    b.save(dir.path().join("b.json")).unwrap();

    let mut engine = RecordingEngine::new(settings(dir.path()));
    let err = engine.begin_playback(dir.path().join("a.json"), &host).unwrap_err();
    assert!(matches!(err, RecordingError::CircularReference { .. }));
    assert!(err.is_fatal());
    assert!(engine.stream().is_empty());
}

#[test]
fn test_unresolved_object_logs_error_and_advances() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let (mut host, _) = host();
    let mut engine = RecordingEngine::new(settings(dir.path()));

    let events = click_events()
        .into_iter()
        .map(|td| td.with_object("Ghost", "", "Canvas"))
        .collect();
    engine
        .begin_playback_data(RecordingData::from_events("Main", events), dir.path(), &host)
        .unwrap();
    let update = engine.tick(&host, 0.1);
    host.dispatch(&update);

    assert!(engine.is_playback_completed());
    assert!(engine.log().has_errors());
    // Falls back to the recorded position
    assert_eq!(update.events[0].position(), Some(Point::new(400.0, 300.0)));
    assert!(!engine.report("ghost").passed());
}

#[test]
fn test_unresolved_object_can_be_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let (host, _) = host();
    let mut settings = settings(dir.path());
    settings.unresolved_policy = UnresolvedPolicy::SkipEvent;
    let mut engine = RecordingEngine::new(settings);

    let events = click_events()
        .into_iter()
        .map(|td| td.with_object("Ghost", "", "Canvas"))
        .collect();
    engine
        .begin_playback_data(RecordingData::from_events("Main", events), dir.path(), &host)
        .unwrap();
    let update = engine.tick(&host, 0.1);

    assert!(engine.is_playback_completed());
    assert!(engine.log().has_errors());
    assert!(!update
        .events
        .iter()
        .any(|e| matches!(e, SyntheticEvent::Press { .. })));
}

#[test]
fn test_drag_expands_into_samples_ending_on_release() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let (mut host, canvas) = host();
    host.tree_mut()
        .add_child(
            canvas,
            ElementSpec::new("Handle")
                .rect(Rect::new(100.0, 100.0, 50.0, 50.0))
                .component(Component::DragHandler),
        )
        .unwrap();

    let mut press = positional(EventType::Press, 0.0, 0.0, 0.0).with_object("Handle", "", "Canvas");
    press.pointer_id = 0;
    let drag = TouchData {
        event_type: EventType::Drag,
        ..press.clone()
    };
    let release = positional(EventType::Release, 0.5, 0.5, 1.0);

    let mut engine = RecordingEngine::new(settings(dir.path()));
    engine
        .begin_playback_data(
            RecordingData::from_events("Main", vec![press, drag, release]),
            dir.path(),
            &host,
        )
        .unwrap();

    for _ in 0..60 {
        let update = engine.tick(&host, 0.05);
        host.dispatch(&update);
        if engine.is_playback_completed() {
            break;
        }
    }
    assert!(engine.is_playback_completed());

    let samples = DragInterpolator::default().sample_count(1.0);
    assert_eq!(engine.stream().len(), 3 + samples);
    let interpolated: Vec<_> = engine
        .stream()
        .iter()
        .filter(|e| e.origin == EventOrigin::Interpolated)
        .collect();
    assert_eq!(interpolated.len(), samples);
    let total: f64 = interpolated.iter().map(|e| e.data.time_delta).sum();
    assert!((total - 1.0).abs() < 1e-9);
    assert_eq!(engine.stream().last().map(|e| e.data.time_delta), Some(0.0));
    assert_eq!(engine.stream().recorded_touch_data().len(), 3);

    let drags: Vec<_> = host
        .dispatched()
        .iter()
        .filter(|e| matches!(e, SyntheticEvent::Drag { .. }))
        .collect();
    assert_eq!(drags.len(), samples + 1);
    let last = drags.last().and_then(|e| e.position()).unwrap();
    assert!(last.distance(Point::new(400.0, 300.0)) < 0.01);

    let handle = host.tree().find_by_name("Handle").unwrap();
    let center = host.tree().ui_rect(handle).unwrap().center();
    assert!(center.distance(Point::new(400.0, 300.0)) < 0.01);
    // Interpolated samples are not steps
    assert_eq!(engine.steps().len(), 3);
}

#[test]
fn test_entry_scene_gate_waits_for_scene() {
    let dir = tempfile::tempdir().unwrap();
    let (mut host, _) = host();
    host.load_scene("Loading");
    let mut engine = RecordingEngine::new(settings(dir.path()));

    let events = vec![positional(EventType::Press, 0.5, 0.5, 0.0)];
    engine
        .begin_playback_data(RecordingData::from_events("Main", events), dir.path(), &host)
        .unwrap();
    for _ in 0..5 {
        engine.tick(&host, 0.1);
    }
    assert_eq!(engine.cursor(), 0);

    host.load_scene("Main");
    engine.tick(&host, 0.1);
    assert_eq!(engine.cursor(), 1);
}

#[test]
fn test_overlapping_pauses_wait_from_the_first() {
    let dir = tempfile::tempdir().unwrap();
    let (host, _) = host();
    let mut engine = RecordingEngine::new(settings(dir.path()));

    let data = RecordingData::from_events(
        "Main",
        vec![
            marker(0.0).with_wait_signal("s1"),
            positional(EventType::Press, 0.25, 0.25, 1.0),
        ],
    );
    engine.begin_playback_data(data, dir.path(), &host).unwrap();
    engine.tick(&host, 0.25);
    assert!(engine.is_pending("s1"));
    let wait_start = engine.elapsed();

    for _ in 0..8 {
        engine.tick(&host, 0.25);
    }
    engine.pause("s2");
    for _ in 0..8 {
        engine.tick(&host, 0.25);
    }
    assert!(engine.send_signal("s2"));
    assert!(engine.is_waiting());
    assert!(engine.send_signal("s1"));

    // Neither wait counts towards the next delta
    assert!((engine.elapsed() - wait_start).abs() < 1e-9);
    assert_eq!(engine.cursor(), 1);
}

#[test]
fn test_drag_release_still_reports_hierarchy_drift() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let (mut host, canvas) = host();
    host.tree_mut()
        .add_child(
            canvas,
            ElementSpec::new("Handle")
                .rect(Rect::new(100.0, 100.0, 50.0, 50.0))
                .component(Component::DragHandler),
        )
        .unwrap();
    host.tree_mut()
        .add_child(canvas, ElementSpec::new("Drop").rect(Rect::new(500.0, 300.0, 100.0, 100.0)))
        .unwrap();

    let press = positional(EventType::Press, 0.0, 0.0, 0.0).with_object("Handle", "", "Canvas");
    let drag = TouchData {
        event_type: EventType::Drag,
        ..press.clone()
    };
    let release =
        positional(EventType::Release, 0.0, 0.0, 0.5).with_object("Drop", "", "OldCanvas");

    let mut engine = RecordingEngine::new(settings(dir.path()));
    engine
        .begin_playback_data(
            RecordingData::from_events("Main", vec![press, drag, release]),
            dir.path(),
            &host,
        )
        .unwrap();
    for _ in 0..40 {
        let update = engine.tick(&host, 0.05);
        host.dispatch(&update);
        if engine.is_playback_completed() {
            break;
        }
    }
    assert!(engine.is_playback_completed());

    let drags: Vec<_> = host
        .dispatched()
        .iter()
        .filter(|e| matches!(e, SyntheticEvent::Drag { .. }))
        .collect();
    let last = drags.last().and_then(|e| e.position()).unwrap();
    assert!(last.distance(Point::new(550.0, 350.0)) < 0.01);

    let warnings: Vec<_> = engine
        .log()
        .entries()
        .into_iter()
        .filter(|entry| entry.level == LogLevel::Warning)
        .collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("Drop"));
    assert!(warnings[0].message.contains("OldCanvas"));
}
