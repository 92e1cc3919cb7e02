//! Recording sessions, extension and the persisted working copy.

mod common;

use common::{click_events, host_with_button, init_tracing, settings};
use rewind_core::{Point, Rect};
use rewind_recorder::testing::{HeadlessHost, RecordedTestRegistry, TestConfig, TestRunner};
use rewind_recorder::{
    EventType, PersistentData, RecordingData, RecordingEngine, RecordingMode, RecordingType,
    TouchData, PLAYBACK_COMPLETE_SIGNAL,
};

#[test]
fn test_recorded_click_replays_on_moved_button() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let (mut host, _) = host_with_button(Rect::new(350.0, 250.0, 100.0, 100.0));
    let mut engine = RecordingEngine::new(settings(dir.path()));

    engine.begin_recording(&host);
    assert_eq!(engine.mode(), RecordingMode::Record);

    engine.tick(&host, 0.5);
    let press = host.real_pointer(-1, EventType::Press, Point::new(400.0, 300.0));
    engine.record_pointer(&host, press);
    engine.tick(&host, 0.2);
    let release = host.real_pointer(-1, EventType::Release, Point::new(400.0, 300.0));
    engine.record_pointer(&host, release);
    engine.record_key(&host, "Escape", true);
    engine.tick(&host, 0.3);

    let path = engine.finish(&host).unwrap().unwrap();
    assert_eq!(engine.mode(), RecordingMode::None);
    assert_eq!(path, engine.persistence().recording_path());

    let saved = RecordingData::load(&path).unwrap();
    assert_eq!(saved.entry_scene, "Main");
    assert_eq!(saved.recorded_aspect_ratio, Point::new(800.0, 600.0));
    assert!(saved.ends_with_playback_complete());
    assert_eq!(saved.touch_data.len(), 4);

    let press = &saved.touch_data[0];
    assert_eq!(press.event_type, EventType::Press);
    assert!(!press.positional);
    assert_eq!(press.object_name, "Btn");
    assert_eq!(press.object_hierarchy, "Canvas");
    assert_eq!(press.object_offset, Point::ZERO);
    assert!((press.time_delta - 0.5).abs() < 1e-9);

    let release = &saved.touch_data[1];
    assert_eq!(release.event_type, EventType::Release);
    assert_eq!(release.object_name, "Btn");
    assert!((release.time_delta - 0.2).abs() < 1e-9);
    assert_eq!(saved.touch_data[2].key_code, "Escape");
    assert!((saved.touch_data[3].time_delta - 0.3).abs() < 1e-9);

    // Replay against a layout where the button moved
    let (mut moved, _) = host_with_button(Rect::new(40.0, 400.0, 120.0, 60.0));
    let mut replay = RecordingEngine::new(settings(dir.path()));
    replay.begin_playback(&path, &moved).unwrap();
    for _ in 0..20 {
        let update = replay.tick(&moved, 0.1);
        moved.dispatch(&update);
    }
    assert!(replay.is_playback_completed());
    assert_eq!(moved.click_count("Btn"), 1);
    assert!(moved.is_key_down("Escape"));
    assert!(!replay.log().has_errors());
}

#[test]
fn test_only_first_drag_of_gesture_is_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let (mut host, _) = host_with_button(Rect::new(350.0, 250.0, 100.0, 100.0));
    let mut engine = RecordingEngine::new(settings(dir.path()));
    engine.begin_recording(&host);

    let mut recorded = 0;
    for (event_type, x) in [
        (EventType::Press, 400.0),
        (EventType::Drag, 410.0),
        (EventType::Drag, 420.0),
        (EventType::Drag, 430.0),
        (EventType::Release, 440.0),
    ] {
        engine.tick(&host, 0.1);
        let sample = host.real_pointer(0, event_type, Point::new(x, 300.0));
        if engine.record_pointer(&host, sample).is_some() {
            recorded += 1;
        }
    }
    assert_eq!(recorded, 3);

    let types: Vec<_> = engine
        .current_recording()
        .touch_data
        .iter()
        .map(|td| td.event_type)
        .collect();
    assert_eq!(types, [EventType::Press, EventType::Drag, EventType::Release]);
}

fn record_click(engine: &mut RecordingEngine, host: &mut HeadlessHost) {
    engine.tick(&*host, 0.1);
    let press = host.real_pointer(-1, EventType::Press, Point::new(400.0, 300.0));
    engine.record_pointer(&*host, press);
    engine.tick(&*host, 0.1);
    let release = host.real_pointer(-1, EventType::Release, Point::new(400.0, 300.0));
    engine.record_pointer(&*host, release);
}

#[test]
fn test_segments_flatten_back_into_one_stream() {
    let dir = tempfile::tempdir().unwrap();
    let (mut host, _) = host_with_button(Rect::new(350.0, 250.0, 100.0, 100.0));
    let mut engine = RecordingEngine::new(settings(dir.path()));
    engine.begin_recording(&host);

    record_click(&mut engine, &mut host);
    let first = engine.save_recording_segment(&host).unwrap().unwrap();
    assert!(first.is_file());
    assert!(engine.current_recording().touch_data.is_empty());

    record_click(&mut engine, &mut host);
    let path = engine.finish(&host).unwrap().unwrap();

    let root = RecordingData::load(&path).unwrap();
    assert_eq!(root.recording_type, RecordingType::Composite);
    assert_eq!(root.recordings.len(), 2);
    assert_eq!(root.touch_data.len(), 1);

    let (mut replay_host, _) = host_with_button(Rect::new(350.0, 250.0, 100.0, 100.0));
    let mut replay = RecordingEngine::new(settings(dir.path()));
    replay.begin_playback(&path, &replay_host).unwrap();
    assert_eq!(replay.stream().len(), 7);
    for _ in 0..30 {
        let update = replay.tick(&replay_host, 0.1);
        replay_host.dispatch(&update);
    }
    assert!(replay.is_playback_completed());
    assert_eq!(replay_host.click_count("Btn"), 2);

    // Playback cleans the working copy and its segments on quit
    replay.finish(&replay_host).unwrap();
    assert!(!path.exists());
    assert!(!first.exists());
}

#[test]
fn test_extend_switches_to_recording_after_last_event() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let (mut host, _) = host_with_button(Rect::new(350.0, 250.0, 100.0, 100.0));

    let mut data = RecordingData::from_events("Main", click_events());
    data.add_playback_complete(0.5, "Main");
    let source = dir.path().join("prefix.json");
    data.save(&source).unwrap();

    let mut engine = RecordingEngine::new(settings(dir.path()));
    engine.begin_extend(&source, &host).unwrap();
    assert_eq!(engine.mode(), RecordingMode::Extend);

    let mut switched = false;
    for _ in 0..20 {
        let update = engine.tick(&host, 0.1);
        host.dispatch(&update);
        if update.mode_change == Some(RecordingMode::Record) {
            switched = true;
            break;
        }
    }
    assert!(switched);
    assert_eq!(engine.mode(), RecordingMode::Record);
    assert_eq!(host.click_count("Btn"), 1);
    // The closing marker is not replayed as a signal
    assert!(!engine.has_emitted(PLAYBACK_COMPLETE_SIGNAL));
    assert_eq!(
        engine.persistence().playback_config().unwrap().mode,
        RecordingMode::Record
    );

    engine.tick(&host, 0.2);
    let press = host.real_pointer(-1, EventType::Press, Point::new(400.0, 300.0));
    engine.record_pointer(&host, press);
    let release = host.real_pointer(-1, EventType::Release, Point::new(400.0, 300.0));
    engine.record_pointer(&host, release);

    let path = engine.finish(&host).unwrap().unwrap();
    let extended = RecordingData::load(path).unwrap();
    assert_eq!(extended.touch_data.len(), 5);
    assert!(extended.ends_with_playback_complete());
    assert_eq!(
        extended.touch_data[..4]
            .iter()
            .map(|td| td.event_type)
            .collect::<Vec<_>>(),
        [
            EventType::Press,
            EventType::Release,
            EventType::Press,
            EventType::Release
        ]
    );
}

#[test]
fn test_extend_keeps_drag_timing() {
    let dir = tempfile::tempdir().unwrap();
    let (mut host, _) = host_with_button(Rect::new(350.0, 250.0, 100.0, 100.0));

    let at = |event_type, x, time_delta| {
        let mut td = TouchData::pointer(event_type, 0, Point::new(x, 0.5), time_delta);
        td.scene = "Main".to_string();
        td
    };
    let mut data = RecordingData::from_events(
        "Main",
        vec![
            at(EventType::Press, 0.5, 0.0),
            at(EventType::Drag, 0.6, 0.1),
            at(EventType::Release, 0.8, 1.0),
        ],
    );
    data.add_playback_complete(0.5, "Main");
    let source = dir.path().join("drag.json");
    data.save(&source).unwrap();

    let mut engine = RecordingEngine::new(settings(dir.path()));
    engine.begin_extend(&source, &host).unwrap();
    let mut switched = false;
    for _ in 0..60 {
        let update = engine.tick(&host, 0.05);
        host.dispatch(&update);
        if update.mode_change == Some(RecordingMode::Record) {
            switched = true;
            break;
        }
    }
    assert!(switched);
    // Interpolated samples were played but are not part of the recording
    assert_eq!(engine.stream().len(), 3);

    let path = engine.finish(&host).unwrap().unwrap();
    let extended = RecordingData::load(path).unwrap();
    assert_eq!(extended.touch_data.len(), 4);
    for (saved, original) in extended.touch_data.iter().zip(&data.touch_data[..3]) {
        assert_eq!(saved.event_type, original.event_type);
        assert!((saved.time_delta - original.time_delta).abs() < 1e-9);
        assert!(saved.position.distance(original.position) < 1e-6);
    }
    assert!(extended.ends_with_playback_complete());
}

#[test]
fn test_focus_loss_saves_working_copy() {
    let dir = tempfile::tempdir().unwrap();
    let (mut host, _) = host_with_button(Rect::new(350.0, 250.0, 100.0, 100.0));
    let mut engine = RecordingEngine::new(settings(dir.path()));

    assert!(engine.on_focus_changed(false).unwrap().is_none());
    engine.begin_recording(&host);
    let press = host.real_pointer(-1, EventType::Press, Point::new(400.0, 300.0));
    engine.record_pointer(&host, press);

    assert!(engine.on_focus_changed(true).unwrap().is_none());
    let path = engine.on_focus_changed(false).unwrap().unwrap();
    let saved = RecordingData::load(path).unwrap();
    assert_eq!(saved.touch_data.len(), 1);
    assert!(!saved.ends_with_playback_complete());
    assert_eq!(engine.mode(), RecordingMode::Record);
}

#[test]
fn test_registered_recording_plays_from_persisted_config() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let mut data = RecordingData::from_events("Main", click_events());
    data.add_playback_complete(0.1, "Main");
    let source = dir.path().join("login.json");
    data.save(&source).unwrap();

    let mut registry = RecordedTestRegistry::new();
    registry.register("login.valid", &source);
    let settings = settings(dir.path());
    let persist = PersistentData::new(&settings.data_dir);
    registry.setup_recorded_test("login.valid", &persist).unwrap();

    let mut runner = TestRunner::new(TestConfig::default().with_settings(settings));
    let canvas = runner
        .host_mut()
        .tree_mut()
        .add_root(rewind_core::ElementSpec::new("Canvas"));
    runner
        .host_mut()
        .tree_mut()
        .add_child(
            canvas,
            rewind_core::ElementSpec::new("Btn")
                .rect(Rect::new(0.0, 0.0, 200.0, 100.0))
                .component(rewind_core::Component::Button),
        )
        .unwrap();

    assert!(runner.play_persisted().unwrap());
    assert_eq!(runner.engine().mode(), RecordingMode::Playback);
    assert_eq!(runner.host().click_count("Btn"), 1);

    let report = runner.report("login.valid");
    assert!(report.passed());
    assert_eq!(report.recording.as_deref(), Some("login.json"));
}

#[cfg(feature = "png")]
#[test]
fn test_playback_screenshots_attach_to_steps() {
    let dir = tempfile::tempdir().unwrap();
    let (mut host, _) = host_with_button(Rect::new(350.0, 250.0, 100.0, 100.0));
    let mut settings = settings(dir.path());
    settings.enable_screenshots = true;
    let mut engine = RecordingEngine::new(settings);
    engine.set_screen_capture(host.screen_capture());

    let mut events = click_events();
    events.push(TouchData::marker(1.0, "Main"));
    engine
        .begin_playback_data(RecordingData::from_events("Main", events), dir.path(), &host)
        .unwrap();
    for _ in 0..15 {
        let update = engine.tick(&host, 0.1);
        host.dispatch(&update);
    }

    let shots: Vec<_> = engine
        .steps()
        .iter()
        .flat_map(|step| step.screenshots.iter())
        .collect();
    assert!(shots.len() >= 2);
    assert!(shots.iter().all(|path| path.is_file()));
}
