//! Record/replay scheduler.
//!
//! [`RecordingEngine`] is the single owner of the event stream, the
//! consumption cursor and the pending-signal set. The host calls
//! [`RecordingEngine::tick`] once per frame; in playback it injects every
//! event that is due into the [`InputFacade`] and returns them as
//! [`SyntheticEvent`]s for the host's UI pipeline. In record mode the host
//! forwards real input through the `record_*` methods.

use super::input::{mouse_button_for_pointer, InputFacade, Touch, TouchPhase};
use super::{DragInterpolator, EventId, EventOrigin, EventStream, SignalHandle, SignalRequest, VirtualClock};
use crate::capture::{
    EventType, RecordingData, SegmentLoader, TouchData, PLAYBACK_COMPLETE_SIGNAL, SEGMENT_COMPLETE_SIGNAL,
};
use crate::config::{RecordingMode, RuntimeSettings, UnresolvedPolicy};
use crate::error::{Result, ScheduleError};
use crate::log::PlaybackLog;
use crate::persist::{PersistentData, SEGMENT_FILE_PREFIX};
use crate::report::{StepRecord, TestReport};
use crate::resolve::{ObjectResolver, Resolution};
use crate::screenshot::{ScreenCapture, ScreenshotExporter, ScreenshotSchedule};
use rewind_core::{ElementId, Point, SceneGraph};
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// An input event injected by playback.
#[derive(Clone, Debug, PartialEq)]
pub enum SyntheticEvent {
    /// Pointer went down.
    Press {
        pointer_id: i32,
        position: Point,
        target: Option<ElementId>,
    },
    /// Pointer moved while down.
    Drag {
        pointer_id: i32,
        position: Point,
    },
    /// Pointer went up.
    Release {
        pointer_id: i32,
        position: Point,
        target: Option<ElementId>,
    },
    /// Pointer moved while up.
    Move {
        pointer_id: i32,
        position: Point,
    },
    /// Text typed into a field over `duration` seconds.
    TextInput {
        target: Option<ElementId>,
        text: String,
        duration: f64,
    },
    KeyDown {
        key_code: String,
    },
    KeyUp {
        key_code: String,
    },
}

impl SyntheticEvent {
    pub fn is_pointer_event(&self) -> bool {
        matches!(
            self,
            Self::Press { .. } | Self::Drag { .. } | Self::Release { .. } | Self::Move { .. }
        )
    }

    pub fn is_keyboard_event(&self) -> bool {
        matches!(
            self,
            Self::KeyDown { .. } | Self::KeyUp { .. } | Self::TextInput { .. }
        )
    }

    /// Screen position of pointer events.
    pub fn position(&self) -> Option<Point> {
        match self {
            Self::Press { position, .. }
            | Self::Drag { position, .. }
            | Self::Release { position, .. }
            | Self::Move { position, .. } => Some(*position),
            _ => None,
        }
    }

    /// The touch this event corresponds to, for pointer events.
    pub fn as_touch(&self) -> Option<Touch> {
        let (finger_id, position, phase) = match self {
            Self::Press {
                pointer_id,
                position,
                ..
            } => (*pointer_id, *position, TouchPhase::Began),
            Self::Drag {
                pointer_id,
                position,
            } => (*pointer_id, *position, TouchPhase::Moved),
            Self::Release {
                pointer_id,
                position,
                ..
            } => (*pointer_id, *position, TouchPhase::Ended),
            _ => return None,
        };
        Some(Touch::new(finger_id, position, phase))
    }
}

/// Everything that happened during one tick.
#[derive(Clone, Debug, Default)]
pub struct FrameUpdate {
    /// Events to dispatch to the UI, in order.
    pub events: Vec<SyntheticEvent>,
    /// Signals emitted by consumed events.
    pub emitted_signals: Vec<String>,
    /// Set when the engine switched mode on its own.
    pub mode_change: Option<RecordingMode>,
    /// Playback consumed its last event during this tick.
    pub completed: bool,
}

impl FrameUpdate {
    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }
}

/// A real pointer event captured in record mode.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerSample {
    pub pointer_id: i32,
    /// `Press`, `Drag` or `Release`.
    pub event_type: EventType,
    /// Screen position in pixels.
    pub position: Point,
    /// Element the input pipeline routed the event to.
    pub target: Option<ElementId>,
}

#[derive(Clone, Debug, PartialEq)]
enum EntryGate {
    Open,
    Waiting { scene: String, waited: f64 },
}

/// The record/replay state machine.
pub struct RecordingEngine {
    settings: RuntimeSettings,
    persistence: PersistentData,
    mode: RecordingMode,
    recording: RecordingData,
    recording_name: Option<String>,
    stream: EventStream,
    cursor: usize,
    clock: VirtualClock,
    last_event_time: f64,
    time_adjustment: f64,
    wait_start_time: f64,
    pending_signals: FxHashSet<String>,
    signals: SignalHandle,
    emitted: Vec<String>,
    listeners: Vec<Box<dyn FnMut(&str)>>,
    resolver: ObjectResolver,
    interpolator: DragInterpolator,
    input: InputFacade,
    log: PlaybackLog,
    steps: Vec<StepRecord>,
    active_drag: Option<i32>,
    gate: EntryGate,
    screen_capture: Option<Box<dyn ScreenCapture>>,
    screenshots: Option<ScreenshotSchedule>,
    session_stamp: u64,
}

impl RecordingEngine {
    /// Create an inert engine.
    pub fn new(settings: RuntimeSettings) -> Self {
        let settings = settings.normalized();
        Self {
            persistence: PersistentData::new(settings.data_dir.clone()),
            resolver: ObjectResolver::new(settings.raycast_grid_steps),
            interpolator: DragInterpolator::new(settings.drag_sample_interval_secs),
            settings,
            mode: RecordingMode::None,
            recording: RecordingData::default(),
            recording_name: None,
            stream: EventStream::new(),
            cursor: 0,
            clock: VirtualClock::new(),
            last_event_time: 0.0,
            time_adjustment: 0.0,
            wait_start_time: 0.0,
            pending_signals: FxHashSet::default(),
            signals: SignalHandle::new(),
            emitted: Vec::new(),
            listeners: Vec::new(),
            input: InputFacade::default(),
            log: PlaybackLog::new(),
            steps: Vec::new(),
            active_drag: None,
            gate: EntryGate::Open,
            screen_capture: None,
            screenshots: None,
            session_stamp: epoch_secs(),
        }
    }

    /// Create an engine and enter the mode stored in the persisted config.
    ///
    /// A missing config means `None` and is recreated. A config naming a
    /// playback mode without a working recording is a configuration error.
    pub fn from_persisted_config(settings: RuntimeSettings, scene: &dyn SceneGraph) -> Result<Self> {
        let mut engine = Self::new(settings);
        let config = engine.persistence.playback_config()?;
        let working = engine.persistence.recording_path();
        match config.mode {
            RecordingMode::None => {}
            RecordingMode::Record => engine.begin_recording(scene),
            RecordingMode::Playback => engine.begin_playback(&working, scene)?,
            RecordingMode::Extend => engine.begin_extend(&working, scene)?,
        }
        if !config.recording_file_name.is_empty() {
            engine.recording_name = Some(config.recording_file_name);
        }
        Ok(engine)
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    pub fn persistence(&self) -> &PersistentData {
        &self.persistence
    }

    pub fn mode(&self) -> RecordingMode {
        self.mode
    }

    pub fn recording(&self) -> &RecordingData {
        &self.recording
    }

    pub fn stream(&self) -> &EventStream {
        &self.stream
    }

    /// Index of the next unconsumed event.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_consumed(&self, index: usize) -> bool {
        index < self.cursor
    }

    pub fn clock(&self) -> &VirtualClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut VirtualClock {
        &mut self.clock
    }

    pub fn input(&self) -> &InputFacade {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut InputFacade {
        &mut self.input
    }

    pub fn log(&self) -> &PlaybackLog {
        &self.log
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn set_screen_capture(&mut self, capture: Box<dyn ScreenCapture>) {
        self.screen_capture = Some(capture);
    }

    /// Handle for posting signals from code that does not own the engine.
    pub fn signal_handle(&self) -> SignalHandle {
        self.signals.clone()
    }

    /// Call `listener` with every signal emitted during playback.
    pub fn on_signal(&mut self, listener: impl FnMut(&str) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn emitted_signals(&self) -> &[String] {
        &self.emitted
    }

    pub fn has_emitted(&self, signal: &str) -> bool {
        self.emitted.iter().any(|s| s == signal)
    }

    /// Elements the resolver can currently see.
    pub fn active_elements(&self, scene: &dyn SceneGraph) -> Vec<ElementId> {
        scene.active_elements()
    }

    /// Playback has consumed every event.
    pub fn is_playback_completed(&self) -> bool {
        self.mode == RecordingMode::Playback && self.cursor >= self.stream.len()
    }

    /// Waiting for at least one signal.
    pub fn is_waiting(&self) -> bool {
        !self.pending_signals.is_empty()
    }

    pub fn is_pending(&self, signal: &str) -> bool {
        self.pending_signals.contains(signal)
    }

    /// Logical seconds since the last consumed event, pauses excluded.
    pub fn elapsed(&self) -> f64 {
        self.clock.now() - self.last_event_time - self.time_adjustment
    }

    /// Load and flatten `path`, then start playing it.
    pub fn begin_playback(&mut self, path: impl AsRef<Path>, scene: &dyn SceneGraph) -> Result<()> {
        self.load(path.as_ref())?;
        self.start_replay(RecordingMode::Playback, scene);
        Ok(())
    }

    /// Play `path`, then keep recording after its last event.
    pub fn begin_extend(&mut self, path: impl AsRef<Path>, scene: &dyn SceneGraph) -> Result<()> {
        self.load(path.as_ref())?;
        self.start_replay(RecordingMode::Extend, scene);
        Ok(())
    }

    /// Play an in-memory recording whose segments live in `base_dir`.
    pub fn begin_playback_data(
        &mut self,
        data: RecordingData,
        base_dir: impl AsRef<Path>,
        scene: &dyn SceneGraph,
    ) -> Result<()> {
        let events = SegmentLoader::new().flatten(&data, base_dir)?;
        self.recording = data;
        self.stream = EventStream::from_touch_data(events);
        self.start_replay(RecordingMode::Playback, scene);
        Ok(())
    }

    /// Start playback of an empty stream that scripted steps fill in.
    pub fn begin_scripted(&mut self, scene: &dyn SceneGraph) {
        self.recording = RecordingData::new(scene.active_scene());
        self.stream = EventStream::new();
        self.start_replay(RecordingMode::Playback, scene);
    }

    /// Start a fresh recording in the active scene.
    pub fn begin_recording(&mut self, scene: &dyn SceneGraph) {
        self.recording = RecordingData::new(scene.active_scene());
        self.stream = EventStream::new();
        self.enter_record(scene);
        tracing::info!("Recording started in scene {}", scene.active_scene());
    }

    /// Stop whatever the engine was doing.
    pub fn stop(&mut self) {
        self.mode = RecordingMode::None;
        self.input.set_playback_active(false);
        self.pending_signals.clear();
        if let Some(schedule) = &mut self.screenshots {
            schedule.clear();
        }
        tracing::debug!("Engine stopped at event {}", self.cursor);
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let (data, events) = SegmentLoader::new().load_flattened(path)?;
        self.recording = data;
        self.stream = EventStream::from_touch_data(events);
        self.recording_name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        Ok(())
    }

    fn start_replay(&mut self, mode: RecordingMode, scene: &dyn SceneGraph) {
        self.mode = mode;
        self.cursor = 0;
        self.pending_signals.clear();
        self.emitted.clear();
        self.time_adjustment = 0.0;
        self.wait_start_time = 0.0;
        self.last_event_time = self.clock.now();
        self.active_drag = None;
        self.steps.clear();
        self.input.set_playback_active(true);
        self.resolver.reset_warnings();

        let recorded = self.recording.recorded_resolution;
        self.resolver
            .set_recorded_resolution((recorded != Point::ZERO).then_some(recorded));
        let aspect = self.recording.recorded_aspect_ratio;
        let viewport = scene.viewport();
        if aspect != Point::ZERO
            && aspect.y != 0.0
            && viewport.height != 0.0
            && ((aspect.x / aspect.y) - (viewport.width / viewport.height)).abs() > 0.01
        {
            self.log.warn(format!(
                "Recording was captured at {}x{}, playing back at {}x{}",
                aspect.x, aspect.y, viewport.width, viewport.height
            ));
        }

        let entry = self
            .stream
            .get(0)
            .map(|e| e.data.scene.clone())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.recording.entry_scene.clone());
        self.gate = if entry.is_empty() || entry == scene.active_scene() {
            EntryGate::Open
        } else {
            self.log.info(format!("Waiting for scene {entry} before playback"));
            EntryGate::Waiting {
                scene: entry,
                waited: 0.0,
            }
        };

        self.screenshots = self.new_screenshot_schedule(mode);
        self.log.info(format!(
            "{} of {} events started",
            mode.as_str(),
            self.stream.len()
        ));
    }

    fn enter_record(&mut self, scene: &dyn SceneGraph) {
        self.mode = RecordingMode::Record;
        self.cursor = 0;
        self.pending_signals.clear();
        self.time_adjustment = 0.0;
        self.last_event_time = self.clock.now();
        self.active_drag = None;
        self.gate = EntryGate::Open;
        self.input.set_playback_active(false);
        self.screenshots = self.new_screenshot_schedule(RecordingMode::Record);
        if self.recording.entry_scene.is_empty() {
            self.recording.entry_scene = scene.active_scene().to_string();
        }
    }

    fn new_screenshot_schedule(&self, mode: RecordingMode) -> Option<ScreenshotSchedule> {
        self.settings.enable_screenshots.then(|| {
            ScreenshotSchedule::new(
                self.settings
                    .data_dir
                    .join(format!("{} screenshots {}", mode.as_str(), self.session_stamp)),
                self.settings.screenshot_delay_secs,
            )
        })
    }

    /// Hold playback until `signal` is sent.
    ///
    /// Overlapping pauses share one wait that starts at the first of them.
    pub fn pause(&mut self, signal: impl Into<String>) {
        let signal = signal.into();
        tracing::debug!("Waiting for signal {}", signal);
        if self.pending_signals.is_empty() {
            self.wait_start_time = self.elapsed();
        }
        self.pending_signals.insert(signal);
    }

    /// Clear a pending signal. Returns whether it was pending.
    ///
    /// When the last pending signal clears, the time spent waiting is
    /// excluded from the logical clock.
    pub fn send_signal(&mut self, signal: &str) -> bool {
        if !self.pending_signals.remove(signal) {
            tracing::debug!("Signal {} was not pending", signal);
            return false;
        }
        if self.pending_signals.is_empty() {
            self.time_adjustment += self.elapsed() - self.wait_start_time;
        }
        true
    }

    fn apply_signal_requests(&mut self) {
        for request in self.signals.drain() {
            match request {
                SignalRequest::Pause(signal) => self.pause(signal),
                SignalRequest::Send(signal) => {
                    self.send_signal(&signal);
                }
            }
        }
    }

    /// Advance by `dt` seconds and run one frame.
    pub fn tick(&mut self, scene: &dyn SceneGraph, dt: f64) -> FrameUpdate {
        self.apply_signal_requests();
        self.clock.advance(dt);
        self.run_frame(scene)
    }

    /// Advance by the real time since the previous frame and run one frame.
    pub fn tick_realtime(&mut self, scene: &dyn SceneGraph) -> FrameUpdate {
        self.apply_signal_requests();
        self.clock.sync();
        self.run_frame(scene)
    }

    fn run_frame(&mut self, scene: &dyn SceneGraph) -> FrameUpdate {
        let mut update = FrameUpdate::default();
        let now = self.clock.now();
        self.input.update(now);
        if self.mode.is_replaying() {
            self.update_play(scene, &mut update);
        }
        self.take_screenshots(now);
        update
    }

    fn entry_gate_open(&mut self, scene: &dyn SceneGraph) -> bool {
        let dt = self.clock.last_delta();
        let EntryGate::Waiting { scene: expected, waited } = &mut self.gate else {
            return true;
        };
        if scene.active_scene() == expected.as_str() {
            tracing::info!("Scene {} active, starting playback", expected);
        } else {
            *waited += dt;
            if *waited < self.settings.entry_scene_timeout_secs {
                return false;
            }
            self.log.error(format!(
                "Timed out after {:.1}s waiting for scene {}, starting playback in {}",
                waited,
                expected,
                scene.active_scene()
            ));
        }
        self.gate = EntryGate::Open;
        self.last_event_time = self.clock.now() - self.time_adjustment;
        true
    }

    fn update_play(&mut self, scene: &dyn SceneGraph, update: &mut FrameUpdate) {
        if !self.entry_gate_open(scene) {
            return;
        }
        let was_complete = self.cursor >= self.stream.len();

        while self.pending_signals.is_empty() {
            let Some(event) = self.stream.get(self.cursor) else {
                break;
            };
            let delta = sanitize_delta(event.data.time_delta);
            if delta > self.elapsed() {
                break;
            }
            let td = event.data.clone();
            let index = self.cursor;
            self.last_event_time += delta;

            if td.event_type != EventType::None {
                if let Err(e) = self.do_action(scene, index, update) {
                    self.log
                        .exception(format!("Failed to perform {}: {}", td.describe(), e));
                }
            }
            if !td.wait_signal.is_empty() {
                self.pause(td.wait_signal.clone());
            }
            if self.mode == RecordingMode::Extend
                && index + 1 == self.stream.len()
                && td.emits(PLAYBACK_COMPLETE_SIGNAL)
            {
                self.switch_to_extension(scene, update);
                return;
            }
            if !td.emit_signal.is_empty() {
                self.emit(&td.emit_signal, update);
            }
            self.cursor += 1;
        }

        if !was_complete && self.is_playback_completed() {
            update.completed = true;
            self.log.set_step(None);
            self.log.info("Playback completed");
        }
    }

    fn emit(&mut self, signal: &str, update: &mut FrameUpdate) {
        tracing::debug!("Emitting signal {}", signal);
        self.emitted.push(signal.to_string());
        update.emitted_signals.push(signal.to_string());
        for listener in &mut self.listeners {
            listener(signal);
        }
    }

    /// Extend mode finished replaying: keep the replayed prefix and record on.
    fn switch_to_extension(&mut self, scene: &dyn SceneGraph, update: &mut FrameUpdate) {
        let mut prefix = self.stream.recorded_touch_data();
        prefix.pop();
        self.recording.recordings.clear();
        self.recording.recording_type = crate::capture::RecordingType::Single;
        self.recording.touch_data.clear();
        self.stream = EventStream::from_touch_data(prefix);
        self.enter_record(scene);
        update.mode_change = Some(RecordingMode::Record);
        self.log.set_step(None);
        self.log.info("Replay finished, extending the recording");

        let name = self.recording_name.clone().unwrap_or_default();
        if let Err(e) = self.persistence.set_recording_mode(RecordingMode::Record, name) {
            tracing::warn!("Could not persist record mode: {}", e);
        }
    }

    fn do_action(
        &mut self,
        scene: &dyn SceneGraph,
        index: usize,
        update: &mut FrameUpdate,
    ) -> std::result::Result<(), ScheduleError> {
        let event = self
            .stream
            .get(index)
            .ok_or(ScheduleError::OutOfRange {
                index,
                len: self.stream.len(),
            })?;
        let td = event.data.clone();
        let origin = event.origin;

        if origin != EventOrigin::Interpolated {
            self.steps.push(StepRecord {
                action_type: td.event_type.to_string(),
                name: if td.positional || !td.has_object() {
                    format!("{{Position X: {:.3}, Y: {:.3}}}", td.position.x, td.position.y)
                } else {
                    td.object_name.clone()
                },
                hierarchy: if td.object_hierarchy.is_empty() {
                    "{N/A}".to_string()
                } else {
                    td.object_hierarchy.clone()
                },
                scene: scene.active_scene().to_string(),
                position: None,
                time: self.clock.now(),
                screenshots: Vec::new(),
            });
            self.log.set_step(Some(self.steps.len() - 1));
        }
        if td.event_type != EventType::Drag {
            self.schedule_screenshots();
        }

        match td.event_type {
            EventType::Press | EventType::Release | EventType::Drag | EventType::Move => {
                self.perform_pointer(scene, index, origin, &td, update)
            }
            EventType::Input => {
                let resolution = self.resolve_logged(scene, &td);
                self.set_step_position(origin, resolution.position);
                update.events.push(SyntheticEvent::TextInput {
                    target: resolution.target,
                    text: td.input_text.clone(),
                    duration: td.input_duration,
                });
                Ok(())
            }
            EventType::KeyDown => {
                update.events.push(SyntheticEvent::KeyDown {
                    key_code: td.key_code.clone(),
                });
                Ok(())
            }
            EventType::KeyUp => {
                update.events.push(SyntheticEvent::KeyUp {
                    key_code: td.key_code.clone(),
                });
                Ok(())
            }
            EventType::None => Ok(()),
        }
    }

    fn perform_pointer(
        &mut self,
        scene: &dyn SceneGraph,
        index: usize,
        origin: EventOrigin,
        td: &TouchData,
        update: &mut FrameUpdate,
    ) -> std::result::Result<(), ScheduleError> {
        let resolution = self.resolve_logged(scene, td);
        if resolution.is_unresolved() && self.settings.unresolved_policy == UnresolvedPolicy::SkipEvent {
            return Ok(());
        }
        let position = resolution.position;
        let target = resolution.target;
        self.set_step_position(origin, position);
        let button = mouse_button_for_pointer(td.pointer_id);

        match td.event_type {
            EventType::Press => {
                let viewport = scene.viewport();
                let (release, duration) = self
                    .matching_release(index, td.pointer_id)
                    .map(|(release, duration)| (release.screen_position(viewport), duration))
                    .unwrap_or((position, f64::INFINITY));
                match button {
                    Some(button) => self.input.fake_button_press(button, position, release, duration),
                    None => self.input.fake_touch(
                        Touch::new(td.pointer_id, position, TouchPhase::Began),
                        release,
                        duration,
                    ),
                }
                update.events.push(SyntheticEvent::Press {
                    pointer_id: td.pointer_id,
                    position,
                    target,
                });
            }
            EventType::Drag => {
                match button {
                    Some(button) => self.input.move_button(button, position),
                    None => self.input.move_touch(td.pointer_id, position),
                }
                update.events.push(SyntheticEvent::Drag {
                    pointer_id: td.pointer_id,
                    position,
                });
                if origin != EventOrigin::Interpolated {
                    self.expand_drag(scene, index, td, position)?;
                }
            }
            EventType::Release => {
                match button {
                    Some(button) => self.input.release_button(button, position),
                    None => self.input.release_touch(td.pointer_id, position),
                }
                update.events.push(SyntheticEvent::Release {
                    pointer_id: td.pointer_id,
                    position,
                    target,
                });
            }
            _ => {
                if button.is_some() {
                    self.input.set_mouse_position(position);
                }
                update.events.push(SyntheticEvent::Move {
                    pointer_id: td.pointer_id,
                    position,
                });
            }
        }
        Ok(())
    }

    /// Insert interpolated samples between the drag at `index` and its release.
    fn expand_drag(
        &mut self,
        scene: &dyn SceneGraph,
        index: usize,
        drag: &TouchData,
        start: Point,
    ) -> std::result::Result<(), ScheduleError> {
        let Some(next) = self.stream.get(index + 1) else {
            return Ok(());
        };
        if next.data.event_type != EventType::Release {
            return Ok(());
        }
        let release = next.data.clone();
        let duration = sanitize_delta(release.time_delta);
        let end = self.resolver.preview(scene, &release).position;
        let samples = self
            .interpolator
            .interpolate(drag, duration, start, end, scene.viewport());
        if samples.is_empty() {
            return Ok(());
        }

        let count = samples.len();
        let floor = index + 1;
        let instant_release = TouchData {
            time_delta: 0.0,
            ..release
        };
        let replaced = self.stream.with_replaced(floor, floor, instant_release)?;
        let (derived, _) = replaced.with_inserted(floor, floor, samples, EventOrigin::Interpolated)?;
        self.stream = derived;
        tracing::debug!("Expanded drag at {} into {} samples", index, count);
        Ok(())
    }

    /// The release ending the press at `index`, with the time until it.
    fn matching_release(&self, index: usize, pointer_id: i32) -> Option<(TouchData, f64)> {
        let mut duration = 0.0;
        for event in self.stream.iter().skip(index + 1) {
            duration += sanitize_delta(event.data.time_delta);
            if event.data.event_type == EventType::Release && event.data.pointer_id == pointer_id {
                return Some((event.data.clone(), duration));
            }
            if event.data.event_type == EventType::Press && event.data.pointer_id == pointer_id {
                break;
            }
        }
        None
    }

    fn resolve_logged(&mut self, scene: &dyn SceneGraph, td: &TouchData) -> Resolution {
        let resolution = self.resolver.resolve(scene, td);
        for warning in &resolution.warnings {
            self.log.warn(warning.to_string());
        }
        for error in &resolution.errors {
            self.log.error(format!(
                "{} [{}: {}]",
                error,
                scene.active_scene(),
                td.describe()
            ));
        }
        resolution
    }

    fn set_step_position(&mut self, origin: EventOrigin, position: Point) {
        if origin == EventOrigin::Interpolated {
            return;
        }
        if let Some(step) = self.steps.last_mut() {
            step.position = Some(position);
        }
    }

    fn schedule_screenshots(&mut self) {
        if self.screen_capture.is_none() {
            return;
        }
        if let Some(schedule) = &mut self.screenshots {
            schedule.schedule_around(self.clock.now());
        }
    }

    fn take_screenshots(&mut self, now: f64) {
        let (Some(schedule), Some(capture)) = (&mut self.screenshots, &mut self.screen_capture) else {
            return;
        };
        for _ in 0..schedule.take_due(now) {
            let Some(frame) = capture.capture() else {
                continue;
            };
            if let Err(e) = std::fs::create_dir_all(schedule.folder()) {
                tracing::warn!("Cannot create {}: {}", schedule.folder().display(), e);
                return;
            }
            let path = schedule.next_path(self.mode.as_str());
            match ScreenshotExporter::save_png(&frame, &path) {
                Ok(()) => {
                    if self.mode.is_replaying() {
                        if let Some(step) = self.steps.last_mut() {
                            step.screenshots.push(path);
                        }
                    }
                }
                Err(e) => tracing::warn!("Failed to save screenshot {}: {}", path.display(), e),
            }
        }
    }

    fn time_since_last_event(&self) -> f64 {
        (self.clock.now() - self.last_event_time).max(0.0)
    }

    fn push_recorded(&mut self, mut td: TouchData) -> EventId {
        td.time_delta = self.time_since_last_event();
        self.last_event_time = self.clock.now();
        self.stream.push(td, EventOrigin::Recorded)
    }

    /// Capture a real pointer event. Ignored outside record mode.
    ///
    /// Only the first drag update of a gesture is kept; the release that
    /// follows carries the gesture's duration.
    pub fn record_pointer(&mut self, scene: &dyn SceneGraph, sample: PointerSample) -> Option<EventId> {
        if self.mode != RecordingMode::Record {
            return None;
        }
        match sample.event_type {
            EventType::Press => {}
            EventType::Drag => {
                if self.active_drag == Some(sample.pointer_id) {
                    return None;
                }
                self.active_drag = Some(sample.pointer_id);
            }
            EventType::Release => {
                if self.active_drag == Some(sample.pointer_id) {
                    self.active_drag = None;
                }
            }
            other => {
                tracing::debug!("Not recording {} pointer events", other);
                return None;
            }
        }

        let viewport = scene.viewport();
        let mut td = TouchData {
            pointer_id: sample.pointer_id,
            event_type: sample.event_type,
            position: viewport.normalize(sample.position),
            positional: sample.target.is_none(),
            scene: scene.active_scene().to_string(),
            ..Default::default()
        };
        if let Some(target) = sample.target {
            describe_target(scene, target, &mut td);
            if let Some(rect) = scene.ui_rect(target) {
                let local = scene.screen_to_local(target, sample.position);
                let size = rect.size();
                let centered = local - rect.min() - size.to_point() / 2.0;
                td.object_offset = centered.scale_down(size);
            }
        }
        if sample.event_type != EventType::Drag {
            self.schedule_screenshots();
        }
        Some(self.push_recorded(td))
    }

    /// Capture a key press or release. Ignored outside record mode.
    pub fn record_key(&mut self, scene: &dyn SceneGraph, key_code: &str, pressed: bool) -> Option<EventId> {
        if self.mode != RecordingMode::Record {
            return None;
        }
        let td = TouchData {
            pointer_id: -1,
            event_type: if pressed {
                EventType::KeyDown
            } else {
                EventType::KeyUp
            },
            positional: true,
            key_code: key_code.to_string(),
            scene: scene.active_scene().to_string(),
            ..Default::default()
        };
        Some(self.push_recorded(td))
    }

    /// Capture text typed into `target`. Ignored outside record mode.
    pub fn record_text_input(
        &mut self,
        scene: &dyn SceneGraph,
        target: Option<ElementId>,
        text: &str,
        duration: f64,
    ) -> Option<EventId> {
        if self.mode != RecordingMode::Record {
            return None;
        }
        let mut td = TouchData {
            pointer_id: -1,
            event_type: EventType::Input,
            positional: target.is_none(),
            input_text: text.to_string(),
            input_duration: duration.max(0.0),
            scene: scene.active_scene().to_string(),
            ..Default::default()
        };
        if let Some(target) = target {
            describe_target(scene, target, &mut td);
            if let Some(rect) = scene.screen_rect(target) {
                td.position = scene.viewport().normalize(rect.center());
            }
        }
        self.schedule_screenshots();
        Some(self.push_recorded(td))
    }

    /// Append a scripted event to the end of the stream.
    pub fn add_touch_data(&mut self, td: TouchData) -> EventId {
        self.stream.push(td, EventOrigin::Scripted)
    }

    /// Insert scripted events at `index`, which must not precede the cursor.
    pub fn insert_touch_data(
        &mut self,
        index: usize,
        events: Vec<TouchData>,
    ) -> std::result::Result<Vec<EventId>, ScheduleError> {
        let (derived, ids) =
            self.stream
                .with_inserted(index, self.cursor, events, EventOrigin::Scripted)?;
        self.stream = derived;
        Ok(ids)
    }

    pub fn position_of(&self, id: EventId) -> Option<usize> {
        self.stream.position_of(id)
    }

    /// Save the events recorded so far as a segment file.
    ///
    /// The recording becomes composite and the buffer starts over.
    pub fn save_recording_segment(&mut self, scene: &dyn SceneGraph) -> Result<Option<PathBuf>> {
        if self.mode != RecordingMode::Record {
            return Ok(None);
        }
        let number = self.recording.recordings.len() + 1;
        let filename = format!("{SEGMENT_FILE_PREFIX}{number}_{}.json", epoch_secs());
        let events = self.stream.recorded_touch_data();
        let entry_scene = events
            .first()
            .map(|td| td.scene.clone())
            .unwrap_or_else(|| scene.active_scene().to_string());

        let mut segment = RecordingData::from_events(entry_scene, events);
        segment.touch_data.push(
            TouchData::marker(self.time_since_last_event(), scene.active_scene())
                .with_emit_signal(SEGMENT_COMPLETE_SIGNAL),
        );
        segment.stamp_display(scene.viewport(), scene.display_resolution());
        let path = self.persistence.dir().join(&filename);
        segment.save(&path)?;

        self.recording.add_segment(filename);
        self.stream.clear();
        self.last_event_time = self.clock.now();
        self.active_drag = None;
        self.log.info(format!("Saved recording segment {}", path.display()));
        Ok(Some(path))
    }

    /// The recording as it would be saved now, without the closing marker.
    pub fn current_recording(&self) -> RecordingData {
        let mut data = self.recording.clone();
        data.touch_data = self.stream.recorded_touch_data();
        data
    }

    /// Finish the session, as on application quit.
    ///
    /// Recording sessions are closed and written to the working recording,
    /// whose path is returned. Playback sessions clean their working data.
    pub fn finish(&mut self, scene: &dyn SceneGraph) -> Result<Option<PathBuf>> {
        let result = match self.mode {
            RecordingMode::Record => self.finalize_recording(scene).map(Some),
            RecordingMode::Playback => {
                if self.settings.clean_after_playback {
                    self.persistence.clean_recording_data(false)?;
                }
                Ok(None)
            }
            RecordingMode::Extend | RecordingMode::None => Ok(None),
        };
        self.stop();
        result
    }

    fn finalize_recording(&mut self, scene: &dyn SceneGraph) -> Result<PathBuf> {
        if self.recording.is_composite() && !self.stream.is_empty() {
            self.save_recording_segment(scene)?;
        }
        let mut data = self.current_recording();
        data.add_playback_complete(self.time_since_last_event(), scene.active_scene());
        data.stamp_display(scene.viewport(), scene.display_resolution());
        let path = self.persistence.set_recording_data(&data)?;
        self.recording = data;
        self.log.info(format!(
            "Recording saved to {} ({} events, {} segments)",
            path.display(),
            self.recording.touch_data.len(),
            self.recording.recordings.len()
        ));
        Ok(path)
    }

    /// Persist the working recording when the application loses focus.
    pub fn on_focus_changed(&mut self, has_focus: bool) -> Result<Option<PathBuf>> {
        if has_focus || self.mode != RecordingMode::Record {
            return Ok(None);
        }
        let path = self.persistence.set_recording_data(&self.current_recording())?;
        Ok(Some(path))
    }

    /// Report of the steps played so far.
    pub fn report(&self, test_name: impl Into<String>) -> TestReport {
        TestReport::new(
            test_name,
            self.recording_name.clone(),
            self.steps.clone(),
            self.log.entries(),
        )
    }
}

impl std::fmt::Debug for RecordingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingEngine")
            .field("mode", &self.mode)
            .field("cursor", &self.cursor)
            .field("events", &self.stream.len())
            .field("pending_signals", &self.pending_signals)
            .field("now", &self.clock.now())
            .finish()
    }
}

fn describe_target(scene: &dyn SceneGraph, target: ElementId, td: &mut TouchData) {
    td.object_name = scene.name(target).unwrap_or_default().to_string();
    td.object_tag = scene.tag(target).unwrap_or_default().to_string();
    td.object_hierarchy = scene.hierarchy_path(target);
}

fn sanitize_delta(delta: f64) -> f64 {
    if delta.is_finite() && delta > 0.0 {
        delta
    } else {
        0.0
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
