//! Scripted actions interleaved with a live playback.
//!
//! Test code builds [`TouchData`] steps on the fly (clicks, drags, typing),
//! registers them right after the last performed step, and then waits for the
//! engine to consume each one. The wait for a step accounts for the drag
//! samples the engine inserts after a drag.

use super::task::{Sequence, Task, TaskContext, TaskState, WaitSeconds};
use crate::capture::{EventType, TouchData, PLAYBACK_COMPLETE_SIGNAL};
use crate::error::ScheduleError;
use crate::replay::{EventId, EventOrigin, RecordingEngine};
use rewind_core::{ElementId, Point, SceneGraph};

/// Settle time after each scripted action, which carries no recorded delay.
pub const WAIT_AFTER_SCRIPTED_ACTION: f64 = 1.0;

/// Characters per second assumed when typing without an explicit duration.
pub const TYPING_RATE: f64 = 8.0;

/// Delay before each scripted step.
pub const STEP_TIME_DELTA: f64 = 0.1;

/// The closing marker appended by [`emit_test_complete`].
pub fn emit_complete_step() -> TouchData {
    TouchData::marker(2.0, "").with_emit_signal(PLAYBACK_COMPLETE_SIGNAL)
}

/// Steps registered by scripted actions and the last one performed.
#[derive(Clone, Debug, Default)]
pub struct DriverState {
    steps: Vec<EventId>,
    last_action: Option<(EventId, TouchData)>,
}

impl DriverState {
    pub fn steps(&self) -> &[EventId] {
        &self.steps
    }

    pub fn last_action(&self) -> Option<&(EventId, TouchData)> {
        self.last_action.as_ref()
    }

    pub fn reset(&mut self) {
        self.steps.clear();
        self.last_action = None;
    }

    /// Queue steps for playback.
    ///
    /// Before any step ran they are appended. Afterwards they go right after
    /// the last performed step so they run next.
    pub fn register_steps(
        &mut self,
        engine: &mut RecordingEngine,
        data: Vec<TouchData>,
    ) -> Result<Vec<EventId>, ScheduleError> {
        let Some((last, _)) = &self.last_action else {
            let ids: Vec<EventId> = data.into_iter().map(|td| engine.add_touch_data(td)).collect();
            self.steps.extend_from_slice(&ids);
            return Ok(ids);
        };

        let index = engine
            .position_of(*last)
            .map(|p| p + 1)
            .unwrap_or(engine.stream().len())
            .max(engine.cursor());
        let ids = engine.insert_touch_data(index, data)?;
        let after = self
            .steps
            .iter()
            .position(|id| id == last)
            .map(|p| p + 1)
            .unwrap_or(self.steps.len());
        for (offset, id) in ids.iter().enumerate() {
            self.steps.insert(after + offset, *id);
        }
        Ok(ids)
    }
}

#[derive(Debug)]
enum ActionPhase {
    Start,
    /// Waiting for drag samples, one at a time.
    Interpolated { pending: Vec<EventId>, waited: f64 },
    Waiting { waited: f64, timeout: f64 },
}

/// Waits until the engine has performed one registered step.
#[derive(Debug)]
pub struct ActionTask {
    step: EventId,
    data: TouchData,
    phase: ActionPhase,
}

impl ActionTask {
    pub fn new(step: EventId, data: TouchData) -> Self {
        Self {
            step,
            data,
            phase: ActionPhase::Start,
        }
    }

    fn step_info(&self) -> String {
        format!(
            "{}: {} > {}",
            self.data.scene, self.data.object_hierarchy, self.data.object_name
        )
    }

    fn is_consumed(engine: &RecordingEngine, id: EventId) -> bool {
        engine
            .position_of(id)
            .is_some_and(|index| engine.is_consumed(index))
    }

    /// Drag samples inserted between the previous drag and this step.
    fn interpolated_after_drag(&self, cx: &TaskContext<'_>) -> Vec<EventId> {
        let Some((last, last_data)) = cx.driver.last_action() else {
            return Vec::new();
        };
        if last_data.event_type != EventType::Drag {
            return Vec::new();
        }
        let (Some(from), Some(to)) = (cx.engine.position_of(*last), cx.engine.position_of(self.step))
        else {
            return Vec::new();
        };
        cx.engine
            .stream()
            .iter()
            .skip(from + 1)
            .take(to.saturating_sub(from + 1))
            .filter(|e| e.origin == EventOrigin::Interpolated)
            .map(|e| e.id)
            .collect()
    }

    fn finish(&self, cx: &mut TaskContext<'_>) -> TaskState {
        let log = cx.engine.log();
        if !log.has_errors() {
            return TaskState::Done;
        }
        let detail = log.last_error().map(|e| e.message).unwrap_or_default();
        TaskState::Failed(format!("{} failed: {}", self.step_info(), detail))
    }
}

impl Task for ActionTask {
    fn poll(&mut self, cx: &mut TaskContext<'_>) -> TaskState {
        let wait_timeout = cx.engine.settings().dynamic_wait_timeout_secs;
        loop {
            match &mut self.phase {
                ActionPhase::Start => {
                    if cx.engine.position_of(self.step).is_none() {
                        let message = format!("Step {} is not queued", self.step_info());
                        cx.engine.log().error(message.clone());
                        return TaskState::Failed(message);
                    }
                    let mut pending = self.interpolated_after_drag(cx);
                    pending.reverse();
                    cx.driver.last_action = Some((self.step, self.data.clone()));
                    self.phase = ActionPhase::Interpolated { pending, waited: 0.0 };
                }
                ActionPhase::Interpolated { pending, waited } => {
                    while let Some(next) = pending.last().copied() {
                        if Self::is_consumed(cx.engine, next) {
                            pending.pop();
                            *waited = 0.0;
                            continue;
                        }
                        *waited += cx.dt;
                        if *waited <= wait_timeout {
                            return TaskState::Pending;
                        }
                        cx.engine
                            .log()
                            .info("Timed out waiting for an interpolated drag event");
                        pending.pop();
                        *waited = 0.0;
                    }
                    let mut timeout = wait_timeout + self.data.time_delta.max(0.0);
                    if self.data.event_type == EventType::Input {
                        timeout += self.data.input_duration.max(0.0);
                    }
                    self.phase = ActionPhase::Waiting { waited: 0.0, timeout };
                }
                ActionPhase::Waiting { waited, timeout } => {
                    if !Self::is_consumed(cx.engine, self.step) {
                        *waited += cx.dt;
                        if *waited <= *timeout {
                            return TaskState::Pending;
                        }
                        cx.engine.log().error(format!(
                            "Timed out waiting to perform next step [{} {} > {}]",
                            self.data.event_type, self.data.object_hierarchy, self.data.object_name
                        ));
                    }
                    return self.finish(cx);
                }
            }
        }
    }
}

/// Where a scripted drag ends.
#[derive(Clone, Debug, PartialEq)]
pub enum DragDestination {
    /// Center of the named element.
    Element(String),
    /// Screen position in pixels.
    Position(Point),
}

#[derive(Clone, Debug, PartialEq)]
enum ScriptedKind {
    Click { hold: f64 },
    Drag { destination: DragDestination, duration: f64 },
    SendKeys { text: String, duration: f64 },
}

/// A scripted action on a named element, built once the element exists.
pub struct ScriptedAction {
    target: String,
    kind: ScriptedKind,
    waited: f64,
    /// Set once the steps are registered.
    perform: Option<Sequence>,
}

/// Press and release the named element.
pub fn click(target: impl Into<String>) -> ScriptedAction {
    click_and_hold(target, 0.0)
}

/// Press the named element and release it after `hold` seconds.
pub fn click_and_hold(target: impl Into<String>, hold: f64) -> ScriptedAction {
    ScriptedAction::new(target, ScriptedKind::Click { hold: hold.max(0.0) })
}

/// Drag the named element to a destination over `duration` seconds.
pub fn drag(target: impl Into<String>, destination: DragDestination, duration: f64) -> ScriptedAction {
    ScriptedAction::new(
        target,
        ScriptedKind::Drag {
            destination,
            duration: duration.max(0.0),
        },
    )
}

/// Click the named field and type `text` into it.
///
/// Without a duration, typing takes one second per [`TYPING_RATE`] characters.
pub fn send_keys(target: impl Into<String>, text: impl Into<String>, duration: Option<f64>) -> ScriptedAction {
    let text = text.into();
    let duration = duration
        .filter(|d| *d >= 0.0)
        .unwrap_or(text.chars().count() as f64 / TYPING_RATE);
    ScriptedAction::new(target, ScriptedKind::SendKeys { text, duration })
}

/// Append the closing marker and wait until it has been played.
pub fn emit_test_complete() -> impl Task {
    let mut action: Option<ActionTask> = None;
    move |cx: &mut TaskContext<'_>| {
        let task = action.get_or_insert_with(|| {
            let data = emit_complete_step();
            let id = cx.engine.add_touch_data(data.clone());
            cx.driver.steps.push(id);
            ActionTask::new(id, data)
        });
        task.poll(cx)
    }
}

impl ScriptedAction {
    fn new(target: impl Into<String>, kind: ScriptedKind) -> Self {
        Self {
            target: target.into(),
            kind,
            waited: 0.0,
            perform: None,
        }
    }

    fn template(scene: &dyn SceneGraph, element: ElementId) -> TouchData {
        let viewport = scene.viewport();
        let position = scene
            .screen_rect(element)
            .map(|rect| viewport.normalize(rect.center()))
            .unwrap_or_default();
        TouchData {
            pointer_id: -1,
            time_delta: STEP_TIME_DELTA,
            position,
            scene: scene.active_scene().to_string(),
            ..Default::default()
        }
        .with_object(
            scene.name(element).unwrap_or_default(),
            scene.tag(element).unwrap_or_default(),
            scene.hierarchy_path(element),
        )
    }

    /// The steps to register and the settle time after them.
    fn build(&self, scene: &dyn SceneGraph, element: ElementId) -> Option<(Vec<TouchData>, f64)> {
        let template = Self::template(scene, element);
        let press = TouchData {
            event_type: EventType::Press,
            ..template.clone()
        };
        match &self.kind {
            ScriptedKind::Click { hold } => {
                let release = TouchData {
                    event_type: EventType::Release,
                    time_delta: *hold,
                    ..template
                };
                Some((vec![press, release], WAIT_AFTER_SCRIPTED_ACTION))
            }
            ScriptedKind::Drag {
                destination,
                duration,
            } => {
                let end = match destination {
                    DragDestination::Position(position) => *position,
                    DragDestination::Element(name) => {
                        let other = scene.find_by_name(name)?;
                        scene.screen_rect(other)?.center()
                    }
                };
                let drag = TouchData {
                    event_type: EventType::Drag,
                    ..template.clone()
                };
                let release = TouchData {
                    event_type: EventType::Release,
                    time_delta: *duration,
                    position: scene.viewport().normalize(end),
                    positional: true,
                    ..template
                };
                Some((vec![press, drag, release], WAIT_AFTER_SCRIPTED_ACTION))
            }
            ScriptedKind::SendKeys { text, duration } => {
                let release = TouchData {
                    event_type: EventType::Release,
                    ..template.clone()
                };
                let input = TouchData {
                    event_type: EventType::Input,
                    input_text: text.clone(),
                    input_duration: *duration,
                    ..template
                };
                Some((
                    vec![press, release, input],
                    duration + WAIT_AFTER_SCRIPTED_ACTION,
                ))
            }
        }
    }

    fn targets_found(&self, scene: &dyn SceneGraph) -> Option<ElementId> {
        let element = scene.find_by_name(&self.target)?;
        if let ScriptedKind::Drag {
            destination: DragDestination::Element(name),
            ..
        } = &self.kind
        {
            scene.find_by_name(name)?;
        }
        Some(element)
    }
}

impl Task for ScriptedAction {
    fn poll(&mut self, cx: &mut TaskContext<'_>) -> TaskState {
        if let Some(sequence) = &mut self.perform {
            return sequence.poll(cx);
        }

        let Some(element) = self.targets_found(cx.scene) else {
            self.waited += cx.dt;
            if self.waited <= cx.engine.settings().dynamic_wait_timeout_secs {
                return TaskState::Pending;
            }
            let message = format!(
                "Could not find {} in scene {}",
                self.target,
                cx.scene.active_scene()
            );
            cx.engine.log().error(message.clone());
            return TaskState::Failed(message);
        };
        let Some((steps, settle)) = self.build(cx.scene, element) else {
            return TaskState::Failed(format!("Could not build steps for {}", self.target));
        };
        let ids = match cx.driver.register_steps(cx.engine, steps.clone()) {
            Ok(ids) => ids,
            Err(e) => {
                cx.engine.log().exception(e.to_string());
                return TaskState::Failed(e.to_string());
            }
        };
        tracing::debug!("Registered {} scripted steps for {}", ids.len(), self.target);

        let mut sequence = Sequence::new();
        for (id, data) in ids.into_iter().zip(steps) {
            sequence.push(Box::new(ActionTask::new(id, data)));
        }
        sequence.push(Box::new(WaitSeconds::new(settle)));
        self.perform.insert(sequence).poll(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeSettings;
    use rewind_core::{ElementSpec, Rect, SceneTree, Viewport};

    fn scene() -> SceneTree {
        let mut tree = SceneTree::new("Main", Viewport::new(800.0, 600.0));
        let canvas = tree.add_root(ElementSpec::new("Canvas"));
        tree.add_child(canvas, ElementSpec::new("Btn").rect(Rect::new(350.0, 250.0, 100.0, 100.0)))
            .unwrap();
        tree
    }

    #[test]
    fn test_register_before_run_appends() {
        let tree = scene();
        let mut engine = RecordingEngine::new(RuntimeSettings::default());
        engine.begin_scripted(&tree);
        let mut driver = DriverState::default();
        let a = driver
            .register_steps(&mut engine, vec![TouchData::marker(0.1, "Main")])
            .unwrap();
        let b = driver
            .register_steps(&mut engine, vec![TouchData::marker(0.1, "Main")])
            .unwrap();
        assert_eq!(driver.steps(), &[a[0], b[0]]);
        assert_eq!(engine.position_of(b[0]), Some(1));
    }

    #[test]
    fn test_register_mid_run_inserts_after_last_action() {
        let tree = scene();
        let mut engine = RecordingEngine::new(RuntimeSettings::default());
        engine.begin_scripted(&tree);
        let mut driver = DriverState::default();
        let first = driver
            .register_steps(
                &mut engine,
                vec![TouchData::marker(0.0, "Main"), TouchData::marker(5.0, "Main")],
            )
            .unwrap();
        engine.tick(&tree, 0.1);
        driver.last_action = Some((first[0], TouchData::marker(0.0, "Main")));

        let inserted = driver
            .register_steps(&mut engine, vec![TouchData::marker(0.0, "Main")])
            .unwrap();
        assert_eq!(engine.position_of(inserted[0]), Some(1));
        assert_eq!(driver.steps(), &[first[0], inserted[0], first[1]]);
    }

    #[test]
    fn test_send_keys_default_duration() {
        let action = send_keys("Field", "abcdefgh", None);
        assert_eq!(
            action.kind,
            ScriptedKind::SendKeys {
                text: "abcdefgh".into(),
                duration: 1.0
            }
        );
    }

    #[test]
    fn test_emit_complete_template() {
        let td = emit_complete_step();
        assert_eq!(td.pointer_id, -1);
        assert_eq!(td.event_type, EventType::None);
        assert_eq!(td.time_delta, 2.0);
        assert!(td.emits(PLAYBACK_COMPLETE_SIGNAL));
    }

    #[test]
    fn test_click_template_references_object() {
        let tree = scene();
        let btn = tree.find_by_name("Btn").unwrap();
        let (steps, settle) = click("Btn").build(&tree, btn).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].event_type, EventType::Press);
        assert_eq!(steps[0].object_hierarchy, "Canvas");
        assert!(!steps[0].positional);
        assert_eq!(steps[0].position, Point::new(0.5, 0.5));
        assert_eq!(settle, WAIT_AFTER_SCRIPTED_ACTION);
    }
}
