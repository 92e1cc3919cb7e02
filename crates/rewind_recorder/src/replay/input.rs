//! Synthetic input facade.
//!
//! Application code queries pointer and touch state through [`InputFacade`]
//! instead of the platform. While playback is active the facade answers
//! pointer and touch queries from presses injected by the scheduler; every
//! other query, and every query outside playback, goes to the platform.

use rewind_core::Point;
use rustc_hash::{FxHashMap, FxHashSet};

/// Phase of a touch within its lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TouchPhase {
    Began,
    Moved,
    Stationary,
    Ended,
    Canceled,
}

/// State of one finger.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Touch {
    pub finger_id: i32,
    pub position: Point,
    pub raw_position: Point,
    pub delta_position: Point,
    pub delta_time: f64,
    pub tap_count: u32,
    pub pressure: f32,
    pub phase: TouchPhase,
}

impl Touch {
    pub fn new(finger_id: i32, position: Point, phase: TouchPhase) -> Self {
        Self {
            finger_id,
            position,
            raw_position: position,
            delta_position: Point::ZERO,
            delta_time: 0.0,
            tap_count: 1,
            pressure: 1.0,
            phase,
        }
    }
}

/// The platform's real input state.
///
/// Every method has an inert default so hosts only implement what they have.
pub trait PlatformInput {
    fn touch_count(&self) -> usize {
        0
    }

    fn touch(&self, _index: usize) -> Option<Touch> {
        None
    }

    fn mouse_position(&self) -> Point {
        Point::ZERO
    }

    fn mouse_button(&self, _button: u8) -> bool {
        false
    }

    fn mouse_button_down(&self, _button: u8) -> bool {
        false
    }

    fn mouse_button_up(&self, _button: u8) -> bool {
        false
    }

    fn key(&self, _key: &str) -> bool {
        false
    }

    fn key_down(&self, _key: &str) -> bool {
        false
    }

    fn key_up(&self, _key: &str) -> bool {
        false
    }

    fn axis(&self, _name: &str) -> f32 {
        0.0
    }

    fn input_string(&self) -> String {
        String::new()
    }
}

/// A platform with no input devices.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullInput;

impl PlatformInput for NullInput {}

/// Mouse button addressed by a recorded pointer id, if any.
///
/// Mouse pointers use negative ids: -1 left, -2 right, -3 middle.
pub fn mouse_button_for_pointer(pointer_id: i32) -> Option<u8> {
    match pointer_id {
        -1 => Some(0),
        -2 => Some(1),
        -3 => Some(2),
        _ => None,
    }
}

/// A press injected for a bounded time window.
#[derive(Clone, Copy, Debug, PartialEq)]
struct SyntheticPress {
    start_time: f64,
    end_time: f64,
    start_position: Point,
    end_position: Point,
}

impl SyntheticPress {
    fn new(now: f64, duration: f64, start_position: Point, end_position: Point) -> Self {
        Self {
            start_time: now,
            end_time: now + duration.max(0.0),
            start_position,
            end_position,
        }
    }

    fn position_at(&self, now: f64) -> Point {
        let span = self.end_time - self.start_time;
        let t = if span <= 0.0 {
            1.0
        } else {
            ((now - self.start_time) / span).clamp(0.0, 1.0)
        };
        self.start_position.lerp(self.end_position, t as f32)
    }
}

/// Pointer/touch query surface that can be driven by playback.
pub struct InputFacade {
    platform: Box<dyn PlatformInput>,
    playback_active: bool,
    now: f64,
    mouse_presses: FxHashMap<u8, SyntheticPress>,
    mouse_down: FxHashSet<u8>,
    mouse_up: FxHashSet<u8>,
    mouse_position: Point,
    touches: Vec<Touch>,
    touch_presses: FxHashMap<i32, SyntheticPress>,
}

impl InputFacade {
    pub fn new(platform: Box<dyn PlatformInput>) -> Self {
        Self {
            platform,
            playback_active: false,
            now: 0.0,
            mouse_presses: FxHashMap::default(),
            mouse_down: FxHashSet::default(),
            mouse_up: FxHashSet::default(),
            mouse_position: Point::ZERO,
            touches: Vec::new(),
            touch_presses: FxHashMap::default(),
        }
    }

    /// Replace the platform backend.
    pub fn set_platform(&mut self, platform: Box<dyn PlatformInput>) {
        self.platform = platform;
    }

    pub fn is_playback_active(&self) -> bool {
        self.playback_active
    }

    /// Route pointer queries to synthetic state (`true`) or the platform.
    pub fn set_playback_active(&mut self, active: bool) {
        self.playback_active = active;
        if !active {
            self.reset();
        }
    }

    /// Drop all synthetic state.
    pub fn reset(&mut self) {
        self.mouse_presses.clear();
        self.mouse_down.clear();
        self.mouse_up.clear();
        self.touches.clear();
        self.touch_presses.clear();
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn touch_count(&self) -> usize {
        if self.playback_active {
            self.touches.len()
        } else {
            self.platform.touch_count()
        }
    }

    pub fn touches(&self) -> Vec<Touch> {
        if self.playback_active {
            self.touches.clone()
        } else {
            (0..self.platform.touch_count())
                .filter_map(|i| self.platform.touch(i))
                .collect()
        }
    }

    pub fn touch(&self, index: usize) -> Option<Touch> {
        if self.playback_active {
            self.touches.get(index).copied()
        } else {
            self.platform.touch(index)
        }
    }

    pub fn mouse_position(&self) -> Point {
        if !self.playback_active {
            return self.platform.mouse_position();
        }
        match self.mouse_presses.get(&0) {
            Some(press) => press.position_at(self.now),
            None => self.mouse_position,
        }
    }

    /// Whether `button` is held.
    pub fn mouse_button(&self, button: u8) -> bool {
        if self.playback_active {
            self.mouse_presses.contains_key(&button)
        } else {
            self.platform.mouse_button(button)
        }
    }

    /// Whether `button` went down this frame.
    pub fn mouse_button_down(&self, button: u8) -> bool {
        if self.playback_active {
            self.mouse_presses.contains_key(&button) && self.mouse_down.contains(&button)
        } else {
            self.platform.mouse_button_down(button)
        }
    }

    /// Whether `button` was released this frame.
    pub fn mouse_button_up(&self, button: u8) -> bool {
        if self.playback_active {
            self.mouse_presses.contains_key(&button) && self.mouse_up.contains(&button)
        } else {
            self.platform.mouse_button_up(button)
        }
    }

    pub fn key(&self, key: &str) -> bool {
        self.platform.key(key)
    }

    pub fn key_down(&self, key: &str) -> bool {
        self.platform.key_down(key)
    }

    pub fn key_up(&self, key: &str) -> bool {
        self.platform.key_up(key)
    }

    pub fn axis(&self, name: &str) -> f32 {
        self.platform.axis(name)
    }

    pub fn input_string(&self) -> String {
        self.platform.input_string()
    }

    /// Hold `button` from now for `duration` seconds, moving the pointer
    /// linearly from `down` to `up`.
    pub fn fake_button_press(&mut self, button: u8, down: Point, up: Point, duration: f64) {
        self.mouse_presses
            .insert(button, SyntheticPress::new(self.now, duration, down, up));
        self.mouse_down.insert(button);
        self.mouse_up.remove(&button);
        if button == 0 {
            self.mouse_position = down;
        }
    }

    /// Pin a held button's pointer to `position`.
    pub fn move_button(&mut self, button: u8, position: Point) {
        if let Some(press) = self.mouse_presses.get_mut(&button) {
            press.start_position = position;
            press.end_position = position;
        }
        if button == 0 {
            self.mouse_position = position;
        }
    }

    /// Release a held button at `position` on the next update.
    pub fn release_button(&mut self, button: u8, position: Point) {
        if let Some(press) = self.mouse_presses.get_mut(&button) {
            press.start_position = position;
            press.end_position = position;
            press.end_time = self.now;
        }
        if button == 0 {
            self.mouse_position = position;
        }
    }

    /// Move the synthetic pointer without pressing anything.
    pub fn set_mouse_position(&mut self, position: Point) {
        self.mouse_position = position;
    }

    /// Start a synthetic touch that ends at `release` after `duration` seconds.
    pub fn fake_touch(&mut self, touch: Touch, release: Point, duration: f64) {
        self.touches.retain(|t| t.finger_id != touch.finger_id);
        self.touches.push(Touch {
            phase: TouchPhase::Began,
            ..touch
        });
        self.touch_presses.insert(
            touch.finger_id,
            SyntheticPress::new(self.now, duration, touch.position, release),
        );
    }

    /// Move an active synthetic touch, or begin one if the finger is not down.
    pub fn move_touch(&mut self, finger_id: i32, position: Point) {
        match self.touches.iter_mut().find(|t| t.finger_id == finger_id) {
            Some(touch) => {
                touch.delta_position = position - touch.position;
                touch.position = position;
                touch.raw_position = position;
                touch.phase = TouchPhase::Moved;
            }
            None => self.fake_touch(Touch::new(finger_id, position, TouchPhase::Began), position, 0.0),
        }
        if let Some(press) = self.touch_presses.get_mut(&finger_id) {
            press.start_position = position;
            press.end_position = position;
        }
    }

    /// End a synthetic touch at `position` on the next update.
    pub fn release_touch(&mut self, finger_id: i32, position: Point) {
        if let Some(press) = self.touch_presses.get_mut(&finger_id) {
            press.end_time = self.now;
            press.end_position = position;
        }
        if let Some(touch) = self.touches.iter_mut().find(|t| t.finger_id == finger_id) {
            touch.position = position;
            touch.raw_position = position;
        }
    }

    /// Advance synthetic state to `now`. Called once per tick.
    pub fn update(&mut self, now: f64) {
        let dt = (now - self.now).max(0.0);
        self.now = now;

        self.mouse_down.clear();
        for button in self.mouse_up.drain() {
            if let Some(press) = self.mouse_presses.remove(&button) {
                if button == 0 {
                    self.mouse_position = press.end_position;
                }
            }
        }
        for (button, press) in &self.mouse_presses {
            if now >= press.end_time {
                self.mouse_up.insert(*button);
            }
        }

        let presses = &mut self.touch_presses;
        self.touches.retain(|touch| {
            let ended = matches!(touch.phase, TouchPhase::Ended | TouchPhase::Canceled);
            if ended {
                presses.remove(&touch.finger_id);
            }
            !ended
        });
        for touch in &mut self.touches {
            touch.delta_time = dt;
            let Some(press) = self.touch_presses.get(&touch.finger_id) else {
                continue;
            };
            let position = press.position_at(now);
            touch.delta_position = position - touch.position;
            touch.position = position;
            touch.raw_position = position;
            touch.phase = if now >= press.end_time && touch.phase != TouchPhase::Began {
                TouchPhase::Ended
            } else {
                TouchPhase::Moved
            };
        }
    }
}

impl Default for InputFacade {
    fn default() -> Self {
        Self::new(Box::new(NullInput))
    }
}

impl std::fmt::Debug for InputFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputFacade")
            .field("playback_active", &self.playback_active)
            .field("now", &self.now)
            .field("mouse_presses", &self.mouse_presses.len())
            .field("touches", &self.touches)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedInput;

    impl PlatformInput for FixedInput {
        fn mouse_position(&self) -> Point {
            Point::new(7.0, 8.0)
        }

        fn key(&self, key: &str) -> bool {
            key == "space"
        }
    }

    fn active_facade() -> InputFacade {
        let mut input = InputFacade::new(Box::new(FixedInput));
        input.set_playback_active(true);
        input
    }

    #[test]
    fn test_passthrough_when_inactive() {
        let mut input = InputFacade::new(Box::new(FixedInput));
        input.fake_button_press(0, Point::new(1.0, 1.0), Point::new(1.0, 1.0), 1.0);
        assert_eq!(input.mouse_position(), Point::new(7.0, 8.0));
        assert!(!input.mouse_button(0));
        assert!(input.key("space"));
    }

    #[test]
    fn test_fake_mouse_button_zero_duration() {
        let mut input = active_facade();
        let position = Point::new(100.0, 100.0);
        input.fake_button_press(0, position, position, 0.0);

        assert!(input.mouse_button_down(0));
        assert!(!input.mouse_button_up(0));
        assert_eq!(input.mouse_position(), position);

        input.update(0.016);
        assert!(!input.mouse_button_down(0));
        assert!(input.mouse_button_up(0));

        input.update(0.032);
        assert!(!input.mouse_button_down(0));
        assert!(!input.mouse_button_up(0));
        assert!(!input.mouse_button(0));
        assert_eq!(input.mouse_position(), position);
    }

    #[test]
    fn test_mouse_position_interpolates() {
        let mut input = active_facade();
        input.fake_button_press(0, Point::new(0.0, 0.0), Point::new(100.0, 0.0), 1.0);
        input.update(0.5);
        assert_eq!(input.mouse_position(), Point::new(50.0, 0.0));
        assert!(input.mouse_button(0));
        input.update(1.0);
        assert!(input.mouse_button_up(0));
        input.update(1.1);
        assert_eq!(input.mouse_position(), Point::new(100.0, 0.0));
    }

    #[test]
    fn test_fake_touch_phases() {
        let mut input = active_facade();
        let position = Point::new(100.0, 100.0);
        input.fake_touch(Touch::new(0, position, TouchPhase::Began), position, 0.0);

        assert_eq!(input.touch_count(), 1);
        assert_eq!(input.touch(0).unwrap().phase, TouchPhase::Began);
        assert_eq!(input.touch(0).unwrap().position, position);

        input.update(0.016);
        assert_eq!(input.touch(0).unwrap().phase, TouchPhase::Moved);

        input.update(0.032);
        assert_eq!(input.touch(0).unwrap().phase, TouchPhase::Ended);

        input.update(0.048);
        assert_eq!(input.touch_count(), 0);
    }

    #[test]
    fn test_release_touch_ends_on_next_update() {
        let mut input = active_facade();
        let start = Point::new(10.0, 10.0);
        input.fake_touch(Touch::new(2, start, TouchPhase::Began), start, 10.0);
        input.update(0.1);
        input.move_touch(2, Point::new(20.0, 10.0));
        assert_eq!(input.touch(0).unwrap().delta_position, Point::new(10.0, 0.0));
        input.update(0.2);
        assert_eq!(input.touch(0).unwrap().phase, TouchPhase::Moved);
        input.release_touch(2, Point::new(30.0, 10.0));
        input.update(0.3);
        let touch = input.touch(0).unwrap();
        assert_eq!(touch.phase, TouchPhase::Ended);
        assert_eq!(touch.position, Point::new(30.0, 10.0));
    }

    #[test]
    fn test_mouse_pointer_ids() {
        assert_eq!(mouse_button_for_pointer(-1), Some(0));
        assert_eq!(mouse_button_for_pointer(-3), Some(2));
        assert_eq!(mouse_button_for_pointer(0), None);
        assert_eq!(mouse_button_for_pointer(-4), None);
    }
}
