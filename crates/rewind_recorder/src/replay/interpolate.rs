//! Drag interpolation.
//!
//! A recorded drag is stored as a single `drag` event followed by a `release`
//! whose time delta is the drag duration. Pointer drag handlers expect a
//! steady flow of move updates, so playback expands that pair into samples
//! spaced at a fixed interval.

use crate::capture::{EventType, TouchData};
use rewind_core::{Point, Viewport};

/// Default spacing of interpolated drag samples, in seconds.
pub const DRAG_SAMPLE_INTERVAL: f64 = 0.05;

/// Tolerance for durations that are whole multiples of the interval.
const SAMPLE_EPSILON: f64 = 1e-9;

/// Upper bound on samples per drag. Longer drags are sampled more sparsely.
pub const MAX_DRAG_SAMPLES: usize = 10_000;

#[derive(Clone, Copy, Debug)]
pub struct DragInterpolator {
    interval: f64,
}

impl Default for DragInterpolator {
    fn default() -> Self {
        Self {
            interval: DRAG_SAMPLE_INTERVAL,
        }
    }
}

impl DragInterpolator {
    /// Create an interpolator; non-positive intervals fall back to the default.
    pub fn new(interval: f64) -> Self {
        if interval.is_finite() && interval > 0.0 {
            Self { interval }
        } else {
            Self::default()
        }
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    /// Number of samples a drag of `duration` seconds expands into.
    pub fn sample_count(&self, duration: f64) -> usize {
        self.uncapped_count(duration).min(MAX_DRAG_SAMPLES)
    }

    fn uncapped_count(&self, duration: f64) -> usize {
        if !duration.is_finite() || duration <= 0.0 {
            return 0;
        }
        (duration / self.interval - SAMPLE_EPSILON).ceil().max(1.0) as usize
    }

    /// Expand a drag into positional drag samples.
    ///
    /// `start` and `end` are resolved screen positions in pixels. The samples
    /// are spaced by the interval with the last one clamped, so their time
    /// deltas sum to `duration` and the final sample lands on `end`.
    pub fn interpolate(
        &self,
        drag: &TouchData,
        duration: f64,
        start: Point,
        end: Point,
        viewport: Viewport,
    ) -> Vec<TouchData> {
        let count = self.sample_count(duration);
        let step = if self.uncapped_count(duration) > count {
            tracing::warn!(
                "Drag of {:.1}s exceeds {} samples, spacing them {:.3}s apart",
                duration,
                MAX_DRAG_SAMPLES,
                duration / count as f64
            );
            duration / count as f64
        } else {
            self.interval
        };
        let mut samples = Vec::with_capacity(count);
        let mut previous = 0.0;
        for k in 1..=count {
            let last = k == count;
            let at = if last {
                duration
            } else {
                (k as f64 * step).min(duration)
            };
            let fraction = if last { 1.0 } else { (at / duration) as f32 };
            let position = viewport.normalize(start.lerp(end, fraction));
            samples.push(TouchData {
                pointer_id: drag.pointer_id,
                event_type: EventType::Drag,
                time_delta: at - previous,
                position,
                positional: true,
                scene: drag.scene.clone(),
                ..Default::default()
            });
            previous = at;
        }
        samples
    }
}
