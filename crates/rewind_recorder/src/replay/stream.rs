//! The ordered event stream the scheduler consumes.
//!
//! A stream is never edited in place while being consumed. Insertions build a
//! derived stream that shares every entry before the insertion point, and the
//! scheduler swaps it in between two events. Each entry carries a stable
//! [`EventId`] so callers can find an event again after the stream changed.

use crate::capture::TouchData;
use crate::error::ScheduleError;

/// Stable identity of an event within one scheduler session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(u64);

impl EventId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Where an event came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventOrigin {
    /// Loaded from a recording or captured live.
    Recorded,
    /// Synthesized between a drag and its release.
    Interpolated,
    /// Registered by test code.
    Scripted,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StreamEvent {
    pub id: EventId,
    pub origin: EventOrigin,
    pub data: TouchData,
    /// Data as loaded or captured, kept when playback rewrote `data`.
    pub recorded: Option<Box<TouchData>>,
}

impl StreamEvent {
    /// The event as it should be persisted.
    pub fn recorded_data(&self) -> &TouchData {
        self.recorded.as_deref().unwrap_or(&self.data)
    }
}

#[derive(Clone, Debug, Default)]
pub struct EventStream {
    events: Vec<StreamEvent>,
    next_id: u64,
}

impl EventStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_touch_data(events: Vec<TouchData>) -> Self {
        let mut stream = Self::new();
        for data in events {
            stream.push(data, EventOrigin::Recorded);
        }
        stream
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&StreamEvent> {
        self.events.get(index)
    }

    pub fn last(&self) -> Option<&StreamEvent> {
        self.events.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StreamEvent> {
        self.events.iter()
    }

    pub fn position_of(&self, id: EventId) -> Option<usize> {
        self.events.iter().position(|e| e.id == id)
    }

    fn allocate_id(&mut self) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Append an event to the unconsumed tail.
    pub fn push(&mut self, data: TouchData, origin: EventOrigin) -> EventId {
        let id = self.allocate_id();
        self.events.push(StreamEvent {
            id,
            origin,
            data,
            recorded: None,
        });
        id
    }

    /// Derive a stream with `events` inserted at `at`.
    ///
    /// `cursor` is the index of the first unconsumed event; nothing before it
    /// may move.
    pub fn with_inserted(
        &self,
        at: usize,
        cursor: usize,
        events: Vec<TouchData>,
        origin: EventOrigin,
    ) -> Result<(EventStream, Vec<EventId>), ScheduleError> {
        if at < cursor {
            return Err(ScheduleError::InsertBeforeCursor { index: at, cursor });
        }
        if at > self.events.len() {
            return Err(ScheduleError::OutOfRange {
                index: at,
                len: self.events.len(),
            });
        }

        let mut derived = EventStream {
            events: Vec::with_capacity(self.events.len() + events.len()),
            next_id: self.next_id,
        };
        derived.events.extend_from_slice(&self.events[..at]);
        let mut ids = Vec::with_capacity(events.len());
        for data in events {
            let id = derived.allocate_id();
            derived.events.push(StreamEvent {
                id,
                origin,
                data,
                recorded: None,
            });
            ids.push(id);
        }
        derived.events.extend_from_slice(&self.events[at..]);
        Ok((derived, ids))
    }

    /// Derive a stream where the unconsumed event at `index` carries new data.
    ///
    /// The first replacement remembers the previous data for
    /// [`recorded_touch_data`](Self::recorded_touch_data).
    pub fn with_replaced(
        &self,
        index: usize,
        cursor: usize,
        data: TouchData,
    ) -> Result<EventStream, ScheduleError> {
        if index < cursor {
            return Err(ScheduleError::InsertBeforeCursor { index, cursor });
        }
        let mut derived = self.clone();
        let entry = derived
            .events
            .get_mut(index)
            .ok_or(ScheduleError::OutOfRange {
                index,
                len: self.events.len(),
            })?;
        let previous = std::mem::replace(&mut entry.data, data);
        if entry.recorded.is_none() {
            entry.recorded = Some(Box::new(previous));
        }
        Ok(derived)
    }

    /// Event data as recorded: synthesized drag samples are dropped and
    /// replaced events carry their original data.
    pub fn recorded_touch_data(&self) -> Vec<TouchData> {
        self.events
            .iter()
            .filter(|e| e.origin != EventOrigin::Interpolated)
            .map(|e| e.recorded_data().clone())
            .collect()
    }

    pub fn touch_data(&self) -> Vec<TouchData> {
        self.events.iter().map(|e| e.data.clone()).collect()
    }

    /// Drop every event, keeping id allocation monotonic.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}
