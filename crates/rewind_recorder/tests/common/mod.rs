//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use rewind_core::{Component, ElementId, ElementSpec, Rect};
use rewind_recorder::testing::{HeadlessConfig, HeadlessHost};
use rewind_recorder::{EventType, RuntimeSettings, TouchData};
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Route engine logs to the test output. Set `RUST_LOG` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn settings(dir: &Path) -> RuntimeSettings {
    RuntimeSettings::with_data_dir(dir.join("data"))
}

/// An 800x600 host in scene `Main` with a `Canvas` root.
pub fn host() -> (HeadlessHost, ElementId) {
    let mut host = HeadlessHost::new(HeadlessConfig::default());
    let canvas = host.tree_mut().add_root(ElementSpec::new("Canvas"));
    (host, canvas)
}

/// A host with a clickable `Btn` under `Canvas` at `rect`.
pub fn host_with_button(rect: Rect) -> (HeadlessHost, ElementId) {
    let (mut host, canvas) = host();
    let button = host
        .tree_mut()
        .add_child(
            canvas,
            ElementSpec::new("Btn").rect(rect).component(Component::Button),
        )
        .unwrap();
    (host, button)
}

/// Press and release on `Btn`, both immediately due.
pub fn click_events() -> Vec<TouchData> {
    [EventType::Press, EventType::Release]
        .into_iter()
        .map(|event_type| {
            let mut td = TouchData::pointer(event_type, -1, rewind_core::Point::new(0.5, 0.5), 0.0)
                .with_object("Btn", "", "Canvas");
            td.scene = "Main".to_string();
            td
        })
        .collect()
}
