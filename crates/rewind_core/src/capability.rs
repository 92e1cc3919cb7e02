//! Element capability classification
//!
//! Hosts tag elements with the [`Component`]s they carry. The engine never
//! probes components directly; it asks [`classify`] once and works with the
//! resulting [`Capabilities`] set.

use std::fmt;

/// UI components a host can attach to an element
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Component {
    Button,
    Toggle,
    Slider,
    Scrollbar,
    InputField,
    Dropdown,
    ScrollRect,
    /// Receives begin/drag/end drag callbacks
    DragHandler,
    /// Receives pointer down/up/click callbacks
    PointerHandler,
    Image,
    Text,
}

/// What an element can do when driven by pointer or keyboard input
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    Clickable,
    Draggable,
    Slider,
    TextInput,
    Scrollable,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Capability::Clickable,
        Capability::Draggable,
        Capability::Slider,
        Capability::TextInput,
        Capability::Scrollable,
    ];

    fn bit(self) -> u8 {
        match self {
            Capability::Clickable => 1 << 0,
            Capability::Draggable => 1 << 1,
            Capability::Slider => 1 << 2,
            Capability::TextInput => 1 << 3,
            Capability::Scrollable => 1 << 4,
        }
    }
}

/// A set of [`Capability`] values
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const NONE: Capabilities = Capabilities(0);

    pub fn with(self, capability: Capability) -> Self {
        Capabilities(self.0 | capability.bit())
    }

    pub fn insert(&mut self, capability: Capability) {
        self.0 |= capability.bit();
    }

    pub fn contains(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL
            .into_iter()
            .filter(move |c| self.contains(*c))
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Capabilities::NONE, |caps, c| caps.with(c))
    }
}

/// Classify an element from the components it carries
pub fn classify(components: &[Component]) -> Capabilities {
    components
        .iter()
        .fold(Capabilities::NONE, |caps, component| match component {
            Component::Button | Component::Toggle | Component::PointerHandler => {
                caps.with(Capability::Clickable)
            }
            Component::Dropdown => caps.with(Capability::Clickable),
            Component::Slider | Component::Scrollbar => caps
                .with(Capability::Slider)
                .with(Capability::Draggable),
            Component::InputField => caps
                .with(Capability::TextInput)
                .with(Capability::Clickable),
            Component::ScrollRect => caps
                .with(Capability::Scrollable)
                .with(Capability::Draggable),
            Component::DragHandler => caps.with(Capability::Draggable),
            Component::Image | Component::Text => caps,
        })
}
