//! Injection intents: one desired input event aimed at one window.
//!
//! An [`InjectionIntent`] is built by a control loop and handed by value to
//! the injection strategy chain, which consumes it.  It is deliberately not
//! `Clone`: an intent is delivered once and then gone.
//!
//! # Expansion into primitive steps
//!
//! Every delivery method (posted window messages, `SendInput`, …) speaks a
//! slightly different vocabulary, but they all understand the same five
//! primitives: move the pointer, press/release a button, press/release a key.
//! [`InjectionIntent::steps`] expands the intent into that vocabulary once,
//! deterministically, so every strategy realises the same sequence:
//!
//! ```text
//! Click { Left, (400, 300) } + modifier Ctrl + hold 500 ms
//!   → KeyDown(Ctrl), MoveTo(400,300), ButtonDown(Left), Pause(500ms),
//!     ButtonUp(Left), KeyUp(Ctrl)
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::geometry::Point;
use super::window::WindowId;
use crate::keymap::hid::HidKeyCode;

/// Mouse buttons the engine can press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// What the intent does.  Points are window-relative (client-area origin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntentAction {
    PointerMove { to: Point },
    PointerDown { button: MouseButton, at: Point },
    PointerUp { button: MouseButton, at: Point },
    Click { button: MouseButton, at: Point },
    KeyDown { key: HidKeyCode },
    KeyUp { key: HidKeyCode },
    KeyPress { key: HidKeyCode },
}

impl IntentAction {
    /// Short name used in logs and status events.
    pub fn kind_name(&self) -> &'static str {
        match self {
            IntentAction::PointerMove { .. } => "pointer-move",
            IntentAction::PointerDown { .. } => "pointer-down",
            IntentAction::PointerUp { .. } => "pointer-up",
            IntentAction::Click { .. } => "click",
            IntentAction::KeyDown { .. } => "key-down",
            IntentAction::KeyUp { .. } => "key-up",
            IntentAction::KeyPress { .. } => "key-press",
        }
    }

    /// The window-relative point the action targets, if it is a pointer action.
    pub fn point(&self) -> Option<Point> {
        match *self {
            IntentAction::PointerMove { to } => Some(to),
            IntentAction::PointerDown { at, .. }
            | IntentAction::PointerUp { at, .. }
            | IntentAction::Click { at, .. } => Some(at),
            _ => None,
        }
    }

    fn presses(&self) -> bool {
        matches!(
            self,
            IntentAction::PointerDown { .. }
                | IntentAction::Click { .. }
                | IntentAction::KeyDown { .. }
                | IntentAction::KeyPress { .. }
        )
    }

    fn releases(&self) -> bool {
        matches!(
            self,
            IntentAction::PointerUp { .. }
                | IntentAction::Click { .. }
                | IntentAction::KeyUp { .. }
                | IntentAction::KeyPress { .. }
        )
    }
}

/// One primitive input operation.  Points are window-relative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputStep {
    MoveTo(Point),
    ButtonDown { button: MouseButton, at: Point },
    ButtonUp { button: MouseButton, at: Point },
    KeyDown(HidKeyCode),
    KeyUp(HidKeyCode),
    Pause(Duration),
}

impl InputStep {
    /// Whether the step moves or clicks the pointer.
    pub fn is_pointer(&self) -> bool {
        matches!(
            self,
            InputStep::MoveTo(_) | InputStep::ButtonDown { .. } | InputStep::ButtonUp { .. }
        )
    }

    /// The step that undoes this press, if it is one.
    pub fn release(&self) -> Option<InputStep> {
        match *self {
            InputStep::ButtonDown { button, at } => Some(InputStep::ButtonUp { button, at }),
            InputStep::KeyDown(key) => Some(InputStep::KeyUp(key)),
            _ => None,
        }
    }
}

/// Releases for every press in `done` that `done` does not release itself,
/// newest press first.
///
/// A strategy that fails partway through a step sequence replays these so
/// no button or key is left held.
pub fn pending_releases(done: &[InputStep]) -> Vec<InputStep> {
    let mut held: Vec<InputStep> = Vec::new();
    for step in done {
        let pressed = match *step {
            InputStep::ButtonDown { .. } | InputStep::KeyDown(_) => {
                held.push(*step);
                continue;
            }
            InputStep::ButtonUp { button, .. } => held
                .iter()
                .rposition(|h| matches!(*h, InputStep::ButtonDown { button: b, .. } if b == button)),
            InputStep::KeyUp(key) => held.iter().rposition(|h| *h == InputStep::KeyDown(key)),
            InputStep::MoveTo(_) | InputStep::Pause(_) => None,
        };
        if let Some(i) = pressed {
            held.remove(i);
        }
    }
    held.iter().rev().filter_map(InputStep::release).collect()
}

/// One desired input event for one window.
#[derive(Debug, PartialEq, Eq)]
pub struct InjectionIntent {
    window: WindowId,
    action: IntentAction,
    hold: Option<Duration>,
    modifier: Option<HidKeyCode>,
    allow_activation: bool,
}

impl InjectionIntent {
    /// Creates an intent with no hold, no modifier, and activation forbidden.
    pub fn new(window: WindowId, action: IntentAction) -> Self {
        Self {
            window,
            action,
            hold: None,
            modifier: None,
            allow_activation: false,
        }
    }

    /// Holds the button or key for `hold` before releasing it.
    ///
    /// Only meaningful for `Click` and `KeyPress`; ignored otherwise.
    pub fn with_hold(mut self, hold: Duration) -> Self {
        self.hold = (!hold.is_zero()).then_some(hold);
        self
    }

    /// Keeps `modifier` pressed around the action (e.g. Ctrl + left-hold).
    pub fn with_modifier(mut self, modifier: HidKeyCode) -> Self {
        self.modifier = Some(modifier);
        self
    }

    /// Permits the last-resort strategy that raises the window for good.
    pub fn with_activation(mut self, allow: bool) -> Self {
        self.allow_activation = allow;
        self
    }

    pub fn window(&self) -> WindowId {
        self.window
    }

    pub fn action(&self) -> IntentAction {
        self.action
    }

    pub fn hold(&self) -> Option<Duration> {
        self.hold
    }

    pub fn modifier(&self) -> Option<HidKeyCode> {
        self.modifier
    }

    pub fn allows_activation(&self) -> bool {
        self.allow_activation
    }

    /// Expands the intent into the primitive step sequence every strategy
    /// must realise.
    ///
    /// The modifier is pressed before any action that presses something and
    /// released after any action that releases something, so a
    /// `PointerDown`/`PointerUp` pair keeps it held across both intents.
    pub fn steps(&self) -> Vec<InputStep> {
        let mut steps = Vec::with_capacity(6);

        if let Some(m) = self.modifier {
            if self.action.presses() {
                steps.push(InputStep::KeyDown(m));
            }
        }

        match self.action {
            IntentAction::PointerMove { to } => steps.push(InputStep::MoveTo(to)),
            IntentAction::PointerDown { button, at } => {
                steps.push(InputStep::MoveTo(at));
                steps.push(InputStep::ButtonDown { button, at });
            }
            IntentAction::PointerUp { button, at } => {
                steps.push(InputStep::MoveTo(at));
                steps.push(InputStep::ButtonUp { button, at });
            }
            IntentAction::Click { button, at } => {
                steps.push(InputStep::MoveTo(at));
                steps.push(InputStep::ButtonDown { button, at });
                if let Some(hold) = self.hold {
                    steps.push(InputStep::Pause(hold));
                }
                steps.push(InputStep::ButtonUp { button, at });
            }
            IntentAction::KeyDown { key } => steps.push(InputStep::KeyDown(key)),
            IntentAction::KeyUp { key } => steps.push(InputStep::KeyUp(key)),
            IntentAction::KeyPress { key } => {
                steps.push(InputStep::KeyDown(key));
                if let Some(hold) = self.hold {
                    steps.push(InputStep::Pause(hold));
                }
                steps.push(InputStep::KeyUp(key));
            }
        }

        if let Some(m) = self.modifier {
            if self.action.releases() {
                steps.push(InputStep::KeyUp(m));
            }
        }

        steps
    }
}
