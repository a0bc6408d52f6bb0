//! Translation of primitive input steps into Win32 window messages.
//!
//! Used by the privileged (`SendMessageTimeoutW`) and window-message
//! (`PostMessageW`) strategies.  Kept free of Win32 calls so the translation
//! is testable on every platform; the numeric message constants below are
//! the documented values from `WinUser.h`.
//!
//! Mouse messages carry the key/button state in `wParam` (`MK_*` flags), so
//! the planner tracks which buttons and modifiers are down as it walks the
//! steps.  A held Ctrl shows up as `MK_CONTROL` on every mouse message until
//! its key-up.
//!
//! When delivery fails partway, [`release_messages`] builds the key-ups and
//! button-ups that balance whatever was already delivered.

use std::time::Duration;

use mwp_core::keymap::windows_vk::{generic_modifier_vk, hid_to_vk, is_extended_vk};
use mwp_core::{HidKeyCode, InputStep, MouseButton, Point};

pub const WM_KEYDOWN: u32 = 0x0100;
pub const WM_KEYUP: u32 = 0x0101;
pub const WM_MOUSEMOVE: u32 = 0x0200;
pub const WM_LBUTTONDOWN: u32 = 0x0201;
pub const WM_LBUTTONUP: u32 = 0x0202;
pub const WM_RBUTTONDOWN: u32 = 0x0204;
pub const WM_RBUTTONUP: u32 = 0x0205;
pub const WM_MBUTTONDOWN: u32 = 0x0207;
pub const WM_MBUTTONUP: u32 = 0x0208;

pub const MK_LBUTTON: usize = 0x0001;
pub const MK_RBUTTON: usize = 0x0002;
pub const MK_SHIFT: usize = 0x0004;
pub const MK_CONTROL: usize = 0x0008;
pub const MK_MBUTTON: usize = 0x0010;

/// One message ready for `PostMessageW` / `SendMessageTimeoutW`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowMessage {
    pub msg: u32,
    pub wparam: usize,
    pub lparam: isize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStep {
    Send(WindowMessage),
    Pause(Duration),
}

/// Packs client coordinates the way `MAKELPARAM(x, y)` does.
pub fn make_point_lparam(p: Point) -> isize {
    let x = (p.x as u32) & 0xFFFF;
    let y = (p.y as u32) & 0xFFFF;
    ((y << 16) | x) as isize
}

fn key_lparam(vk: u8, up: bool) -> isize {
    let mut lparam: u32 = 1; // repeat count
    if is_extended_vk(vk) {
        lparam |= 1 << 24;
    }
    if up {
        lparam |= (1 << 30) | (1 << 31);
    }
    lparam as i32 as isize
}

#[derive(Debug, Default)]
struct HeldState {
    buttons: usize,
    ctrl: u32,
    shift: u32,
}

impl HeldState {
    fn mk(&self) -> usize {
        let mut mk = self.buttons;
        if self.ctrl > 0 {
            mk |= MK_CONTROL;
        }
        if self.shift > 0 {
            mk |= MK_SHIFT;
        }
        mk
    }

    fn track_key(&mut self, key: HidKeyCode, down: bool) {
        let counter = match key {
            HidKeyCode::ControlLeft | HidKeyCode::ControlRight => &mut self.ctrl,
            HidKeyCode::ShiftLeft | HidKeyCode::ShiftRight => &mut self.shift,
            _ => return,
        };
        *counter = if down { *counter + 1 } else { counter.saturating_sub(1) };
    }
}

fn button_bits(button: MouseButton) -> (u32, u32, usize) {
    match button {
        MouseButton::Left => (WM_LBUTTONDOWN, WM_LBUTTONUP, MK_LBUTTON),
        MouseButton::Right => (WM_RBUTTONDOWN, WM_RBUTTONUP, MK_RBUTTON),
        MouseButton::Middle => (WM_MBUTTONDOWN, WM_MBUTTONUP, MK_MBUTTON),
    }
}

/// Translates `steps` into window messages.
///
/// `origin` is subtracted from every point, which re-bases window-relative
/// coordinates onto a child window's client area.  Keys without a Virtual
/// Key mapping are skipped.
pub fn plan_messages(steps: &[InputStep], origin: Point) -> Vec<MessageStep> {
    let mut held = HeldState::default();
    let mut out = Vec::with_capacity(steps.len());
    let local = |p: Point| p.offset(-origin.x, -origin.y);

    for step in steps {
        match *step {
            InputStep::MoveTo(p) => out.push(MessageStep::Send(WindowMessage {
                msg: WM_MOUSEMOVE,
                wparam: held.mk(),
                lparam: make_point_lparam(local(p)),
            })),
            InputStep::ButtonDown { button, at } => {
                let (down, _, bit) = button_bits(button);
                held.buttons |= bit;
                out.push(MessageStep::Send(WindowMessage {
                    msg: down,
                    wparam: held.mk(),
                    lparam: make_point_lparam(local(at)),
                }));
            }
            InputStep::ButtonUp { button, at } => {
                let (_, up, bit) = button_bits(button);
                held.buttons &= !bit;
                out.push(MessageStep::Send(WindowMessage {
                    msg: up,
                    wparam: held.mk(),
                    lparam: make_point_lparam(local(at)),
                }));
            }
            InputStep::KeyDown(key) | InputStep::KeyUp(key) => {
                let down = matches!(step, InputStep::KeyDown(_));
                let Some(vk) = hid_to_vk(key) else {
                    continue;
                };
                held.track_key(key, down);
                out.push(MessageStep::Send(WindowMessage {
                    msg: if down { WM_KEYDOWN } else { WM_KEYUP },
                    wparam: usize::from(generic_modifier_vk(vk)),
                    lparam: key_lparam(vk, !down),
                }));
            }
            InputStep::Pause(d) => out.push(MessageStep::Pause(d)),
        }
    }
    out
}

/// The release message for a press message, and the `MK_*` bit it clears.
fn release_of(press: u32) -> Option<(u32, usize)> {
    match press {
        WM_KEYDOWN => Some((WM_KEYUP, 0)),
        WM_LBUTTONDOWN => Some((WM_LBUTTONUP, MK_LBUTTON)),
        WM_RBUTTONDOWN => Some((WM_RBUTTONUP, MK_RBUTTON)),
        WM_MBUTTONDOWN => Some((WM_MBUTTONUP, MK_MBUTTON)),
        _ => None,
    }
}

fn press_of(release: u32) -> Option<u32> {
    match release {
        WM_KEYUP => Some(WM_KEYDOWN),
        WM_LBUTTONUP => Some(WM_LBUTTONDOWN),
        WM_RBUTTONUP => Some(WM_RBUTTONDOWN),
        WM_MBUTTONUP => Some(WM_MBUTTONDOWN),
        _ => None,
    }
}

/// Releases for every key-down and button-down in `sent` that `sent` does
/// not release itself, newest press first.
pub fn release_messages(sent: &[WindowMessage]) -> Vec<WindowMessage> {
    let mut held: Vec<WindowMessage> = Vec::new();
    for m in sent {
        if release_of(m.msg).is_some() {
            held.push(*m);
        } else if let Some(press) = press_of(m.msg) {
            // Keys pair on the virtual key; buttons on the message alone.
            let pairs = |h: &WindowMessage| h.msg == press && (press != WM_KEYDOWN || h.wparam == m.wparam);
            if let Some(i) = held.iter().rposition(pairs) {
                held.remove(i);
            }
        }
    }

    held.iter()
        .rev()
        .filter_map(|down| {
            let (up, bit) = release_of(down.msg)?;
            Some(if up == WM_KEYUP {
                WindowMessage {
                    msg: up,
                    wparam: down.wparam,
                    lparam: ((down.lparam as u32) | (1 << 30) | (1 << 31)) as i32 as isize,
                }
            } else {
                WindowMessage {
                    msg: up,
                    wparam: down.wparam & !bit,
                    lparam: down.lparam,
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mwp_core::{InjectionIntent, IntentAction, WindowId};

    #[test]
    fn test_lparam_packs_x_low_y_high() {
        assert_eq!(make_point_lparam(Point::new(0x12, 0x34)), 0x0034_0012);
    }

    #[test]
    fn test_ctrl_hold_click_sets_mk_control_on_mouse_messages() {
        // Arrange
        let intent = InjectionIntent::new(
            WindowId(1),
            IntentAction::Click { button: MouseButton::Left, at: Point::new(10, 20) },
        )
        .with_modifier(HidKeyCode::ControlLeft)
        .with_hold(Duration::from_millis(500));

        // Act
        let plan = plan_messages(&intent.steps(), Point::new(0, 0));

        // Assert
        let sends: Vec<WindowMessage> = plan
            .iter()
            .filter_map(|s| match s {
                MessageStep::Send(m) => Some(*m),
                MessageStep::Pause(_) => None,
            })
            .collect();
        let msgs: Vec<u32> = sends.iter().map(|m| m.msg).collect();
        assert_eq!(msgs, vec![WM_KEYDOWN, WM_MOUSEMOVE, WM_LBUTTONDOWN, WM_LBUTTONUP, WM_KEYUP]);
        assert_eq!(sends[0].wparam, 0x11); // VK_CONTROL
        assert_eq!(sends[1].wparam, MK_CONTROL);
        assert_eq!(sends[2].wparam, MK_CONTROL | MK_LBUTTON);
        assert_eq!(sends[3].wparam, MK_CONTROL);
        assert!(plan.contains(&MessageStep::Pause(Duration::from_millis(500))));
    }

    #[test]
    fn test_origin_rebases_points() {
        let steps = [InputStep::MoveTo(Point::new(110, 220))];
        let plan = plan_messages(&steps, Point::new(100, 200));
        assert_eq!(
            plan,
            vec![MessageStep::Send(WindowMessage {
                msg: WM_MOUSEMOVE,
                wparam: 0,
                lparam: make_point_lparam(Point::new(10, 20)),
            })]
        );
    }

    #[test]
    fn test_key_up_sets_transition_bits() {
        let steps = [InputStep::KeyDown(HidKeyCode::KeyA), InputStep::KeyUp(HidKeyCode::KeyA)];
        let plan = plan_messages(&steps, Point::new(0, 0));
        let MessageStep::Send(up) = plan[1] else { panic!("expected a message") };
        assert_eq!(up.msg, WM_KEYUP);
        assert_eq!(up.wparam, 0x41);
        assert_eq!(up.lparam as u32 & 0xC000_0000, 0xC000_0000);
    }

    fn sends(plan: &[MessageStep]) -> Vec<WindowMessage> {
        plan.iter()
            .filter_map(|s| match s {
                MessageStep::Send(m) => Some(*m),
                MessageStep::Pause(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_release_messages_balance_a_click_cut_after_button_down() {
        // Arrange: Ctrl + left-hold; delivery stopped after WM_LBUTTONDOWN.
        let intent = InjectionIntent::new(
            WindowId(1),
            IntentAction::Click { button: MouseButton::Left, at: Point::new(10, 20) },
        )
        .with_modifier(HidKeyCode::ControlLeft)
        .with_hold(Duration::from_millis(500));
        let all = sends(&plan_messages(&intent.steps(), Point::new(0, 0)));
        let delivered = &all[..3];

        // Act
        let releases = release_messages(delivered);

        // Assert: the same ups the full sequence would have sent, in order.
        assert_eq!(releases, all[3..].to_vec());
    }

    #[test]
    fn test_release_messages_empty_when_every_press_was_released() {
        let steps = [
            InputStep::KeyDown(HidKeyCode::KeyA),
            InputStep::KeyDown(HidKeyCode::KeyB),
            InputStep::KeyUp(HidKeyCode::KeyA),
        ];
        let delivered = sends(&plan_messages(&steps, Point::new(0, 0)));

        let releases = release_messages(&delivered);

        assert_eq!(releases.len(), 1);
        assert_eq!(releases[0].msg, WM_KEYUP);
        assert_eq!(releases[0].wparam, 0x42);
        assert!(release_messages(&delivered[..0]).is_empty());
    }
}
