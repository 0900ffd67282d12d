//! FBV ⇄ POD translation rules and the control role.
//!
//! The FBV sends controller changes for its pedals and buttons; the POD
//! wants program changes for preset selection plus a few remapped
//! controllers. Program changes coming back from the POD (e.g. preset knob
//! turned on the unit itself) keep the FBV's idea of the active bank and
//! button in sync so the next press does the right thing.

use podfbv_midi::{Message, ShortMessage, Tic};
use tracing::{debug, trace};

use crate::role::{Endpoint, Pipeline, RoleHandle};

/// Minimum pedal travel, in controller steps, before a new value is sent.
pub const PEDAL_THRESHOLD: u8 = 2;

/// Presets per bank; one per FBV button.
pub const BUTTONS_PER_BANK: u8 = 4;

/// Highest program number the POD accepts.
pub const MAX_PROGRAM: u8 = 0x7F;

/// Controller numbers on the FBV and POD side.
pub mod cc {
    pub const VOLUME: u8 = 0x07;
    pub const EXPRESSION: u8 = 0x0B;
    pub const BUTTON_A: u8 = 0x14;
    pub const BUTTON_B: u8 = 0x15;
    pub const BUTTON_C: u8 = 0x16;
    pub const BUTTON_D: u8 = 0x17;
    pub const FOOT_SWITCH: u8 = 0x66;

    /// POD expression (wah) pedal.
    pub const POD_EXPRESSION: u8 = 0x04;
    /// POD stomp box on/off.
    pub const POD_FOOT_SWITCH: u8 = 0x2B;
    /// POD tap tempo.
    pub const TAP: u8 = 0x40;
}

const TAP_VALUE: u8 = 0x7F;
const SWITCH_ON: u8 = 0x40;
const SWITCH_OFF: u8 = 0x00;

/// One of the four preset buttons of the FBV.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Button {
    A,
    B,
    C,
    D,
}

impl Button {
    pub const ALL: [Button; 4] = [Button::A, Button::B, Button::C, Button::D];

    pub fn from_controller(controller: u8) -> Option<Button> {
        match controller {
            cc::BUTTON_A => Some(Button::A),
            cc::BUTTON_B => Some(Button::B),
            cc::BUTTON_C => Some(Button::C),
            cc::BUTTON_D => Some(Button::D),
            _ => None,
        }
    }

    pub fn from_index(index: u8) -> Option<Button> {
        Button::ALL.get(usize::from(index)).copied()
    }

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// What the translator remembers between messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControllerState {
    pub bank: u8,
    /// Button whose preset is active, if any.
    pub button: Option<Button>,
    /// Last volume value forwarded.
    pub volume: u8,
    /// Last expression value forwarded.
    pub expression: u8,
    pub pressed: [Tic; 4],
    pub released: [Tic; 4],
}

impl ControllerState {
    pub fn new(start: Tic) -> Self {
        Self {
            bank: 0,
            button: None,
            volume: 0,
            expression: 0,
            pressed: [start; 4],
            released: [start; 4],
        }
    }

    /// POD program selected by `button` in the current bank, 1-based.
    /// `None` past the last program (127).
    pub fn program(&self, button: Button) -> Option<u8> {
        let program =
            u16::from(self.bank) * u16::from(BUTTONS_PER_BANK) + button.index() as u16 + 1;
        u8::try_from(program).ok().filter(|program| *program <= MAX_PROGRAM)
    }

    /// Translate a message read from the FBV. `None` means nothing goes to
    /// the POD.
    pub fn fbv_to_pod(&mut self, msg: &Message) -> Option<Message> {
        let ShortMessage::ControlChange { controller, value } = msg.kind()? else {
            return None;
        };
        let tic = msg.tic();

        let out = match controller {
            cc::VOLUME => {
                if !follow_pedal(&mut self.volume, value) {
                    return None;
                }
                *msg
            }
            cc::EXPRESSION => {
                if !follow_pedal(&mut self.expression, value) {
                    return None;
                }
                Message::control_change(cc::POD_EXPRESSION, value)
            }
            cc::FOOT_SWITCH => {
                let state = if value != 0 { SWITCH_ON } else { SWITCH_OFF };
                Message::control_change(cc::POD_FOOT_SWITCH, state)
            }
            _ => {
                let button = Button::from_controller(controller)?;
                if value == 0 {
                    self.released[button.index()] = tic;
                    return None;
                }
                self.pressed[button.index()] = tic;
                if self.button == Some(button) {
                    Message::control_change(cc::TAP, TAP_VALUE)
                } else {
                    let Some(program) = self.program(button) else {
                        debug!("No program for {:?} in bank {}", button, self.bank);
                        return None;
                    };
                    self.button = Some(button);
                    Message::program_change(program)
                }
            }
        };
        Some(out.with_tic(tic))
    }

    /// Apply a message read from the POD. Nothing is ever forwarded to the
    /// FBV; program changes only move the bank/button selection.
    pub fn pod_to_fbv(&mut self, msg: &Message) -> Option<Message> {
        if let Some(ShortMessage::ProgramChange { program }) = msg.kind() {
            // Program 0 has no button.
            if let Some(index) = program.checked_sub(1) {
                self.bank = index / BUTTONS_PER_BANK;
                self.button = Button::from_index(index % BUTTONS_PER_BANK);
            }
        }
        None
    }

    fn translate(&mut self, from: Endpoint, msg: &Message) -> Option<Message> {
        match from {
            Endpoint::Fbv => self.fbv_to_pod(msg),
            Endpoint::Pod => self.pod_to_fbv(msg),
        }
    }
}

/// Hysteresis: accept `value` only if it moved far enough from `last`.
fn follow_pedal(last: &mut u8, value: u8) -> bool {
    if value.abs_diff(*last) < PEDAL_THRESHOLD {
        return false;
    }
    *last = value;
    true
}

/// What one translation step did, so the caller knows whom to wake.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Step {
    consumed: bool,
    published: bool,
}

/// Move at most one message from the input slot of `from` to the output slot
/// of its peer. Skipped entirely while the output slot is occupied so the
/// inbound message waits instead of being lost.
fn step(pipeline: &mut Pipeline, from: Endpoint, back: &mut Message) -> Step {
    let to = from.peer();
    let Some(msg) = pipeline.slots.input(from).pending().copied() else {
        return Step::default();
    };
    if !pipeline.slots.output(to).is_free() {
        return Step::default();
    }

    trace!("{} > CTL {:?}", from, msg);
    let mut published = false;
    match pipeline.state.translate(from, &msg) {
        Some(out) => {
            trace!("{} < CTL {:?}", to, out);
            *back = out;
            published = pipeline.slots.output(to).publish(back).is_ok();
        }
        None => trace!("{} message dropped", from),
    }
    pipeline.slots.input(from).consume();
    Step {
        consumed: true,
        published,
    }
}

/// The control role: translate until the control flag is cleared.
pub fn run_control(handle: RoleHandle) {
    let mut fbv_back = Message::default();
    let mut pod_back = Message::default();

    debug!("{} started", handle.role());
    let mut guard = handle.lock();
    while handle.is_running(&guard) {
        for (from, back) in [(Endpoint::Fbv, &mut fbv_back), (Endpoint::Pod, &mut pod_back)] {
            let done = step(&mut guard, from, back);
            if done.published {
                handle.notify(from.peer().output_role());
            }
            if done.consumed {
                handle.notify(from.input_role());
            }
        }
        handle.wait(&mut guard);
    }
    handle.exit(guard);
}
