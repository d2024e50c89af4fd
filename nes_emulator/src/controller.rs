//! Devices on the two controller ports at $4016/$4017.
use packed_struct::prelude::*;
use serde::Deserialize;
use serde::Serialize;

use crate::devices::Button;
use crate::devices::InputDevice;

/// Bits 5-7 of controller reads are open bus, which holds the high byte of $4016.
const OPEN_BUS: u8 = 0x40;

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum ControllerType {
    #[default]
    Standard,
    Zapper,
}

/// Titles that are played with a light gun in port 2, by ROM checksum.
static ZAPPER_TITLES: &[u32] = &[];

/// Controller types of both ports for the title with checksum `crc`.
pub fn default_controller_types(crc: u32) -> [ControllerType; 2] {
    if ZAPPER_TITLES.contains(&crc) {
        [ControllerType::Standard, ControllerType::Zapper]
    } else {
        [ControllerType::Standard; 2]
    }
}

/// Standard controller shift register layout, read out starting at bit 0:
/// 7  bit  0
/// ---- ----
/// RLDU sSBA
/// |||| ||||
/// |||| |||+- A
/// |||| ||+-- B
/// |||| |+--- Select (s)
/// |||| +---- Start (S)
/// ++++------ D-pad
#[derive(PackedStruct, Clone, Default, Debug, Copy, PartialEq, Eq)]
#[packed_struct(bit_numbering = "msb0")]
pub struct ButtonState {
    pub right: bool,
    pub left: bool,
    pub down: bool,
    pub up: bool,
    pub start: bool,
    pub select: bool,
    pub b: bool,
    pub a: bool,
}

impl ButtonState {
    /// Samples the buttons of `port`. A pad cannot press opposite directions at the same time,
    /// so both are released when the input device reports them.
    pub fn from_input(input: &dyn InputDevice, port: usize) -> Self {
        let pressed = |button| input.is_pressed(port, button);
        let (up, down) = (pressed(Button::Up), pressed(Button::Down));
        let (left, right) = (pressed(Button::Left), pressed(Button::Right));
        Self {
            a: pressed(Button::A),
            b: pressed(Button::B),
            select: pressed(Button::Select),
            start: pressed(Button::Start),
            up: up && !down,
            down: down && !up,
            left: left && !right,
            right: right && !left,
        }
    }

    pub fn to_u8(self) -> u8 {
        self.pack().map(|bytes| bytes[0]).unwrap_or_default()
    }
}

pub struct Controller {
    port: usize,
    controller_type: ControllerType,
    strobe: bool,
    shift: u8,
}

impl Controller {
    pub fn new(port: usize) -> Self {
        Self {
            port,
            controller_type: ControllerType::Standard,
            strobe: false,
            shift: 0,
        }
    }

    pub fn controller_type(&self) -> ControllerType {
        self.controller_type
    }

    pub fn set_controller_type(&mut self, controller_type: ControllerType) {
        self.controller_type = controller_type;
    }

    pub fn reset(&mut self) {
        self.strobe = false;
        self.shift = 0;
    }

    /// Bit 0 of writes to $4016 is the strobe line shared by both ports. The shift register is
    /// reloaded while strobe is high.
    pub fn write_strobe(&mut self, value: u8, input: &dyn InputDevice) {
        self.strobe = value & 1 != 0;
        if self.strobe {
            self.shift = ButtonState::from_input(input, self.port).to_u8();
        }
    }

    pub fn read(&mut self, input: &dyn InputDevice) -> u8 {
        match self.controller_type {
            ControllerType::Standard => {
                if self.strobe {
                    self.shift = ButtonState::from_input(input, self.port).to_u8();
                }
                let value = self.shift & 1;
                // Once all 8 buttons are read, the register returns 1s.
                self.shift = (self.shift >> 1) | 0x80;
                OPEN_BUS | value
            }
            ControllerType::Zapper => self.read_zapper(input),
        }
    }

    pub fn peek(&self, input: &dyn InputDevice) -> u8 {
        match self.controller_type {
            ControllerType::Standard if self.strobe => {
                OPEN_BUS | (ButtonState::from_input(input, self.port).to_u8() & 1)
            }
            ControllerType::Standard => OPEN_BUS | (self.shift & 1),
            ControllerType::Zapper => self.read_zapper(input),
        }
    }

    /// Zapper read layout:
    /// 7  bit  0
    /// ---- ----
    /// xxxT Lxxx
    ///    | |
    ///    | +---- Light sense (0: light detected, 1: no light)
    ///    +------ Trigger (1: pulled)
    fn read_zapper(&self, input: &dyn InputDevice) -> u8 {
        let state = input.zapper_state(self.port);
        let mut value = OPEN_BUS;
        if !state.light_sensed {
            value |= 0x08;
        }
        if state.trigger {
            value |= 0x10;
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::devices::ZapperState;

    #[derive(Default)]
    struct TestInput {
        pressed: HashSet<(usize, Button)>,
        zapper: ZapperState,
    }

    impl TestInput {
        fn with_buttons(port: usize, buttons: &[Button]) -> Self {
            Self {
                pressed: buttons.iter().map(|button| (port, *button)).collect(),
                zapper: ZapperState::default(),
            }
        }
    }

    impl InputDevice for TestInput {
        fn is_pressed(&self, port: usize, button: Button) -> bool {
            self.pressed.contains(&(port, button))
        }

        fn zapper_state(&self, _port: usize) -> ZapperState {
            self.zapper
        }
    }

    fn read_buttons(controller: &mut Controller, input: &TestInput) -> Vec<u8> {
        controller.write_strobe(1, input);
        controller.write_strobe(0, input);
        (0..8).map(|_| controller.read(input) & 1).collect()
    }

    #[test]
    fn test_button_order() {
        let input = TestInput::with_buttons(0, &[Button::A, Button::Start, Button::Left]);
        let mut controller = Controller::new(0);
        assert_eq!(read_buttons(&mut controller, &input), vec![1, 0, 0, 1, 0, 0, 1, 0]);
        // Further reads return 1.
        assert_eq!(controller.read(&input), 0x41);
    }

    #[test]
    fn test_ports_are_independent() {
        let input = TestInput::with_buttons(1, &[Button::B]);
        let mut controller = Controller::new(0);
        assert_eq!(read_buttons(&mut controller, &input), vec![0; 8]);
        let mut controller = Controller::new(1);
        assert_eq!(read_buttons(&mut controller, &input), vec![0, 1, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_opposite_directions_are_suppressed() {
        let input = TestInput::with_buttons(
            0,
            &[Button::Up, Button::Down, Button::Left, Button::Right, Button::B],
        );
        let mut controller = Controller::new(0);
        assert_eq!(read_buttons(&mut controller, &input), vec![0, 1, 0, 0, 0, 0, 0, 0]);

        let input = TestInput::with_buttons(0, &[Button::Down, Button::Right]);
        assert_eq!(read_buttons(&mut controller, &input), vec![0, 0, 0, 0, 0, 1, 0, 1]);
    }

    #[test]
    fn test_strobe_high_returns_button_a() {
        let input = TestInput::with_buttons(0, &[Button::A]);
        let mut controller = Controller::new(0);
        controller.write_strobe(1, &input);
        for _ in 0..10 {
            assert_eq!(controller.read(&input), 0x41);
        }
        assert_eq!(controller.peek(&input), 0x41);
    }

    #[test]
    fn test_zapper() {
        let mut input = TestInput::default();
        let mut controller = Controller::new(1);
        controller.set_controller_type(ControllerType::Zapper);
        assert_eq!(controller.read(&input), 0x48);
        input.zapper = ZapperState {
            trigger: true,
            light_sensed: true,
        };
        assert_eq!(controller.read(&input), 0x50);
    }

    #[test]
    fn test_controller_type_parsing() {
        assert_eq!("zapper".parse::<ControllerType>().unwrap(), ControllerType::Zapper);
        assert_eq!(ControllerType::Standard.to_string(), "Standard");
        assert_eq!(default_controller_types(0), [ControllerType::Standard; 2]);
    }
}
