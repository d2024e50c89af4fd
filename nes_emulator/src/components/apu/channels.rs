//! The pulse, triangle and noise channels and the units they are built from.
use anyhow::ensure;
use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;

/// Length counter load values, indexed by bits 3-7 of the length register.
const LENGTH_TABLE: [u8; 32] = [
    10, 254, 20, 2, 40, 4, 80, 6, 160, 8, 60, 10, 14, 12, 26, 14, 12, 16, 24, 18, 48, 20, 96, 22,
    192, 24, 72, 26, 16, 28, 32, 30,
];

const NOISE_PERIODS: [u16; 16] = [
    4, 8, 16, 32, 64, 96, 128, 160, 202, 254, 380, 508, 762, 1016, 2034, 4068,
];

const TRIANGLE_STEPS: [u8; 32] = [
    15, 14, 13, 12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12,
    13, 14, 15,
];

/// Waveforms of the four pulse duty settings, one bit per sequencer step.
const DUTY_WAVEFORMS: [u8; 4] = [0b0100_0000, 0b0110_0000, 0b0111_1000, 0b1001_1111];

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Envelope {
    start: bool,
    divider: u8,
    decay: u8,
    /// Constant volume, or the divider period when decaying.
    volume: u8,
    constant_volume: bool,
    looping: bool,
}

impl Envelope {
    fn validate(&self) -> Result<()> {
        ensure!(
            self.volume <= 15 && self.decay <= 15 && self.divider <= 15,
            "Envelope value out of range"
        );
        Ok(())
    }

    /// Applies bits 0-5 of the channel control register.
    fn write_control(&mut self, value: u8) {
        self.volume = value & 0x0F;
        self.constant_volume = value & 0x10 != 0;
        self.looping = value & 0x20 != 0;
    }

    fn restart(&mut self) {
        self.start = true;
    }

    /// Clocked by quarter frames.
    pub fn clock(&mut self) {
        if self.start {
            self.start = false;
            self.decay = 15;
            self.divider = self.volume;
        } else if self.divider > 0 {
            self.divider -= 1;
        } else {
            self.divider = self.volume;
            if self.decay > 0 {
                self.decay -= 1;
            } else if self.looping {
                self.decay = 15;
            }
        }
    }

    fn output(&self) -> u8 {
        if self.constant_volume {
            self.volume
        } else {
            self.decay
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LengthCounter {
    counter: u8,
    halted: bool,
    enabled: bool,
}

impl LengthCounter {
    fn load(&mut self, value: u8) {
        if self.enabled {
            self.counter = LENGTH_TABLE[(value >> 3) as usize];
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.counter = 0;
        }
    }

    /// Clocked by half frames.
    pub fn clock(&mut self) {
        if !self.halted && self.counter > 0 {
            self.counter -= 1;
        }
    }

    pub fn active(&self) -> bool {
        self.counter > 0
    }
}

/// Sweep unit of a pulse channel. Pulse 1 negates in one's complement, pulse 2 in two's
/// complement.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Sweep {
    enabled: bool,
    negate: bool,
    shift: u8,
    period: u8,
    divider: u8,
    reload: bool,
    ones_complement: bool,
}

impl Sweep {
    fn validate(&self) -> Result<()> {
        ensure!(
            self.shift < 8 && self.period < 8 && self.divider < 8,
            "Sweep value out of range"
        );
        Ok(())
    }

    fn write(&mut self, value: u8) {
        self.enabled = value & 0x80 != 0;
        self.period = (value >> 4) & 0x07;
        self.negate = value & 0x08 != 0;
        self.shift = value & 0x07;
        self.reload = true;
    }

    fn target(&self, period: u16) -> u16 {
        let change = period >> self.shift;
        match (self.negate, self.ones_complement) {
            (false, _) => period.wrapping_add(change),
            (true, true) => period.wrapping_sub(change).wrapping_sub(1),
            (true, false) => period.wrapping_sub(change),
        }
    }

    fn mutes(&self, period: u16) -> bool {
        period < 8 || self.target(period) > 0x7FF
    }

    /// Clocked by half frames, returns the new channel period.
    fn clock(&mut self, period: u16) -> u16 {
        let mut new_period = period;
        if self.divider == 0 && self.enabled && self.shift > 0 && !self.mutes(period) {
            new_period = self.target(period);
        }
        if self.divider == 0 || self.reload {
            self.divider = self.period;
            self.reload = false;
        } else {
            self.divider -= 1;
        }
        new_period
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pulse {
    period: u16,
    timer: u16,
    step: u8,
    duty: u8,
    pub envelope: Envelope,
    pub length: LengthCounter,
    sweep: Sweep,
}

impl Pulse {
    pub fn new(ones_complement: bool) -> Self {
        Self {
            sweep: Sweep {
                ones_complement,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Checks a decoded channel for values its registers cannot produce.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.duty < 4, "Pulse duty {} out of range", self.duty);
        ensure!(self.step < 8, "Pulse step {} out of range", self.step);
        ensure!(
            self.period <= 0x7FF && self.timer <= 0x7FF,
            "Pulse period out of range"
        );
        self.sweep.validate()?;
        self.envelope.validate()
    }

    /// Writes register `index` (0-3) of the channel.
    pub fn write_register(&mut self, index: u16, value: u8) {
        match index {
            0 => {
                self.duty = value >> 6;
                self.length.halted = value & 0x20 != 0;
                self.envelope.write_control(value);
            }
            1 => self.sweep.write(value),
            2 => self.period = (self.period & 0x0700) | value as u16,
            _ => {
                self.period = (self.period & 0x00FF) | ((value as u16 & 0x07) << 8);
                self.length.load(value);
                self.envelope.restart();
                self.step = 0;
            }
        }
    }

    /// Clocked every other CPU cycle.
    pub fn clock_timer(&mut self) {
        if self.timer == 0 {
            self.timer = self.period;
            self.step = (self.step + 1) & 7;
        } else {
            self.timer -= 1;
        }
    }

    pub fn clock_sweep(&mut self) {
        self.period = self.sweep.clock(self.period);
    }

    pub fn output(&self) -> u8 {
        let high = DUTY_WAVEFORMS[self.duty as usize] & (0x80 >> self.step) != 0;
        if !high || !self.length.active() || self.sweep.mutes(self.period) {
            return 0;
        }
        self.envelope.output()
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Triangle {
    period: u16,
    timer: u16,
    step: u8,
    pub length: LengthCounter,
    linear_counter: u8,
    linear_reload_value: u8,
    linear_reload: bool,
    control: bool,
}

impl Triangle {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.step < 32, "Triangle step {} out of range", self.step);
        ensure!(
            self.period <= 0x7FF && self.timer <= 0x7FF,
            "Triangle period out of range"
        );
        ensure!(self.linear_counter <= 0x7F, "Linear counter out of range");
        Ok(())
    }

    pub fn write_register(&mut self, index: u16, value: u8) {
        match index {
            0 => {
                self.control = value & 0x80 != 0;
                self.length.halted = self.control;
                self.linear_reload_value = value & 0x7F;
            }
            1 => (),
            2 => self.period = (self.period & 0x0700) | value as u16,
            _ => {
                self.period = (self.period & 0x00FF) | ((value as u16 & 0x07) << 8);
                self.length.load(value);
                self.linear_reload = true;
            }
        }
    }

    /// Clocked every CPU cycle.
    pub fn clock_timer(&mut self) {
        if self.timer > 0 {
            self.timer -= 1;
            return;
        }
        self.timer = self.period;
        if self.length.active() && self.linear_counter > 0 {
            self.step = (self.step + 1) & 31;
        }
    }

    /// Clocked by quarter frames.
    pub fn clock_linear_counter(&mut self) {
        if self.linear_reload {
            self.linear_counter = self.linear_reload_value;
        } else if self.linear_counter > 0 {
            self.linear_counter -= 1;
        }
        if !self.control {
            self.linear_reload = false;
        }
    }

    pub fn output(&self) -> u8 {
        // Ultrasonic periods are silenced instead of aliasing.
        if !self.length.active() || self.linear_counter == 0 || self.period < 2 {
            return 0;
        }
        TRIANGLE_STEPS[self.step as usize]
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Noise {
    period: u16,
    timer: u16,
    /// 15 bit linear feedback shift register.
    lfsr: u16,
    short_mode: bool,
    pub envelope: Envelope,
    pub length: LengthCounter,
}

impl Default for Noise {
    fn default() -> Self {
        Self {
            period: NOISE_PERIODS[0],
            timer: 0,
            lfsr: 1,
            short_mode: false,
            envelope: Envelope::default(),
            length: LengthCounter::default(),
        }
    }
}

impl Noise {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            NOISE_PERIODS.contains(&self.period),
            "Noise period {} out of range",
            self.period
        );
        ensure!(self.lfsr <= 0x7FFF, "Noise shift register out of range");
        self.envelope.validate()
    }

    pub fn write_register(&mut self, index: u16, value: u8) {
        match index {
            0 => {
                self.length.halted = value & 0x20 != 0;
                self.envelope.write_control(value);
            }
            1 => (),
            2 => {
                self.short_mode = value & 0x80 != 0;
                self.period = NOISE_PERIODS[(value & 0x0F) as usize];
            }
            _ => {
                self.length.load(value);
                self.envelope.restart();
            }
        }
    }

    /// Clocked every other CPU cycle.
    pub fn clock_timer(&mut self) {
        if self.timer > 0 {
            self.timer -= 1;
            return;
        }
        self.timer = self.period;
        let tap = if self.short_mode { 6 } else { 1 };
        let feedback = (self.lfsr ^ (self.lfsr >> tap)) & 1;
        self.lfsr = (self.lfsr >> 1) | (feedback << 14);
    }

    pub fn output(&self) -> u8 {
        if !self.length.active() || self.lfsr & 1 != 0 {
            return 0;
        }
        self.envelope.output()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_pulse() -> Pulse {
        let mut pulse = Pulse::new(true);
        pulse.length.set_enabled(true);
        pulse
    }

    #[test]
    fn test_length_counter_loads_only_when_enabled() {
        let mut pulse = Pulse::new(true);
        pulse.write_register(3, 0x08);
        assert!(!pulse.length.active());

        let mut pulse = enabled_pulse();
        pulse.write_register(3, 0x08);
        assert!(pulse.length.active());
        // Entry 1 of the table is 254 half frames.
        for _ in 0..253 {
            pulse.length.clock();
        }
        assert!(pulse.length.active());
        pulse.length.clock();
        assert!(!pulse.length.active());
    }

    #[test]
    fn test_halted_length_counter() {
        let mut pulse = enabled_pulse();
        pulse.write_register(0, 0x20);
        pulse.write_register(3, 0x18);
        for _ in 0..10 {
            pulse.length.clock();
        }
        assert!(pulse.length.active());
    }

    #[test]
    fn test_envelope_decays_and_loops() {
        let mut envelope = Envelope::default();
        envelope.write_control(0x20);
        envelope.restart();
        envelope.clock();
        assert_eq!(envelope.output(), 15);
        for _ in 0..15 {
            envelope.clock();
        }
        assert_eq!(envelope.output(), 0);
        envelope.clock();
        assert_eq!(envelope.output(), 15);

        envelope.write_control(0x17);
        assert_eq!(envelope.output(), 7);
    }

    #[test]
    fn test_pulse_duty_sequence() {
        let mut pulse = enabled_pulse();
        // 50% duty, constant volume 9, period 8.
        pulse.write_register(0, 0x99);
        pulse.write_register(2, 0x08);
        pulse.write_register(3, 0x08);
        let mut outputs = Vec::new();
        for _ in 0..8 {
            outputs.push(pulse.output());
            for _ in 0..9 {
                pulse.clock_timer();
            }
        }
        assert_eq!(outputs, vec![0, 9, 9, 9, 9, 0, 0, 0]);
    }

    #[test]
    fn test_sweep_mutes_low_periods() {
        let mut pulse = enabled_pulse();
        pulse.write_register(0, 0xBF);
        pulse.write_register(2, 0x04);
        pulse.write_register(3, 0x08);
        for _ in 0..5 {
            pulse.clock_timer();
        }
        assert_eq!(pulse.output(), 0);
    }

    #[test]
    fn test_sweep_negation_differs_between_channels() {
        let mut one = Sweep {
            negate: true,
            shift: 1,
            ones_complement: true,
            ..Default::default()
        };
        assert_eq!(one.target(0x100), 0x7F);
        one.ones_complement = false;
        assert_eq!(one.target(0x100), 0x80);
    }

    #[test]
    fn test_triangle_needs_linear_counter() {
        let mut triangle = Triangle::default();
        triangle.length.set_enabled(true);
        triangle.write_register(2, 0x10);
        triangle.write_register(3, 0x08);
        assert_eq!(triangle.output(), 0);
        triangle.write_register(0, 0x7F);
        triangle.clock_linear_counter();
        assert_eq!(triangle.output(), 15);
        for _ in 0..17 {
            triangle.clock_timer();
        }
        assert_eq!(triangle.output(), 14);
    }

    #[test]
    fn test_noise_lfsr() {
        let mut noise = Noise::default();
        noise.write_register(2, 0x00);
        let mut lfsr = Vec::new();
        for _ in 0..3 {
            noise.clock_timer();
            lfsr.push(noise.lfsr);
            for _ in 0..4 {
                noise.clock_timer();
            }
        }
        assert_eq!(lfsr, vec![0x4000, 0x2000, 0x1000]);
    }

    #[test]
    fn test_validate_rejects_out_of_range_sequencers() {
        let mut pulse = enabled_pulse();
        pulse.write_register(0, 0xFF);
        pulse.write_register(1, 0xFF);
        pulse.write_register(3, 0xFF);
        assert!(pulse.validate().is_ok());
        assert!(Pulse { duty: 4, ..pulse }.validate().is_err());
        assert!(Pulse { step: 8, ..pulse }.validate().is_err());

        let mut envelope = pulse.envelope;
        envelope.decay = 16;
        assert!(Pulse { envelope, ..pulse }.validate().is_err());

        let triangle = Triangle::default();
        assert!(triangle.validate().is_ok());
        assert!(Triangle { step: 32, ..triangle }.validate().is_err());

        let noise = Noise::default();
        assert!(noise.validate().is_ok());
        assert!(Noise { period: 5, ..noise }.validate().is_err());
    }
}
