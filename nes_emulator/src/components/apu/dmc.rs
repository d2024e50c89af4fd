//! Delta modulation channel, playing 1-bit delta encoded samples from PRG memory.
use anyhow::ensure;
use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;

/// CPU cycles per output bit, indexed by the rate in bits 0-3 of $4010.
const RATES: [u16; 16] = [
    428, 380, 340, 320, 286, 254, 226, 214, 190, 160, 142, 128, 106, 84, 72, 54,
];

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dmc {
    irq_enabled: bool,
    pub irq_flag: bool,
    looping: bool,
    period: u16,
    timer: u16,
    output_level: u8,
    sample_address: u16,
    sample_length: u16,
    current_address: u16,
    bytes_remaining: u16,
    /// Byte fetched for the output unit, None when the buffer is empty.
    sample_buffer: Option<u8>,
    shift_register: u8,
    bits_remaining: u8,
    silenced: bool,
}

impl Default for Dmc {
    fn default() -> Self {
        Self {
            irq_enabled: false,
            irq_flag: false,
            looping: false,
            period: RATES[0],
            timer: RATES[0],
            output_level: 0,
            sample_address: 0xC000,
            sample_length: 1,
            current_address: 0xC000,
            bytes_remaining: 0,
            sample_buffer: None,
            shift_register: 0,
            bits_remaining: 8,
            silenced: true,
        }
    }
}

impl Dmc {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            RATES.contains(&self.period),
            "DMC rate {} out of range",
            self.period
        );
        ensure!(self.output_level <= 0x7F, "DMC output level out of range");
        ensure!(
            (1..=8).contains(&self.bits_remaining),
            "DMC bit counter out of range"
        );
        Ok(())
    }

    /// Writes register `index` (0-3) at $4010-$4013.
    pub fn write_register(&mut self, index: u16, value: u8) {
        match index {
            0 => {
                self.irq_enabled = value & 0x80 != 0;
                self.looping = value & 0x40 != 0;
                self.period = RATES[(value & 0x0F) as usize];
                if !self.irq_enabled {
                    self.irq_flag = false;
                }
            }
            1 => self.output_level = value & 0x7F,
            2 => self.sample_address = 0xC000 | ((value as u16) << 6),
            _ => self.sample_length = ((value as u16) << 4) + 1,
        }
    }

    /// Handles the DMC bit of a $4015 write.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.irq_flag = false;
        if !enabled {
            self.bytes_remaining = 0;
        } else if self.bytes_remaining == 0 {
            self.current_address = self.sample_address;
            self.bytes_remaining = self.sample_length;
        }
    }

    pub fn active(&self) -> bool {
        self.bytes_remaining > 0
    }

    /// Clocked every CPU cycle. Sample bytes are fetched through `read_sample`.
    pub fn clock(&mut self, read_sample: &mut impl FnMut(u16) -> u8) {
        if self.sample_buffer.is_none() && self.bytes_remaining > 0 {
            self.fetch(read_sample);
        }
        if self.timer > 0 {
            self.timer -= 1;
            return;
        }
        self.timer = self.period - 1;
        self.clock_output();
    }

    fn fetch(&mut self, read_sample: &mut impl FnMut(u16) -> u8) {
        self.sample_buffer = Some(read_sample(self.current_address));
        self.current_address = self.current_address.checked_add(1).unwrap_or(0x8000);
        self.bytes_remaining -= 1;
        if self.bytes_remaining == 0 {
            if self.looping {
                self.current_address = self.sample_address;
                self.bytes_remaining = self.sample_length;
            } else if self.irq_enabled {
                self.irq_flag = true;
            }
        }
    }

    fn clock_output(&mut self) {
        if !self.silenced {
            if self.shift_register & 1 != 0 {
                if self.output_level <= 125 {
                    self.output_level += 2;
                }
            } else if self.output_level >= 2 {
                self.output_level -= 2;
            }
            self.shift_register >>= 1;
        }
        self.bits_remaining -= 1;
        if self.bits_remaining == 0 {
            self.bits_remaining = 8;
            match self.sample_buffer.take() {
                Some(sample) => {
                    self.silenced = false;
                    self.shift_register = sample;
                }
                None => self.silenced = true,
            }
        }
    }

    pub fn output(&self) -> u8 {
        self.output_level
    }
}
