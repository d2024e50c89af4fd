//! Type for the status register and boilerplate for conversion and display
use std::str::FromStr;

use anyhow::bail;
use packed_struct::prelude::*;

#[derive(PackedStruct, Clone, Debug, Copy, PartialEq, Eq)]
#[packed_struct(bit_numbering = "msb0")]
pub struct StatusFlags {
    pub negative: bool,
    pub overflow: bool,
    /// Bit 5 has no function, it reads back as 1 when pushed.
    pub unused: bool,
    /// Only exists on the stack, set when pushed by BRK or PHP.
    pub break_flag: bool,
    pub decimal: bool,
    pub irq_disable: bool,
    pub zero: bool,
    pub carry: bool,
}

impl StatusFlags {
    pub fn format_string(&self) -> String {
        [
            (self.negative, 'N'),
            (self.overflow, 'V'),
            (self.unused, 'U'),
            (self.break_flag, 'B'),
            (self.decimal, 'D'),
            (self.irq_disable, 'I'),
            (self.zero, 'Z'),
            (self.carry, 'C'),
        ]
        .into_iter()
        .map(|(set, name)| if set { name } else { '.' })
        .collect()
    }

    pub fn update_negative_zero(&mut self, value: u8) {
        self.negative = value & 0x80 != 0;
        self.zero = value == 0;
    }
}

/// Power-up pattern: interrupts disabled, bits 4 and 5 set.
impl Default for StatusFlags {
    fn default() -> Self {
        StatusFlags::from(0x34)
    }
}

// The P register as pushed to and pulled from the stack.
impl From<u8> for StatusFlags {
    fn from(value: u8) -> Self {
        // Every bit pattern is valid, unpacking a single byte cannot fail.
        StatusFlags::unpack(&[value]).unwrap_or_else(|_| {
            let bit = |n: u8| value & (1 << n) != 0;
            StatusFlags {
                negative: bit(7),
                overflow: bit(6),
                unused: bit(5),
                break_flag: bit(4),
                decimal: bit(3),
                irq_disable: bit(2),
                zero: bit(1),
                carry: bit(0),
            }
        })
    }
}

impl From<StatusFlags> for u8 {
    fn from(value: StatusFlags) -> Self {
        value.pack().map(|bytes| bytes[0]).unwrap_or_default()
    }
}

impl FromStr for StatusFlags {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let flags: Vec<bool> = s.chars().map(|c| c != '.').collect();
        if flags.len() != 8 {
            bail!("StatusFlags string must be 8 characters long");
        }
        Ok(StatusFlags {
            negative: flags[0],
            overflow: flags[1],
            unused: flags[2],
            break_flag: flags[3],
            decimal: flags[4],
            irq_disable: flags[5],
            zero: flags[6],
            carry: flags[7],
        })
    }
}
