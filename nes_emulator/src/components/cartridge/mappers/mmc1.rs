//! Mapper 001: Nintendo MMC1.
//!
//! Registers are loaded serially: five writes of bit 0, the fifth write selects the target
//! register by address bits 13 and 14. A write with bit 7 set resets the shift register.
use anyhow::ensure;
use anyhow::Result;
use log::debug;
use serde::Deserialize;
use serde::Serialize;

use crate::components::cartridge::mapper::mapper_save_state;
use crate::components::cartridge::mapper::Mapper;
use crate::components::cartridge::mapper::MapperBase;
use crate::components::cartridge::rom_data::Mirroring;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
struct Registers {
    shift: u8,
    write_count: u8,
    control: u8,
    chr_bank0: u8,
    chr_bank1: u8,
    prg_bank: u8,
}

impl Default for Registers {
    fn default() -> Self {
        Self {
            shift: 0,
            write_count: 0,
            // PRG mode 3: $8000 switchable, $C000 fixed to the last bank.
            control: 0x0C,
            chr_bank0: 0,
            chr_bank1: 0,
            prg_bank: 0,
        }
    }
}

pub struct Mmc1 {
    base: MapperBase,
    registers: Registers,
}

impl Mmc1 {
    pub fn new(base: MapperBase) -> Self {
        Self {
            base,
            registers: Registers::default(),
        }
    }

    fn check_registers(&self, registers: &Registers) -> Result<()> {
        ensure!(
            registers.write_count < 5 && registers.shift < 0x20,
            "MMC1 shift register out of range"
        );
        Ok(())
    }

    fn prg_mode(&self) -> u8 {
        (self.registers.control >> 2) & 3
    }

    fn chr_4k_mode(&self) -> bool {
        self.registers.control & 0x10 != 0
    }

    fn load_register(&mut self, addr: u16, value: u8) {
        match addr {
            0x8000..=0x9FFF => self.registers.control = value,
            0xA000..=0xBFFF => self.registers.chr_bank0 = value,
            0xC000..=0xDFFF => self.registers.chr_bank1 = value,
            _ => {
                if value & 0x10 != 0 {
                    debug!("MMC1 PRG-RAM disabled");
                }
                self.registers.prg_bank = value & 0x0F;
            }
        }
    }
}

impl Mapper for Mmc1 {
    fn base(&self) -> &MapperBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut MapperBase {
        &mut self.base
    }

    fn read_prg(&self, addr: u16) -> u8 {
        let prg_bank = self.registers.prg_bank as usize;
        let last_bank = self.base.prg_bank_count(0x4000) - 1;
        let high = addr >= 0xC000;
        let bank = match self.prg_mode() {
            0 | 1 => (prg_bank & !1) | high as usize,
            2 => {
                if high {
                    prg_bank
                } else {
                    0
                }
            }
            _ => {
                if high {
                    last_bank
                } else {
                    prg_bank
                }
            }
        };
        self.base.read_prg_bank(bank, 0x4000, addr)
    }

    fn write_prg(&mut self, addr: u16, value: u8) {
        if addr < 0x8000 {
            return;
        }
        if value & 0x80 != 0 {
            self.registers.shift = 0;
            self.registers.write_count = 0;
            self.registers.control |= 0x0C;
            return;
        }
        self.registers.shift = (self.registers.shift >> 1) | ((value & 1) << 4);
        self.registers.write_count += 1;
        if self.registers.write_count == 5 {
            let value = self.registers.shift;
            self.load_register(addr, value);
            self.registers.shift = 0;
            self.registers.write_count = 0;
        }
    }

    fn peek_chr(&self, addr: u16) -> u8 {
        if self.base.uses_chr_ram() {
            return self.base.read_chr_bank(0, 0x2000, addr);
        }
        let bank = if self.chr_4k_mode() {
            if addr < 0x1000 {
                self.registers.chr_bank0
            } else {
                self.registers.chr_bank1
            }
        } else {
            (self.registers.chr_bank0 & 0x1E) | (addr >= 0x1000) as u8
        };
        self.base.read_chr_bank(bank as usize, 0x1000, addr)
    }

    fn mirroring(&self) -> Mirroring {
        match self.registers.control & 3 {
            0 => Mirroring::OneScreenLow,
            1 => Mirroring::OneScreenHigh,
            2 => Mirroring::Vertical,
            _ => Mirroring::Horizontal,
        }
    }

    fn reset(&mut self) {
        self.registers = Registers::default();
    }
}

mapper_save_state!(Mmc1, check_registers);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::save_state::SaveStateComponent;
    use crate::common::save_state::STATE_VERSION;
    use crate::components::cartridge::mapper::test::banked_mapper;

    fn serial_write(mapper: &mut dyn Mapper, addr: u16, value: u8) {
        for bit in 0..5 {
            mapper.write_prg(addr, (value >> bit) & 1);
        }
    }

    #[test]
    fn test_power_on_fixes_last_bank() {
        let mapper = banked_mapper(1, 8, 2);
        assert_eq!(mapper.read_prg(0x8000), 0);
        assert_eq!(mapper.read_prg(0xC000), 14);
        assert_eq!(mapper.read_prg(0xE000), 15);
    }

    #[test]
    fn test_serial_prg_bank_switch() {
        let mut mapper = banked_mapper(1, 8, 2);
        serial_write(mapper.as_mut(), 0xE000, 3);
        assert_eq!(mapper.read_prg(0x8000), 6);
        assert_eq!(mapper.read_prg(0xC000), 14);

        // 32 KB mode ignores the low bit of the bank number.
        serial_write(mapper.as_mut(), 0x8000, 0x00);
        assert_eq!(mapper.read_prg(0x8000), 4);
        assert_eq!(mapper.read_prg(0xC000), 6);
        assert_eq!(mapper.mirroring(), Mirroring::OneScreenLow);
    }

    #[test]
    fn test_reset_bit_restores_prg_mode() {
        let mut mapper = banked_mapper(1, 8, 2);
        serial_write(mapper.as_mut(), 0x8000, 0x02);
        assert_eq!(mapper.mirroring(), Mirroring::Vertical);
        mapper.write_prg(0x8000, 1);
        mapper.write_prg(0x8000, 0x80);
        serial_write(mapper.as_mut(), 0xE000, 1);
        assert_eq!(mapper.read_prg(0x8000), 2);
        assert_eq!(mapper.read_prg(0xC000), 14);
    }

    #[test]
    fn test_chr_4k_mode() {
        let mut mapper = banked_mapper(1, 2, 4);
        serial_write(mapper.as_mut(), 0x8000, 0x13);
        serial_write(mapper.as_mut(), 0xA000, 2);
        serial_write(mapper.as_mut(), 0xC000, 5);
        assert_eq!(mapper.read_chr(0x0000), 8);
        assert_eq!(mapper.read_chr(0x1000), 20);
        assert_eq!(mapper.mirroring(), Mirroring::Horizontal);
    }

    #[test]
    fn test_restore_rejects_overfull_shift_register() {
        let mut mapper = banked_mapper(1, 8, 2);
        mapper.write_prg(0xE000, 1);
        let mut state = Vec::new();
        mapper.save_state(&mut state).unwrap();

        // Registers are the trailing six bytes: shift, write_count, control, banks.
        let write_count = state.len() - 5;
        let mut corrupt = state.clone();
        corrupt[write_count] = 9;
        assert!(mapper.load_state(STATE_VERSION, &mut &corrupt[..]).is_err());

        mapper.load_state(STATE_VERSION, &mut &state[..]).unwrap();
        mapper.write_prg(0xE000, 1);
        mapper.write_prg(0xE000, 0);
        mapper.write_prg(0xE000, 0);
        mapper.write_prg(0xE000, 0);
        // The restored first write and these four load bank 3.
        assert_eq!(mapper.read_prg(0x8000), 6);
    }
}
