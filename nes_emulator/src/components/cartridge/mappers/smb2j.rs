//! Mapper 040: the bootleg conversion of Super Mario Bros. 2 (Japan).
//!
//! PRG-ROM bank 6 is visible at $6000-$7FFF. A CPU cycle counter raises an IRQ 4096 cycles after
//! it has been enabled.
use serde::Deserialize;
use serde::Serialize;

use crate::components::cartridge::mapper::mapper_save_state;
use crate::components::cartridge::mapper::Mapper;
use crate::components::cartridge::mapper::MapperBase;

const IRQ_CYCLES: u16 = 4096;

#[derive(Serialize, Deserialize, Default, Clone, Copy, Debug)]
struct Registers {
    prg_bank: u8,
    irq_enabled: bool,
    irq_count: u16,
    irq_flag: bool,
}

pub struct Smb2j {
    base: MapperBase,
    registers: Registers,
}

impl Smb2j {
    pub fn new(base: MapperBase) -> Self {
        Self {
            base,
            registers: Registers::default(),
        }
    }
}

impl Mapper for Smb2j {
    fn base(&self) -> &MapperBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut MapperBase {
        &mut self.base
    }

    fn read_prg(&self, addr: u16) -> u8 {
        let bank = match addr {
            0x6000..=0x7FFF => 6,
            0x8000..=0x9FFF => 4,
            0xA000..=0xBFFF => 5,
            0xC000..=0xDFFF => self.registers.prg_bank as usize,
            _ => 7,
        };
        self.base.read_prg_bank(bank, 0x2000, addr)
    }

    fn write_prg(&mut self, addr: u16, value: u8) {
        match addr {
            0x8000..=0x9FFF => {
                self.registers.irq_enabled = false;
                self.registers.irq_count = 0;
                self.registers.irq_flag = false;
            }
            0xA000..=0xBFFF => self.registers.irq_enabled = true,
            0xE000..=0xFFFF => self.registers.prg_bank = value & 0x07,
            _ => (),
        }
    }

    fn peek_chr(&self, addr: u16) -> u8 {
        self.base.read_chr_bank(0, 0x2000, addr)
    }

    fn m2_cycle(&mut self) {
        let registers = &mut self.registers;
        if !registers.irq_enabled {
            return;
        }
        if registers.irq_count < IRQ_CYCLES {
            registers.irq_count += 1;
        } else {
            registers.irq_enabled = false;
            registers.irq_flag = true;
        }
    }

    fn irq_line(&self) -> bool {
        self.registers.irq_flag
    }

    fn read_extended_ram(&mut self, addr: u16) -> u8 {
        self.peek_extended_ram(addr)
    }

    fn peek_extended_ram(&self, addr: u16) -> u8 {
        if addr >= 0x6000 {
            self.read_prg(addr)
        } else {
            self.base.peek_extended_ram(addr)
        }
    }
}

mapper_save_state!(Smb2j);
