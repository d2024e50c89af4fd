//! Mapper 002: UxROM. A switchable 16 KB bank at $8000 and the last bank fixed at $C000.
use serde::Deserialize;
use serde::Serialize;

use crate::components::cartridge::mapper::mapper_save_state;
use crate::components::cartridge::mapper::Mapper;
use crate::components::cartridge::mapper::MapperBase;

#[derive(Serialize, Deserialize, Default, Clone, Copy, Debug)]
struct Registers {
    prg_bank: u8,
}

pub struct UxRom {
    base: MapperBase,
    registers: Registers,
}

impl UxRom {
    pub fn new(base: MapperBase) -> Self {
        Self {
            base,
            registers: Registers::default(),
        }
    }
}

impl Mapper for UxRom {
    fn base(&self) -> &MapperBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut MapperBase {
        &mut self.base
    }

    fn read_prg(&self, addr: u16) -> u8 {
        let bank = if addr < 0xC000 {
            self.registers.prg_bank as usize
        } else {
            self.base.prg_bank_count(0x4000) - 1
        };
        self.base.read_prg_bank(bank, 0x4000, addr)
    }

    fn write_prg(&mut self, addr: u16, value: u8) {
        if addr >= 0x8000 {
            self.registers.prg_bank = value;
        }
    }

    fn peek_chr(&self, addr: u16) -> u8 {
        self.base.read_chr_bank(0, 0x2000, addr)
    }
}

mapper_save_state!(UxRom);
