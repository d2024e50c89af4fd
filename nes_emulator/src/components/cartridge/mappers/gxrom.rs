//! Mapper 066: GxROM. Bits 4-5 select a 32 KB PRG bank, bits 0-1 an 8 KB CHR bank.
use serde::Deserialize;
use serde::Serialize;

use crate::components::cartridge::mapper::mapper_save_state;
use crate::components::cartridge::mapper::Mapper;
use crate::components::cartridge::mapper::MapperBase;

#[derive(Serialize, Deserialize, Default, Clone, Copy, Debug)]
struct Registers {
    select: u8,
}

pub struct GxRom {
    base: MapperBase,
    registers: Registers,
}

impl GxRom {
    pub fn new(base: MapperBase) -> Self {
        Self {
            base,
            registers: Registers::default(),
        }
    }
}

impl Mapper for GxRom {
    fn base(&self) -> &MapperBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut MapperBase {
        &mut self.base
    }

    fn read_prg(&self, addr: u16) -> u8 {
        let bank = (self.registers.select >> 4) & 0x03;
        self.base.read_prg_bank(bank as usize, 0x8000, addr)
    }

    fn write_prg(&mut self, addr: u16, value: u8) {
        if addr >= 0x8000 {
            self.registers.select = value;
        }
    }

    fn peek_chr(&self, addr: u16) -> u8 {
        let bank = self.registers.select & 0x03;
        self.base.read_chr_bank(bank as usize, 0x2000, addr)
    }
}

mapper_save_state!(GxRom);
