//! Mapper 011: Color Dreams. One register selecting a 32 KB PRG bank and an 8 KB CHR bank.
use serde::Deserialize;
use serde::Serialize;

use crate::components::cartridge::mapper::mapper_save_state;
use crate::components::cartridge::mapper::Mapper;
use crate::components::cartridge::mapper::MapperBase;

#[derive(Serialize, Deserialize, Default, Clone, Copy, Debug)]
struct Registers {
    prg_bank: u8,
    chr_bank: u8,
}

pub struct ColorDreams {
    base: MapperBase,
    registers: Registers,
}

impl ColorDreams {
    pub fn new(base: MapperBase) -> Self {
        Self {
            base,
            registers: Registers::default(),
        }
    }
}

impl Mapper for ColorDreams {
    fn base(&self) -> &MapperBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut MapperBase {
        &mut self.base
    }

    fn read_prg(&self, addr: u16) -> u8 {
        self.base
            .read_prg_bank(self.registers.prg_bank as usize, 0x8000, addr)
    }

    fn write_prg(&mut self, addr: u16, value: u8) {
        if addr >= 0x8000 {
            self.registers.prg_bank = value & 0x03;
            self.registers.chr_bank = value >> 4;
        }
    }

    fn peek_chr(&self, addr: u16) -> u8 {
        self.base
            .read_chr_bank(self.registers.chr_bank as usize, 0x2000, addr)
    }
}

mapper_save_state!(ColorDreams);
