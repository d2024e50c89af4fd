//! Mapper 007: AxROM. 32 KB PRG banks and single screen mirroring selected by bit 4.
use serde::Deserialize;
use serde::Serialize;

use crate::components::cartridge::mapper::mapper_save_state;
use crate::components::cartridge::mapper::Mapper;
use crate::components::cartridge::mapper::MapperBase;
use crate::components::cartridge::rom_data::Mirroring;

#[derive(Serialize, Deserialize, Default, Clone, Copy, Debug)]
struct Registers {
    prg_bank: u8,
    high_nametable: bool,
}

pub struct AxRom {
    base: MapperBase,
    registers: Registers,
}

impl AxRom {
    pub fn new(base: MapperBase) -> Self {
        Self {
            base,
            registers: Registers::default(),
        }
    }
}

impl Mapper for AxRom {
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
            self.registers.prg_bank = value & 0x07;
            self.registers.high_nametable = value & 0x10 != 0;
        }
    }

    fn peek_chr(&self, addr: u16) -> u8 {
        self.base.read_chr_bank(0, 0x2000, addr)
    }

    fn mirroring(&self) -> Mirroring {
        if self.registers.high_nametable {
            Mirroring::OneScreenHigh
        } else {
            Mirroring::OneScreenLow
        }
    }
}

mapper_save_state!(AxRom);
