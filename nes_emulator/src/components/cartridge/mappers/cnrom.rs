//! Mapper 003: CNROM, switchable 8 KB CHR-ROM.
//!
//! Mapper 185 boards use the same register as a copy protection check: CHR is only readable if
//! the right value has been written, otherwise the PPU reads open bus.
use serde::Deserialize;
use serde::Serialize;

use crate::components::cartridge::mapper::mapper_save_state;
use crate::components::cartridge::mapper::Mapper;
use crate::components::cartridge::mapper::MapperBase;

#[derive(Serialize, Deserialize, Clone, Copy, Debug)]
struct Registers {
    chr_bank: u8,
    chr_enabled: bool,
}

pub struct CnRom {
    base: MapperBase,
    registers: Registers,
    chr_protection: bool,
}

impl CnRom {
    pub fn new(base: MapperBase) -> Self {
        Self {
            base,
            registers: Registers {
                chr_bank: 0,
                chr_enabled: true,
            },
            chr_protection: false,
        }
    }

    pub fn with_chr_protection(base: MapperBase) -> Self {
        Self {
            registers: Registers {
                chr_bank: 0,
                chr_enabled: false,
            },
            chr_protection: true,
            ..Self::new(base)
        }
    }
}

impl Mapper for CnRom {
    fn base(&self) -> &MapperBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut MapperBase {
        &mut self.base
    }

    fn read_prg(&self, addr: u16) -> u8 {
        self.base.read_prg_bank(0, 0x8000, addr)
    }

    fn write_prg(&mut self, addr: u16, value: u8) {
        if addr < 0x8000 {
            return;
        }
        if self.chr_protection {
            self.registers.chr_enabled = value & 0x0F != 0 && value != 0x13;
        } else {
            self.registers.chr_bank = value & 0x03;
        }
    }

    fn peek_chr(&self, addr: u16) -> u8 {
        if !self.registers.chr_enabled {
            return 0xFF;
        }
        self.base
            .read_chr_bank(self.registers.chr_bank as usize, 0x2000, addr)
    }
}

mapper_save_state!(CnRom);

#[cfg(test)]
mod tests {
    use crate::components::cartridge::mapper::test::banked_mapper;

    #[test]
    fn test_chr_bank_switch() {
        let mut mapper = banked_mapper(3, 2, 4);
        assert_eq!(mapper.read_chr(0x0000), 0);
        mapper.write_prg(0x8000, 0xFE);
        assert_eq!(mapper.read_chr(0x0000), 16);
        assert_eq!(mapper.read_chr(0x1C00), 23);
    }

    #[test]
    fn test_chr_protection() {
        let mut mapper = banked_mapper(185, 2, 1);
        assert_eq!(mapper.read_chr(0x0400), 0xFF);
        mapper.write_prg(0x8000, 0x13);
        assert_eq!(mapper.read_chr(0x0400), 0xFF);
        mapper.write_prg(0x8000, 0x21);
        assert_eq!(mapper.read_chr(0x0400), 1);
        mapper.write_prg(0x8000, 0x00);
        assert_eq!(mapper.read_chr(0x0400), 0xFF);
    }
}
