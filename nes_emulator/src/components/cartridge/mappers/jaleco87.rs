//! Mapper 087: Jaleco J87. A CHR bank register at $6000-$7FFF with its two bits swapped.
use serde::Deserialize;
use serde::Serialize;

use crate::components::cartridge::mapper::mapper_save_state;
use crate::components::cartridge::mapper::Mapper;
use crate::components::cartridge::mapper::MapperBase;

#[derive(Serialize, Deserialize, Default, Clone, Copy, Debug)]
struct Registers {
    chr_bank: u8,
}

pub struct Jaleco87 {
    base: MapperBase,
    registers: Registers,
}

impl Jaleco87 {
    pub fn new(base: MapperBase) -> Self {
        Self {
            base,
            registers: Registers::default(),
        }
    }
}

impl Mapper for Jaleco87 {
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
        if (0x6000..=0x7FFF).contains(&addr) {
            self.registers.chr_bank = ((value >> 1) & 1) | ((value & 1) << 1);
        }
    }

    fn peek_chr(&self, addr: u16) -> u8 {
        self.base
            .read_chr_bank(self.registers.chr_bank as usize, 0x2000, addr)
    }
}

mapper_save_state!(Jaleco87);

#[cfg(test)]
mod tests {
    use crate::components::cartridge::mapper::test::banked_mapper;

    #[test]
    fn test_swapped_bits() {
        let mut mapper = banked_mapper(87, 2, 4);
        mapper.write_extended_ram(0x6000, 0x01);
        assert_eq!(mapper.read_chr(0x0000), 16);
        mapper.write_extended_ram(0x7FFF, 0x02);
        assert_eq!(mapper.read_chr(0x0000), 8);
        // Writes to the PRG range are ignored.
        mapper.write_prg(0x8000, 0x03);
        assert_eq!(mapper.read_chr(0x0000), 8);
    }
}
