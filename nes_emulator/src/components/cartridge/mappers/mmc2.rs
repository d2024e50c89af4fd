//! Mappers 009 (MMC2) and 010 (MMC4).
//!
//! Both switch each 4 KB CHR half between two banks when the PPU fetches tile $FD or $FE from it.
//! The switch takes effect after the triggering fetch.
use serde::Deserialize;
use serde::Serialize;

use crate::components::cartridge::mapper::mapper_save_state;
use crate::components::cartridge::mapper::Mapper;
use crate::components::cartridge::mapper::MapperBase;
use crate::components::cartridge::rom_data::Mirroring;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LatchChip {
    /// 8 KB switchable PRG bank, latch 0 triggers on $0FD8 and $0FE8 only.
    Mmc2,
    /// 16 KB switchable PRG bank, latch 0 triggers on $0FD8-$0FDF and $0FE8-$0FEF.
    Mmc4,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug)]
struct Registers {
    prg_bank: u8,
    chr_banks: [u8; 4],
    latch: [u8; 2],
    mirroring: Mirroring,
}

pub struct Mmc2 {
    base: MapperBase,
    registers: Registers,
    chip: LatchChip,
}

impl Mmc2 {
    pub fn new(base: MapperBase, chip: LatchChip) -> Self {
        let mirroring = base.rom.mirroring;
        Self {
            base,
            registers: Registers {
                prg_bank: 0,
                chr_banks: [0; 4],
                latch: [0xFE, 0xFE],
                mirroring,
            },
            chip,
        }
    }

    fn prg_bank_size(&self) -> usize {
        match self.chip {
            LatchChip::Mmc2 => 0x2000,
            LatchChip::Mmc4 => 0x4000,
        }
    }

    fn update_latch(&mut self, addr: u16) {
        let half = (addr >> 12) as usize & 1;
        let tile = addr & 0x0FF8;
        let exact = half == 0 && self.chip == LatchChip::Mmc2;
        if exact && addr & 0x0007 != 0 {
            return;
        }
        match tile {
            0x0FD8 => self.registers.latch[half] = 0xFD,
            0x0FE8 => self.registers.latch[half] = 0xFE,
            _ => (),
        }
    }
}

impl Mapper for Mmc2 {
    fn base(&self) -> &MapperBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut MapperBase {
        &mut self.base
    }

    fn read_prg(&self, addr: u16) -> u8 {
        let bank_size = self.prg_bank_size();
        let bank_count = self.base.prg_bank_count(bank_size);
        let bank = match (self.chip, addr) {
            (LatchChip::Mmc2, 0x8000..=0x9FFF) => self.registers.prg_bank as usize,
            (LatchChip::Mmc2, _) => {
                // The last three banks are fixed.
                (bank_count + ((addr as usize - 0x8000) >> 13)).saturating_sub(4)
            }
            (LatchChip::Mmc4, 0x8000..=0xBFFF) => self.registers.prg_bank as usize,
            (LatchChip::Mmc4, _) => bank_count - 1,
        };
        self.base.read_prg_bank(bank, bank_size, addr)
    }

    fn write_prg(&mut self, addr: u16, value: u8) {
        let registers = &mut self.registers;
        match addr & 0xF000 {
            0xA000 => registers.prg_bank = value & 0x0F,
            0xB000 => registers.chr_banks[0] = value & 0x1F,
            0xC000 => registers.chr_banks[1] = value & 0x1F,
            0xD000 => registers.chr_banks[2] = value & 0x1F,
            0xE000 => registers.chr_banks[3] = value & 0x1F,
            0xF000 => {
                registers.mirroring = if value & 1 == 0 {
                    Mirroring::Vertical
                } else {
                    Mirroring::Horizontal
                }
            }
            _ => (),
        }
    }

    fn read_chr(&mut self, addr: u16) -> u8 {
        let value = self.peek_chr(addr);
        self.update_latch(addr);
        value
    }

    fn peek_chr(&self, addr: u16) -> u8 {
        let half = (addr >> 12) as usize & 1;
        let selected = if self.registers.latch[half] == 0xFD {
            self.registers.chr_banks[half * 2]
        } else {
            self.registers.chr_banks[half * 2 + 1]
        };
        self.base.read_chr_bank(selected as usize, 0x1000, addr)
    }

    fn mirroring(&self) -> Mirroring {
        self.registers.mirroring
    }
}

mapper_save_state!(Mmc2);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::cartridge::mapper::test::banked_mapper;

    #[test]
    fn test_mmc2_prg_layout() {
        let mut mapper = banked_mapper(9, 8, 16);
        mapper.write_prg(0xA000, 5);
        assert_eq!(mapper.read_prg(0x8000), 5);
        assert_eq!(mapper.read_prg(0xA000), 13);
        assert_eq!(mapper.read_prg(0xC000), 14);
        assert_eq!(mapper.read_prg(0xE000), 15);
    }

    #[test]
    fn test_mmc4_prg_layout() {
        let mut mapper = banked_mapper(10, 8, 16);
        mapper.write_prg(0xA000, 2);
        assert_eq!(mapper.read_prg(0x8000), 4);
        assert_eq!(mapper.read_prg(0xA000), 5);
        assert_eq!(mapper.read_prg(0xC000), 14);
    }

    #[test]
    fn test_latch_switches_after_fetch() {
        let mut mapper = banked_mapper(9, 8, 16);
        mapper.write_prg(0xB000, 1);
        mapper.write_prg(0xC000, 2);
        mapper.write_prg(0xD000, 3);
        mapper.write_prg(0xE000, 4);
        // Both latches start at $FE.
        assert_eq!(mapper.read_chr(0x0000), 8);
        assert_eq!(mapper.read_chr(0x1000), 16);

        assert_eq!(mapper.read_chr(0x0FD8), 11);
        assert_eq!(mapper.read_chr(0x0000), 4);
        // MMC2 only latches on the exact address for the first half.
        mapper.read_chr(0x0FE9);
        assert_eq!(mapper.peek_chr(0x0000), 4);

        mapper.read_chr(0x1FDB);
        assert_eq!(mapper.read_chr(0x1000), 12);
        mapper.read_chr(0x1FE8);
        assert_eq!(mapper.read_chr(0x1000), 16);
    }

    #[test]
    fn test_peek_does_not_latch() {
        let mut mapper = banked_mapper(10, 8, 16);
        mapper.write_prg(0xB000, 1);
        mapper.peek_chr(0x0FD8);
        assert_eq!(mapper.read_chr(0x0000), 0);
        mapper.read_chr(0x0FDC);
        assert_eq!(mapper.read_chr(0x0000), 4);
    }
}
