//! Mapper 075: Konami VRC1.
use serde::Deserialize;
use serde::Serialize;

use crate::components::cartridge::mapper::mapper_save_state;
use crate::components::cartridge::mapper::Mapper;
use crate::components::cartridge::mapper::MapperBase;
use crate::components::cartridge::rom_data::Mirroring;

#[derive(Serialize, Deserialize, Clone, Copy, Debug)]
struct Registers {
    prg_banks: [u8; 3],
    /// 4 KB CHR banks. Bit 4 comes from the $9000 register.
    chr_banks: [u8; 2],
    mirroring: Mirroring,
}

pub struct Vrc1 {
    base: MapperBase,
    registers: Registers,
}

impl Vrc1 {
    pub fn new(base: MapperBase) -> Self {
        let mirroring = base.rom.mirroring;
        Self {
            base,
            registers: Registers {
                prg_banks: [0; 3],
                chr_banks: [0; 2],
                mirroring,
            },
        }
    }
}

impl Mapper for Vrc1 {
    fn base(&self) -> &MapperBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut MapperBase {
        &mut self.base
    }

    fn read_prg(&self, addr: u16) -> u8 {
        let bank = match addr {
            0x8000..=0x9FFF => self.registers.prg_banks[0] as usize,
            0xA000..=0xBFFF => self.registers.prg_banks[1] as usize,
            0xC000..=0xDFFF => self.registers.prg_banks[2] as usize,
            _ => self.base.prg_bank_count(0x2000) - 1,
        };
        self.base.read_prg_bank(bank, 0x2000, addr)
    }

    fn write_prg(&mut self, addr: u16, value: u8) {
        let registers = &mut self.registers;
        match addr & 0xF000 {
            0x8000 => registers.prg_banks[0] = value & 0x0F,
            0x9000 => {
                registers.mirroring = if value & 1 == 0 {
                    Mirroring::Vertical
                } else {
                    Mirroring::Horizontal
                };
                registers.chr_banks[0] = (registers.chr_banks[0] & 0x0F) | ((value & 0x02) << 3);
                registers.chr_banks[1] = (registers.chr_banks[1] & 0x0F) | ((value & 0x04) << 2);
            }
            0xA000 => registers.prg_banks[1] = value & 0x0F,
            0xC000 => registers.prg_banks[2] = value & 0x0F,
            0xE000 => registers.chr_banks[0] = (registers.chr_banks[0] & 0x10) | (value & 0x0F),
            0xF000 => registers.chr_banks[1] = (registers.chr_banks[1] & 0x10) | (value & 0x0F),
            _ => (),
        }
    }

    fn peek_chr(&self, addr: u16) -> u8 {
        let bank = self.registers.chr_banks[(addr >> 12) as usize & 1];
        self.base.read_chr_bank(bank as usize, 0x1000, addr)
    }

    fn mirroring(&self) -> Mirroring {
        self.registers.mirroring
    }
}

mapper_save_state!(Vrc1);
