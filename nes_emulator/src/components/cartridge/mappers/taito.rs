//! Mappers 033 (Taito TC0190) and 048 (Taito TC0690).
//!
//! Two 8 KB PRG banks, two 2 KB and four 1 KB CHR banks. The TC0690 moves the mirroring bit to
//! $E000 and adds a scanline counter.
use serde::Deserialize;
use serde::Serialize;

use crate::components::cartridge::mapper::mapper_save_state;
use crate::components::cartridge::mapper::Mapper;
use crate::components::cartridge::mapper::MapperBase;
use crate::components::cartridge::rom_data::Mirroring;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaitoChip {
    Tc0190,
    Tc0690,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default)]
struct Registers {
    prg_banks: [u8; 2],
    chr_banks: [u8; 6],
    mirroring: Mirroring,
    irq_latch: u8,
    irq_counter: u8,
    irq_enabled: bool,
    irq_flag: bool,
}

pub struct Taito {
    base: MapperBase,
    registers: Registers,
    chip: TaitoChip,
}

impl Taito {
    pub fn new(base: MapperBase, chip: TaitoChip) -> Self {
        let mirroring = base.rom.mirroring;
        Self {
            base,
            registers: Registers {
                mirroring,
                ..Default::default()
            },
            chip,
        }
    }

    fn mirroring_from(value: u8) -> Mirroring {
        if value & 0x40 != 0 {
            Mirroring::Horizontal
        } else {
            Mirroring::Vertical
        }
    }
}

impl Mapper for Taito {
    fn base(&self) -> &MapperBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut MapperBase {
        &mut self.base
    }

    fn read_prg(&self, addr: u16) -> u8 {
        let bank_count = self.base.prg_bank_count(0x2000);
        let bank = match (addr >> 13) & 3 {
            0 => self.registers.prg_banks[0] as usize,
            1 => self.registers.prg_banks[1] as usize,
            2 => bank_count.saturating_sub(2),
            _ => bank_count - 1,
        };
        self.base.read_prg_bank(bank, 0x2000, addr)
    }

    fn write_prg(&mut self, addr: u16, value: u8) {
        let chip = self.chip;
        let registers = &mut self.registers;
        match addr & 0xE003 {
            0x8000 if chip == TaitoChip::Tc0190 => {
                registers.mirroring = Self::mirroring_from(value);
                registers.prg_banks[0] = value & 0x3F;
            }
            0x8000 => registers.prg_banks[0] = value,
            0x8001 => registers.prg_banks[1] = value & 0x3F,
            0x8002 | 0x8003 => registers.chr_banks[(addr & 3) as usize - 2] = value,
            0xA000..=0xA003 => registers.chr_banks[(addr & 3) as usize + 2] = value,
            0xC000 if chip == TaitoChip::Tc0690 => {
                registers.irq_latch = value;
                registers.irq_counter = value;
            }
            0xC001 if chip == TaitoChip::Tc0690 => registers.irq_counter = registers.irq_latch,
            0xC002 if chip == TaitoChip::Tc0690 => registers.irq_enabled = true,
            0xC003 if chip == TaitoChip::Tc0690 => {
                registers.irq_enabled = false;
                registers.irq_flag = false;
            }
            0xE000 if chip == TaitoChip::Tc0690 => {
                registers.mirroring = Self::mirroring_from(value)
            }
            _ => (),
        }
    }

    fn peek_chr(&self, addr: u16) -> u8 {
        let banks = &self.registers.chr_banks;
        match addr {
            0x0000..=0x07FF => self.base.read_chr_bank(banks[0] as usize, 0x0800, addr),
            0x0800..=0x0FFF => self.base.read_chr_bank(banks[1] as usize, 0x0800, addr),
            _ => {
                let bank = banks[((addr >> 10) & 3) as usize + 2];
                self.base.read_chr_bank(bank as usize, 0x0400, addr)
            }
        }
    }

    fn mirroring(&self) -> Mirroring {
        self.registers.mirroring
    }

    /// The counter counts up and raises the IRQ when it wraps to zero.
    fn scanline_irq(&mut self, scanline: u16, rendering_enabled: bool) {
        let registers = &mut self.registers;
        if self.chip != TaitoChip::Tc0690
            || !rendering_enabled
            || scanline >= 240
            || !registers.irq_enabled
        {
            return;
        }
        registers.irq_counter = registers.irq_counter.wrapping_add(1);
        if registers.irq_counter == 0 {
            registers.irq_enabled = false;
            registers.irq_flag = true;
        }
    }

    fn irq_line(&self) -> bool {
        self.registers.irq_flag
    }

    fn reset(&mut self) {
        self.registers = Registers {
            mirroring: self.registers.mirroring,
            ..Default::default()
        };
    }
}

mapper_save_state!(Taito);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::cartridge::mapper::test::banked_mapper;

    #[test]
    fn test_tc0190_banks_and_mirroring() {
        let mut mapper = banked_mapper(33, 4, 2);
        mapper.write_prg(0x8000, 0x42);
        mapper.write_prg(0x8001, 3);
        mapper.write_prg(0x8002, 2);
        mapper.write_prg(0x8003, 3);
        mapper.write_prg(0xA003, 9);
        assert_eq!(mapper.mirroring(), Mirroring::Horizontal);
        assert_eq!(mapper.read_prg(0x8000), 2);
        assert_eq!(mapper.read_prg(0xA000), 3);
        assert_eq!(mapper.read_prg(0xC000), 6);
        assert_eq!(mapper.read_prg(0xE000), 7);
        assert_eq!(mapper.read_chr(0x0000), 4);
        assert_eq!(mapper.read_chr(0x0C00), 7);
        assert_eq!(mapper.read_chr(0x1C00), 9);
    }

    #[test]
    fn test_tc0690_scanline_irq() {
        let mut mapper = banked_mapper(48, 4, 2);
        mapper.write_prg(0xE000, 0x40);
        assert_eq!(mapper.mirroring(), Mirroring::Horizontal);
        mapper.write_prg(0xC000, 0xFE);
        mapper.write_prg(0xC002, 0);
        mapper.scanline_irq(10, true);
        assert!(!mapper.irq_line());
        mapper.scanline_irq(250, true);
        assert!(!mapper.irq_line());
        mapper.scanline_irq(11, true);
        assert!(mapper.irq_line());
        mapper.write_prg(0xC003, 0);
        assert!(!mapper.irq_line());
    }
}
