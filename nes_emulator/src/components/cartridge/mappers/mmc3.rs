//! Mapper 004: Nintendo MMC3, and mapper 074 which adds 2 KB of CHR-RAM as CHR banks 8 and 9.
//!
//! The scanline counter is clocked once per rendered scanline and by rising edges of PPU address
//! line A12 caused by $2006 writes.
use anyhow::ensure;
use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;

use crate::common::util::EdgeDetector;
use crate::components::cartridge::mapper::mapper_save_state;
use crate::components::cartridge::mapper::Mapper;
use crate::components::cartridge::mapper::MapperBase;
use crate::components::cartridge::rom_data::Mirroring;

const PRG_BANK_SIZE: usize = 0x2000;
const CHR_BANK_SIZE: usize = 0x0400;
const CHR_RAM_BANKS_SIZE: usize = 0x0800;

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
struct Registers {
    bank_select: u8,
    banks: [u8; 8],
    mirroring: Mirroring,
    irq_latch: u8,
    irq_counter: u8,
    irq_reload: bool,
    irq_enabled: bool,
    irq_flag: bool,
    a12: bool,
    /// CHR-RAM of mapper 074, empty otherwise.
    chr_ram_banks: Vec<u8>,
}

pub struct Mmc3 {
    base: MapperBase,
    registers: Registers,
}

impl Mmc3 {
    pub fn new(base: MapperBase) -> Self {
        let mirroring = base.rom.mirroring;
        Self {
            base,
            registers: Registers {
                mirroring,
                ..Default::default()
            },
        }
    }

    pub fn with_chr_ram_banks(base: MapperBase) -> Self {
        let mut mapper = Self::new(base);
        mapper.registers.chr_ram_banks = vec![0; CHR_RAM_BANKS_SIZE];
        mapper
    }

    fn check_registers(&self, registers: &Registers) -> Result<()> {
        ensure!(
            registers.chr_ram_banks.len() == self.registers.chr_ram_banks.len(),
            "MMC3 CHR-RAM size does not match the loaded board"
        );
        Ok(())
    }

    fn prg_mode(&self) -> bool {
        self.registers.bank_select & 0x40 != 0
    }

    fn chr_mode(&self) -> bool {
        self.registers.bank_select & 0x80 != 0
    }

    /// 1 KB CHR bank mapped at `addr`.
    fn chr_bank(&self, addr: u16) -> usize {
        let mut slot = (addr as usize >> 10) & 7;
        if self.chr_mode() {
            slot ^= 4;
        }
        let banks = &self.registers.banks;
        let bank = match slot {
            0 => banks[0] & 0xFE,
            1 => banks[0] | 0x01,
            2 => banks[1] & 0xFE,
            3 => banks[1] | 0x01,
            _ => banks[slot - 2],
        };
        bank as usize
    }

    /// Offset into the extra CHR-RAM if `addr` is mapped to bank 8 or 9.
    fn chr_ram_bank_offset(&self, addr: u16) -> Option<usize> {
        if self.registers.chr_ram_banks.is_empty() {
            return None;
        }
        match self.chr_bank(addr) {
            bank @ (8 | 9) => Some((bank - 8) * CHR_BANK_SIZE + (addr as usize & 0x3FF)),
            _ => None,
        }
    }

    fn clock_irq_counter(&mut self) {
        let registers = &mut self.registers;
        if registers.irq_counter == 0 || registers.irq_reload {
            registers.irq_counter = registers.irq_latch;
        } else {
            registers.irq_counter -= 1;
        }
        if registers.irq_counter == 0 && registers.irq_enabled {
            registers.irq_flag = true;
        }
        registers.irq_reload = false;
    }
}

impl Mapper for Mmc3 {
    fn base(&self) -> &MapperBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut MapperBase {
        &mut self.base
    }

    fn read_prg(&self, addr: u16) -> u8 {
        let second_last = self.base.prg_bank_count(PRG_BANK_SIZE).saturating_sub(2);
        let banks = &self.registers.banks;
        let bank = match (addr >> 13) & 3 {
            0 if self.prg_mode() => second_last,
            0 => banks[6] as usize,
            1 => banks[7] as usize,
            2 if self.prg_mode() => banks[6] as usize,
            2 => second_last,
            _ => self.base.prg_bank_count(PRG_BANK_SIZE) - 1,
        };
        self.base.read_prg_bank(bank, PRG_BANK_SIZE, addr)
    }

    fn write_prg(&mut self, addr: u16, value: u8) {
        let even = addr & 1 == 0;
        let registers = &mut self.registers;
        match (addr, even) {
            (0x8000..=0x9FFF, true) => registers.bank_select = value,
            (0x8000..=0x9FFF, false) => {
                let target = (registers.bank_select & 0x07) as usize;
                registers.banks[target] = value;
            }
            (0xA000..=0xBFFF, true) => {
                registers.mirroring = if self.base.rom.mirroring == Mirroring::FourScreen {
                    Mirroring::FourScreen
                } else if value & 1 != 0 {
                    Mirroring::Horizontal
                } else {
                    Mirroring::Vertical
                };
            }
            // PRG-RAM protect is not emulated, as MMC6 boards share the mapper number.
            (0xA000..=0xBFFF, false) => (),
            (0xC000..=0xDFFF, true) => registers.irq_latch = value,
            (0xC000..=0xDFFF, false) => {
                registers.irq_counter = 0;
                registers.irq_reload = true;
            }
            (0xE000..=0xFFFF, true) => {
                registers.irq_enabled = false;
                registers.irq_flag = false;
            }
            (0xE000..=0xFFFF, false) => registers.irq_enabled = true,
            _ => (),
        }
    }

    fn peek_chr(&self, addr: u16) -> u8 {
        if let Some(offset) = self.chr_ram_bank_offset(addr) {
            return self.registers.chr_ram_banks[offset];
        }
        if self.base.uses_chr_ram() {
            return self.base.read_chr_bank(0, 0x2000, addr);
        }
        self.base
            .read_chr_bank(self.chr_bank(addr), CHR_BANK_SIZE, addr)
    }

    fn write_chr(&mut self, addr: u16, value: u8) {
        if let Some(offset) = self.chr_ram_bank_offset(addr) {
            self.registers.chr_ram_banks[offset] = value;
        } else {
            self.base.write_chr_ram(addr, value);
        }
    }

    fn mirroring(&self) -> Mirroring {
        self.registers.mirroring
    }

    fn scanline_irq(&mut self, _scanline: u16, rendering_enabled: bool) {
        if rendering_enabled {
            self.clock_irq_counter();
        }
    }

    fn ppu_address_changed(&mut self, addr: u16) {
        let mut a12 = EdgeDetector::new(self.registers.a12);
        if a12.rising(addr & 0x1000 != 0) {
            self.clock_irq_counter();
        }
        self.registers.a12 = a12.value();
    }

    fn irq_line(&self) -> bool {
        self.registers.irq_flag
    }
}

mapper_save_state!(Mmc3, check_registers);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::save_state::SaveStateComponent;
    use crate::common::save_state::STATE_VERSION;
    use crate::components::cartridge::mapper::test::banked_mapper;

    #[test]
    fn test_chr_ram_size_is_checked_on_restore() {
        let with_chr_ram = banked_mapper(74, 4, 8);
        let mut state = Vec::new();
        with_chr_ram.save_state(&mut state).unwrap();

        let mut without_chr_ram = banked_mapper(4, 4, 8);
        assert!(without_chr_ram
            .load_state(STATE_VERSION, &mut &state[..])
            .is_err());

        let mut restored = banked_mapper(74, 4, 8);
        restored.load_state(STATE_VERSION, &mut &state[..]).unwrap();
    }

    #[test]
    fn test_prg_modes() {
        let mut mapper = banked_mapper(4, 4, 1);
        mapper.write_prg(0x8000, 6);
        mapper.write_prg(0x8001, 2);
        mapper.write_prg(0x8000, 7);
        mapper.write_prg(0x8001, 3);
        assert_eq!(mapper.read_prg(0x8000), 2);
        assert_eq!(mapper.read_prg(0xA000), 3);
        assert_eq!(mapper.read_prg(0xC000), 6);
        assert_eq!(mapper.read_prg(0xE000), 7);

        mapper.write_prg(0x8000, 0x40);
        assert_eq!(mapper.read_prg(0x8000), 6);
        assert_eq!(mapper.read_prg(0xC000), 2);
    }

    #[test]
    fn test_chr_modes() {
        let mut mapper = banked_mapper(4, 2, 2);
        for (register, bank) in [(0, 4), (1, 10), (2, 1), (3, 2), (4, 3), (5, 15)] {
            mapper.write_prg(0x8000, register);
            mapper.write_prg(0x8001, bank);
        }
        let banks = |mapper: &mut Box<dyn Mapper>| {
            (0..8)
                .map(|slot| mapper.read_chr(slot * 0x400))
                .collect::<Vec<_>>()
        };
        assert_eq!(banks(&mut mapper), vec![4, 5, 10, 11, 1, 2, 3, 15]);
        mapper.write_prg(0x8000, 0x80);
        assert_eq!(banks(&mut mapper), vec![1, 2, 3, 15, 4, 5, 10, 11]);
    }

    #[test]
    fn test_mirroring() {
        let mut mapper = banked_mapper(4, 2, 1);
        mapper.write_prg(0xA000, 1);
        assert_eq!(mapper.mirroring(), Mirroring::Horizontal);
        mapper.write_prg(0xA000, 0);
        assert_eq!(mapper.mirroring(), Mirroring::Vertical);
    }

    #[test]
    fn test_scanline_irq() {
        let mut mapper = banked_mapper(4, 2, 1);
        mapper.write_prg(0xC000, 2);
        mapper.write_prg(0xC001, 0);
        mapper.write_prg(0xE001, 0);
        // Reload, then count down 2, 1, 0.
        mapper.scanline_irq(0, true);
        mapper.scanline_irq(1, true);
        assert!(!mapper.irq_line());
        mapper.scanline_irq(2, false);
        assert!(!mapper.irq_line());
        mapper.scanline_irq(2, true);
        assert!(mapper.irq_line());
        mapper.write_prg(0xE000, 0);
        assert!(!mapper.irq_line());
    }

    #[test]
    fn test_a12_rising_edge_clocks_counter() {
        let mut mapper = banked_mapper(4, 2, 1);
        mapper.write_prg(0xC000, 1);
        mapper.write_prg(0xE001, 0);
        mapper.ppu_address_changed(0x1000);
        mapper.ppu_address_changed(0x1008);
        assert!(!mapper.irq_line());
        mapper.ppu_address_changed(0x0000);
        mapper.ppu_address_changed(0x1000);
        assert!(mapper.irq_line());
    }

    #[test]
    fn test_chr_ram_banks() {
        let mut mapper = banked_mapper(74, 2, 2);
        mapper.write_prg(0x8000, 2);
        mapper.write_prg(0x8001, 8);
        mapper.write_chr(0x1010, 0xAB);
        assert_eq!(mapper.read_chr(0x1010), 0xAB);
        mapper.write_prg(0x8001, 7);
        assert_eq!(mapper.read_chr(0x1010), 7);
        mapper.write_prg(0x8001, 8);
        assert_eq!(mapper.peek_chr(0x1010), 0xAB);
    }
}
