//! The contract shared by all cartridge mappers and the state they have in common.
use std::sync::Arc;

use anyhow::bail;
use anyhow::Result;
use log::warn;
use serde::Deserialize;
use serde::Serialize;

use super::mappers;
use super::rom_data::Mirroring;
use super::rom_data::RomData;
use crate::common::save_state::decode_from;
use crate::common::save_state::encode_into;
use crate::common::save_state::SaveStateComponent;

const CHR_RAM_SIZE: usize = 0x2000;
const EXTENDED_RAM_SIZE: usize = 0x2000;
const FOUR_SCREEN_VRAM_SIZE: usize = 0x1000;

/// Cartridge hardware as seen from the CPU and PPU buses.
///
/// Addresses are passed unmodified: PRG accesses are in $8000-$FFFF, extended RAM accesses in
/// $4020-$7FFF and CHR accesses in $0000-$1FFF.
pub trait Mapper: SaveStateComponent + Send {
    fn base(&self) -> &MapperBase;
    fn base_mut(&mut self) -> &mut MapperBase;

    fn read_prg(&self, addr: u16) -> u8;

    /// Writes into the PRG range select banks or configure the mapper.
    fn write_prg(&mut self, addr: u16, value: u8);

    /// Reads CHR as the PPU does. Some mappers latch bank switches on particular reads.
    fn read_chr(&mut self, addr: u16) -> u8 {
        self.peek_chr(addr)
    }

    /// Reads CHR without side effects.
    fn peek_chr(&self, addr: u16) -> u8;

    fn write_chr(&mut self, addr: u16, value: u8) {
        self.base_mut().write_chr_ram(addr, value);
    }

    /// Mirroring currently configured by the cartridge.
    fn mirroring(&self) -> Mirroring {
        self.base().rom.mirroring
    }

    /// Called once per scanline at the scanline IRQ dot.
    fn scanline_irq(&mut self, _scanline: u16, _rendering_enabled: bool) {}

    /// Called once per CPU cycle.
    fn m2_cycle(&mut self) {}

    /// Called whenever the PPU changes its VRAM address through $2006/$2007.
    fn ppu_address_changed(&mut self, _addr: u16) {}

    /// State of the IRQ line driven by the cartridge.
    fn irq_line(&self) -> bool {
        false
    }

    fn read_extended_ram(&mut self, addr: u16) -> u8 {
        self.base_mut().read_extended_ram(addr)
    }

    fn peek_extended_ram(&self, addr: u16) -> u8 {
        self.base().peek_extended_ram(addr)
    }

    /// Without extended RAM, writes to $4020-$7FFF are mapper register writes.
    fn write_extended_ram(&mut self, addr: u16, value: u8) {
        if self.base().rom.has_extended_ram {
            self.base_mut().write_extended_ram(addr, value);
        } else {
            self.write_prg(addr, value);
        }
    }

    fn reset(&mut self) {}
}

/// Creates the mapper for the mapper number in the ROM header.
pub fn create_mapper(rom: Arc<RomData>) -> Result<Box<dyn Mapper>> {
    let base = MapperBase::new(rom);
    let mapper: Box<dyn Mapper> = match base.rom.mapper {
        0 => Box::new(mappers::Nrom::new(base)),
        1 => Box::new(mappers::Mmc1::new(base)),
        2 => Box::new(mappers::UxRom::new(base)),
        3 => Box::new(mappers::CnRom::new(base)),
        4 => Box::new(mappers::Mmc3::new(base)),
        7 => Box::new(mappers::AxRom::new(base)),
        9 => Box::new(mappers::Mmc2::new(base, mappers::LatchChip::Mmc2)),
        10 => Box::new(mappers::Mmc2::new(base, mappers::LatchChip::Mmc4)),
        11 => Box::new(mappers::ColorDreams::new(base)),
        33 => Box::new(mappers::Taito::new(base, mappers::TaitoChip::Tc0190)),
        40 => Box::new(mappers::Smb2j::new(base)),
        48 => Box::new(mappers::Taito::new(base, mappers::TaitoChip::Tc0690)),
        66 => Box::new(mappers::GxRom::new(base)),
        74 => Box::new(mappers::Mmc3::with_chr_ram_banks(base)),
        75 => Box::new(mappers::Vrc1::new(base)),
        87 => Box::new(mappers::Jaleco87::new(base)),
        185 => Box::new(mappers::CnRom::with_chr_protection(base)),
        other => bail!("Unsupported mapper: {}", other),
    };
    Ok(mapper)
}

pub fn is_mapper_supported(mapper: u8) -> bool {
    matches!(
        mapper,
        0 | 1 | 2 | 3 | 4 | 7 | 9 | 10 | 11 | 33 | 40 | 48 | 66 | 74 | 75 | 87 | 185
    )
}

/// Memory owned by every mapper: CHR-RAM, extended RAM and four-screen VRAM.
pub struct MapperBase {
    pub rom: Arc<RomData>,
    chr_ram: Vec<u8>,
    extended_ram: Vec<u8>,
    vram: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct MapperBaseState {
    chr_ram: Vec<u8>,
    extended_ram: Vec<u8>,
    vram: Vec<u8>,
}

impl MapperBase {
    pub fn new(rom: Arc<RomData>) -> Self {
        let chr_ram = if rom.uses_chr_ram() {
            vec![0; CHR_RAM_SIZE]
        } else {
            Vec::new()
        };
        let extended_ram = if rom.has_extended_ram {
            vec![0; EXTENDED_RAM_SIZE]
        } else {
            Vec::new()
        };
        let vram = if rom.mirroring == Mirroring::FourScreen {
            vec![0; FOUR_SCREEN_VRAM_SIZE]
        } else {
            Vec::new()
        };
        Self {
            rom,
            chr_ram,
            extended_ram,
            vram,
        }
    }

    pub fn uses_chr_ram(&self) -> bool {
        !self.chr_ram.is_empty()
    }

    fn chr(&self) -> &[u8] {
        if self.chr_ram.is_empty() {
            &self.rom.chr
        } else {
            &self.chr_ram
        }
    }

    pub fn prg_bank_count(&self, bank_size: usize) -> usize {
        (self.rom.prg.len() / bank_size).max(1)
    }

    pub fn chr_bank_count(&self, bank_size: usize) -> usize {
        (self.chr().len() / bank_size).max(1)
    }

    /// Reads from a PRG bank of `bank_size` bytes. Out of range banks wrap around.
    pub fn read_prg_bank(&self, bank: usize, bank_size: usize, addr: u16) -> u8 {
        let prg = &self.rom.prg;
        let bank = bank % self.prg_bank_count(bank_size);
        prg[(bank * bank_size + (addr as usize & (bank_size - 1))) % prg.len()]
    }

    /// Reads from a CHR bank of `bank_size` bytes, from CHR-ROM or CHR-RAM.
    pub fn read_chr_bank(&self, bank: usize, bank_size: usize, addr: u16) -> u8 {
        let chr = self.chr();
        if chr.is_empty() {
            return 0;
        }
        let bank = bank % self.chr_bank_count(bank_size);
        chr[(bank * bank_size + (addr as usize & (bank_size - 1))) % chr.len()]
    }

    /// Writes to CHR-RAM. Writes to CHR-ROM are ignored.
    pub fn write_chr_ram(&mut self, addr: u16, value: u8) {
        if self.chr_ram.is_empty() {
            warn!("Write of ${:02X} to read-only CHR ${:04X}", value, addr);
            return;
        }
        let len = self.chr_ram.len();
        self.chr_ram[addr as usize % len] = value;
    }

    fn ensure_extended_ram(&mut self) {
        if self.extended_ram.is_empty() {
            warn!(
                "ROM accesses extended RAM, but the header declares none. Allocating it anyway."
            );
            self.extended_ram = vec![0; EXTENDED_RAM_SIZE];
        }
    }

    /// Reads $6000-$7FFF from extended RAM. Other addresses return open bus.
    pub fn read_extended_ram(&mut self, addr: u16) -> u8 {
        if (0x6000..=0x7FFF).contains(&addr) {
            self.ensure_extended_ram();
        }
        self.peek_extended_ram(addr)
    }

    pub fn peek_extended_ram(&self, addr: u16) -> u8 {
        if (0x6000..=0x7FFF).contains(&addr) {
            self.extended_ram
                .get(addr as usize - 0x6000)
                .copied()
                .unwrap_or_default()
        } else {
            (addr >> 8) as u8
        }
    }

    pub fn write_extended_ram(&mut self, addr: u16, value: u8) {
        if (0x6000..=0x7FFF).contains(&addr) {
            self.ensure_extended_ram();
            self.extended_ram[addr as usize - 0x6000] = value;
        }
    }

    /// Cartridge nametable memory of four-screen boards. `offset` is relative to $2000.
    pub fn read_vram(&self, offset: u16) -> u8 {
        self.vram
            .get(offset as usize % FOUR_SCREEN_VRAM_SIZE)
            .copied()
            .unwrap_or_default()
    }

    pub fn write_vram(&mut self, offset: u16, value: u8) {
        if let Some(byte) = self.vram.get_mut(offset as usize % FOUR_SCREEN_VRAM_SIZE) {
            *byte = value;
        }
    }

    pub fn save_state(&self, out: &mut Vec<u8>) -> Result<()> {
        // Extended RAM is always stored at full size so the encoded size does not depend on
        // whether it has been allocated on demand yet.
        let mut extended_ram = self.extended_ram.clone();
        extended_ram.resize(EXTENDED_RAM_SIZE, 0);
        encode_into(
            &MapperBaseState {
                chr_ram: self.chr_ram.clone(),
                extended_ram,
                vram: self.vram.clone(),
            },
            out,
        )
    }

    pub fn load_state(&mut self, input: &mut &[u8]) -> Result<()> {
        let state: MapperBaseState = decode_from(input)?;
        if state.chr_ram.len() != self.chr_ram.len()
            || state.vram.len() != self.vram.len()
            || state.extended_ram.len() != EXTENDED_RAM_SIZE
        {
            bail!("Mapper memory sizes do not match the loaded ROM");
        }
        self.chr_ram = state.chr_ram;
        self.vram = state.vram;
        let allocated = !self.extended_ram.is_empty();
        if allocated || state.extended_ram.iter().any(|byte| *byte != 0) {
            self.extended_ram = state.extended_ram;
        }
        Ok(())
    }
}

/// Implements [SaveStateComponent] for a mapper with a `base` and a serde `registers` field.
///
/// The optional second argument names a method `fn(&self, &Registers) -> Result<()>` that
/// rejects decoded registers the mapper cannot run with.
macro_rules! mapper_save_state {
    ($mapper:ty) => {
        impl $crate::common::save_state::SaveStateComponent for $mapper {
            fn save_state(&self, out: &mut Vec<u8>) -> anyhow::Result<()> {
                self.base.save_state(out)?;
                $crate::common::save_state::encode_into(&self.registers, out)
            }

            fn load_state(&mut self, version: u32, input: &mut &[u8]) -> anyhow::Result<()> {
                $crate::common::save_state::ensure_version("Mapper", version)?;
                self.base.load_state(input)?;
                self.registers = $crate::common::save_state::decode_from(input)?;
                Ok(())
            }
        }
    };
    ($mapper:ty, $check:ident) => {
        impl $crate::common::save_state::SaveStateComponent for $mapper {
            fn save_state(&self, out: &mut Vec<u8>) -> anyhow::Result<()> {
                self.base.save_state(out)?;
                $crate::common::save_state::encode_into(&self.registers, out)
            }

            fn load_state(&mut self, version: u32, input: &mut &[u8]) -> anyhow::Result<()> {
                $crate::common::save_state::ensure_version("Mapper", version)?;
                self.base.load_state(input)?;
                let registers = $crate::common::save_state::decode_from(input)?;
                self.$check(&registers)?;
                self.registers = registers;
                Ok(())
            }
        }
    };
}
pub(super) use mapper_save_state;
