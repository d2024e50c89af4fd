//! The PPU address space: CHR from the cartridge, nametables and palette RAM.
use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;

use crate::common::bus::Bus;
use crate::common::save_state::decode_from;
use crate::common::save_state::encode_into;
use crate::common::save_state::ensure_version;
use crate::common::save_state::SaveStateComponent;
use crate::components::cartridge::Cartridge;
use crate::components::cartridge::Mirroring;
use crate::components::ppu::PpuBus;

const NAMETABLE_RAM_SIZE: usize = 0x800;
const NAMETABLE_SIZE: u16 = 0x400;
const PALETTE_SIZE: usize = 32;

/// Memory on the console side of the PPU bus.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PpuMemory {
    /// The 2 KB of CIRAM holding two physical nametables.
    pub nametables: Vec<u8>,
    pub palette: [u8; PALETTE_SIZE],
}

impl Default for PpuMemory {
    fn default() -> Self {
        let mut palette = [0x30; PALETTE_SIZE];
        palette[0] = 0x3F;
        Self {
            nametables: vec![0; NAMETABLE_RAM_SIZE],
            palette,
        }
    }
}

impl PpuMemory {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl SaveStateComponent for PpuMemory {
    fn save_state(&self, out: &mut Vec<u8>) -> Result<()> {
        encode_into(self, out)
    }

    fn load_state(&mut self, version: u32, input: &mut &[u8]) -> Result<()> {
        ensure_version("PPU bus", version)?;
        let state: PpuMemory = decode_from(input)?;
        anyhow::ensure!(
            state.nametables.len() == NAMETABLE_RAM_SIZE,
            "Invalid nametable size {}",
            state.nametables.len()
        );
        *self = state;
        Ok(())
    }
}

/// Palette RAM index of `addr`. The background color entries of the sprite palettes
/// ($3F10/$3F14/$3F18/$3F1C) mirror those of the background palettes.
fn palette_index(addr: u16) -> usize {
    let index = (addr & 0x1F) as usize;
    if index >= 0x10 && index & 0x03 == 0 {
        index & 0x0F
    } else {
        index
    }
}

/// Binds the PPU memory and the cartridge into the bus seen by the PPU.
///
/// Created for each PPU access from disjoint borrows of the CPU bus fields.
pub struct PpuBusImpl<'a> {
    pub memory: &'a mut PpuMemory,
    pub cartridge: &'a mut Cartridge,
}

impl<'a> PpuBusImpl<'a> {
    pub fn new(memory: &'a mut PpuMemory, cartridge: &'a mut Cartridge) -> Self {
        Self { memory, cartridge }
    }
}

/// Read-only version of [PpuBusImpl] for debug views.
pub struct PpuBusPeek<'a> {
    pub memory: &'a PpuMemory,
    pub cartridge: &'a Cartridge,
}

impl Bus for PpuBusPeek<'_> {
    fn peek_u8(&self, addr: u16) -> Option<u8> {
        Some(peek(self.memory, self.cartridge, addr))
    }

    fn cycle_read_u8(&mut self, addr: u16) -> u8 {
        peek(self.memory, self.cartridge, addr)
    }

    fn cycle_write_u8(&mut self, addr: u16, _value: u8) {
        log::warn!("Write to read-only PPU bus view at ${:04X}", addr);
    }

    fn reset(&mut self) {}
}

enum NametableSlot {
    Console(usize),
    Cartridge(u16),
}

/// Resolves a nametable address through the mirroring configured by the cartridge.
fn nametable_slot(mirroring: Mirroring, addr: u16) -> NametableSlot {
    let offset = (addr - 0x2000) % (4 * NAMETABLE_SIZE);
    let table = offset / NAMETABLE_SIZE;
    let inner = (offset % NAMETABLE_SIZE) as usize;
    match mirroring {
        Mirroring::FourScreen => NametableSlot::Cartridge(offset),
        _ => NametableSlot::Console(
            mirroring.physical_page(table) * NAMETABLE_SIZE as usize + inner,
        ),
    }
}

fn peek(memory: &PpuMemory, cartridge: &Cartridge, addr: u16) -> u8 {
    let addr = addr & 0x3FFF;
    match addr {
        0x0000..=0x1FFF => cartridge.mapper().peek_chr(addr),
        0x2000..=0x3EFF => match nametable_slot(cartridge.mirroring(), addr) {
            NametableSlot::Console(index) => memory.nametables[index],
            NametableSlot::Cartridge(offset) => cartridge.mapper().base().read_vram(offset),
        },
        _ => memory.palette[palette_index(addr)] & 0x3F,
    }
}

impl Bus for PpuBusImpl<'_> {
    fn peek_u8(&self, addr: u16) -> Option<u8> {
        Some(peek(self.memory, self.cartridge, addr))
    }

    fn cycle_read_u8(&mut self, addr: u16) -> u8 {
        let addr = addr & 0x3FFF;
        match addr {
            0x0000..=0x1FFF => self.cartridge.mapper_mut().read_chr(addr),
            _ => peek(self.memory, self.cartridge, addr),
        }
    }

    fn cycle_write_u8(&mut self, addr: u16, value: u8) {
        let addr = addr & 0x3FFF;
        match addr {
            0x0000..=0x1FFF => self.cartridge.mapper_mut().write_chr(addr, value),
            0x2000..=0x3EFF => match nametable_slot(self.cartridge.mirroring(), addr) {
                NametableSlot::Console(index) => self.memory.nametables[index] = value,
                NametableSlot::Cartridge(offset) => {
                    self.cartridge.mapper_mut().base_mut().write_vram(offset, value)
                }
            },
            _ => self.memory.palette[palette_index(addr)] = value,
        }
    }

    fn reset(&mut self) {
        self.memory.reset();
    }
}

impl PpuBus for PpuBusImpl<'_> {
    fn scanline_irq(&mut self, scanline: u16, rendering_enabled: bool) {
        self.cartridge
            .mapper_mut()
            .scanline_irq(scanline, rendering_enabled);
    }

    fn address_changed(&mut self, addr: u16) {
        self.cartridge.mapper_mut().ppu_address_changed(addr);
    }
}
