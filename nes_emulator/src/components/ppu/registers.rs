//! Bit layouts of the memory mapped PPU registers.
use bilge::prelude::*;

/// Register 2000: PPUCTRL
/// 7  bit  0
/// ---- ----
/// VPHB SINN
/// |||| ||||
/// |||| ||++- Base nametable address (0 = $2000; 1 = $2400; 2 = $2800; 3 = $2C00)
/// |||| |+--- VRAM address increment per CPU read/write of PPUDATA (0: 1; 1: 32)
/// |||| +---- Sprite pattern table address for 8x8 sprites (0: $0000; 1: $1000)
/// |||+------ Background pattern table address (0: $0000; 1: $1000)
/// ||+------- Sprite size (0: 8x8 pixels; 1: 8x16 pixels)
/// |+-------- PPU master/slave select
/// +--------- Generate an NMI at the start of vertical blanking
#[bitsize(8)]
#[derive(Clone, Copy, DebugBits, Default, FromBits, PartialEq)]
pub struct PpuCtrl {
    pub nametable: u2,
    pub increment_32: bool,
    pub sprite_table: bool,
    pub background_table: bool,
    pub sprite_size_16: bool,
    pub master_slave: bool,
    pub nmi_enable: bool,
}

impl PpuCtrl {
    pub fn address_increment(&self) -> u16 {
        if self.increment_32() {
            32
        } else {
            1
        }
    }

    pub fn sprite_table_base(&self) -> u16 {
        if self.sprite_table() {
            0x1000
        } else {
            0
        }
    }

    pub fn background_table_base(&self) -> u16 {
        if self.background_table() {
            0x1000
        } else {
            0
        }
    }

    pub fn sprite_height(&self) -> u16 {
        if self.sprite_size_16() {
            16
        } else {
            8
        }
    }
}

/// Register 2001: PPUMASK
/// 7  bit  0
/// ---- ----
/// BGRs bMmG
/// |||| ||||
/// |||| |||+- Greyscale
/// |||| ||+-- Show background in leftmost 8 pixels of screen
/// |||| |+--- Show sprites in leftmost 8 pixels of screen
/// |||| +---- Show background
/// |||+------ Show sprites
/// ||+------- Emphasize red
/// |+-------- Emphasize green
/// +--------- Emphasize blue
#[bitsize(8)]
#[derive(Clone, Copy, DebugBits, Default, FromBits, PartialEq)]
pub struct PpuMask {
    pub grayscale: bool,
    pub show_background_left: bool,
    pub show_sprites_left: bool,
    pub show_background: bool,
    pub show_sprites: bool,
    pub emphasize_red: bool,
    pub emphasize_green: bool,
    pub emphasize_blue: bool,
}

impl PpuMask {
    pub fn rendering_enabled(&self) -> bool {
        self.show_background() || self.show_sprites()
    }
}

/// Register 2002: PPUSTATUS
/// 7  bit  0
/// ---- ----
/// VSO. ....
/// |||| ||||
/// |||+-++++- Open bus
/// ||+------- Sprite overflow
/// |+-------- Sprite 0 hit
/// +--------- Vertical blank has started
#[bitsize(8)]
#[derive(Clone, Copy, DebugBits, Default, FromBits, PartialEq)]
pub struct PpuStatus {
    pub open_bus: u5,
    pub sprite_overflow: bool,
    pub sprite_zero_hit: bool,
    pub vblank: bool,
}
