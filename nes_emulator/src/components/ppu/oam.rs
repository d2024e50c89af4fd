//! Object attribute memory and the per-scanline sprite selection.
use anyhow::ensure;
use anyhow::Result;
use bilge::prelude::*;
use serde::Deserialize;
use serde::Serialize;

pub const OAM_SIZE: usize = 256;
pub const SPRITE_COUNT: usize = 64;
/// Sprites the PPU can draw on a single scanline.
pub const SPRITES_PER_LINE: usize = 8;

/// Byte 2 of a sprite entry.
/// 7  bit  0
/// ---- ----
/// VHP. ..PP
/// |||     ||
/// |||     ++- Palette (4 to 7) of sprite
/// ||+-------- Priority (0: in front of background; 1: behind background)
/// |+--------- Flip sprite horizontally
/// +---------- Flip sprite vertically
#[bitsize(8)]
#[derive(Clone, Copy, DebugBits, Default, FromBits, PartialEq)]
pub struct SpriteAttributes {
    pub palette: u2,
    pub unused: u3,
    pub behind_background: bool,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sprite {
    pub index: usize,
    /// Y coordinate of the top of the sprite minus one.
    pub y: u8,
    pub tile: u8,
    pub attributes: SpriteAttributes,
    pub x: u8,
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Debug)]
pub struct Oam {
    memory: Vec<u8>,
    /// Current OAMADDR.
    addr: u8,
    /// Indices of the sprites selected for the next scanline.
    secondary: [u8; SPRITES_PER_LINE],
    secondary_len: u8,
}

impl Default for Oam {
    fn default() -> Self {
        Self {
            memory: vec![0; OAM_SIZE],
            addr: 0,
            secondary: [0; SPRITES_PER_LINE],
            secondary_len: 0,
        }
    }
}

impl Oam {
    /// Checks a decoded OAM for sizes and indices the sprite evaluation relies on.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.memory.len() == OAM_SIZE, "OAM size mismatch");
        ensure!(
            self.secondary_len as usize <= SPRITES_PER_LINE,
            "Secondary OAM holds more than {} sprites",
            SPRITES_PER_LINE
        );
        ensure!(
            self.secondary
                .iter()
                .all(|&index| (index as usize) < SPRITE_COUNT),
            "Secondary OAM references a sprite out of range"
        );
        Ok(())
    }

    pub fn addr(&self) -> u8 {
        self.addr
    }

    /// Register 2003: OAMADDR
    pub fn write_addr(&mut self, value: u8) {
        self.addr = value;
    }

    /// Register 2004: OAMDATA. Reads do not increment the address.
    pub fn read_data(&self) -> u8 {
        self.memory[self.addr as usize]
    }

    pub fn write_data(&mut self, value: u8) {
        self.memory[self.addr as usize] = value;
        self.addr = self.addr.wrapping_add(1);
    }

    /// Copies a 256 byte page into OAM, starting at OAMADDR and wrapping around.
    pub fn dma(&mut self, page: &[u8]) {
        for (offset, value) in page.iter().take(OAM_SIZE).enumerate() {
            let addr = self.addr.wrapping_add(offset as u8);
            self.memory[addr as usize] = *value;
        }
    }

    pub fn peek(&self, addr: u8) -> u8 {
        self.memory[addr as usize]
    }

    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    pub fn sprite(&self, index: usize) -> Sprite {
        let entry = &self.memory[(index % SPRITE_COUNT) * 4..][..4];
        Sprite {
            index,
            y: entry[0],
            tile: entry[1],
            attributes: SpriteAttributes::from(entry[2]),
            x: entry[3],
        }
    }

    pub fn clear_secondary(&mut self) {
        self.secondary_len = 0;
    }

    /// Sprites selected for the current scanline, in priority order.
    pub fn secondary(&self) -> impl Iterator<Item = Sprite> + '_ {
        self.secondary[..self.secondary_len as usize]
            .iter()
            .map(|index| self.sprite(*index as usize))
    }

    pub fn secondary_len(&self) -> usize {
        self.secondary_len as usize
    }

    /// Selects the sprites covering `scanline`, starting at the sprite OAMADDR points to.
    ///
    /// Returns true if a ninth sprite was found while rendering is enabled. With rendering
    /// disabled the search stops silently once eight sprites are selected.
    pub fn evaluate(&mut self, scanline: u16, sprite_height: u16, rendering_enabled: bool) -> bool {
        self.secondary_len = 0;
        for index in (self.addr as usize / 4)..SPRITE_COUNT {
            let diff = scanline as i32 - self.memory[index * 4] as i32;
            if diff < 0 || diff >= sprite_height as i32 {
                continue;
            }
            if self.secondary_len as usize >= SPRITES_PER_LINE {
                if rendering_enabled {
                    return true;
                }
                break;
            }
            self.secondary[self.secondary_len as usize] = index as u8;
            self.secondary_len += 1;
        }
        false
    }
}
