use super::color_argb;
use super::oam::Sprite;
use super::oam::SPRITE_COUNT;
use super::Ppu;
use crate::common::bus::Bus;
use crate::common::image::Image;
use crate::common::image::Rgba32;

/// Read-only views into the PPU. All memory is read via [Bus::peek_u8].
pub struct PpuDebug<'a>(pub &'a Ppu);

impl PpuDebug<'_> {
    pub fn registers_info(&self) -> String {
        let ppu = self.0;
        format!(
            "CTRL:{:02X} MASK:{:02X} STATUS:{:02X} V:{:04X} T:{:04X} X:{} {} L:{} D:{}",
            u8::from(ppu.ctrl),
            u8::from(ppu.mask),
            u8::from(ppu.status),
            ppu.v,
            ppu.t,
            ppu.fine_x,
            ppu.pipeline,
            ppu.reported_scanline(),
            ppu.dot,
        )
    }

    pub fn sprites(&self) -> Vec<Sprite> {
        (0..SPRITE_COUNT).map(|index| self.0.oam.sprite(index)).collect()
    }

    pub fn sprite_info(&self, index: usize) -> String {
        let sprite = self.0.oam.sprite(index);
        format!(
            "#{} ({}, {}) tile {:02X} palette {}{}{}{}",
            sprite.index,
            sprite.x,
            sprite.y,
            sprite.tile,
            sprite.attributes.palette().value() + 4,
            if sprite.attributes.behind_background() { " behind" } else { "" },
            if sprite.attributes.flip_horizontal() { " flip-h" } else { "" },
            if sprite.attributes.flip_vertical() { " flip-v" } else { "" },
        )
    }

    /// Renders the 256 tiles of pattern table `table` (0 or 1) as a 16x16 tile grid, colored with
    /// palette `palette` (0-3 background, 4-7 sprites).
    pub fn render_pattern_table<ImageT: Image>(
        &self,
        bus: &impl Bus,
        table: u16,
        palette: u8,
    ) -> ImageT {
        let mut image = ImageT::new(128, 128);
        let base = (table & 1) * 0x1000;
        for tile in 0..256_u16 {
            let (coarse_x, coarse_y) = ((tile % 16) as u32, (tile / 16) as u32);
            let origin = (coarse_x * 8, coarse_y * 8);
            self.draw_tile(bus, &mut image, base + tile * 16, palette, origin);
        }
        image
    }

    /// Renders logical nametable `table` (0-3) with the background pattern table selected in CTRL.
    pub fn render_nametable<ImageT: Image>(&self, bus: &impl Bus, table: u16) -> ImageT {
        let mut image = ImageT::new(256, 240);
        let base = 0x2000 + (table & 3) * 0x400;
        let pattern_base = self.0.ctrl.background_table_base();
        for coarse_y in 0..30_u16 {
            for coarse_x in 0..32_u16 {
                let tile = peek(bus, base + coarse_y * 32 + coarse_x) as u16;
                let attribute = peek(bus, base + 0x3C0 + (coarse_y / 4) * 8 + coarse_x / 4);
                let shift = ((coarse_y & 2) << 1) | (coarse_x & 2);
                let palette = (attribute >> shift) & 3;
                self.draw_tile(
                    bus,
                    &mut image,
                    pattern_base + tile * 16,
                    palette,
                    (coarse_x as u32 * 8, coarse_y as u32 * 8),
                );
            }
        }
        image
    }

    /// Renders the 32 palette RAM entries as two rows of 8x8 squares.
    pub fn render_palette<ImageT: Image>(&self, bus: &impl Bus) -> ImageT {
        let mut image = ImageT::new(128, 16);
        for index in 0..32_u32 {
            let color = palette_color(bus, index as u8);
            let (x, y) = ((index % 16) * 8, (index / 16) * 8);
            for fine_y in 0..8 {
                for fine_x in 0..8 {
                    image.set_pixel((x + fine_x, y + fine_y), color);
                }
            }
        }
        image
    }

    /// Renders sprite `index` with its palette and flip bits. Transparent pixels stay at the
    /// image default.
    pub fn render_sprite<ImageT: Image>(&self, bus: &impl Bus, index: usize) -> ImageT {
        let sprite = self.0.oam.sprite(index);
        let height = self.0.ctrl.sprite_height();
        let mut image = ImageT::new(8, height as u32);
        let tile = sprite.tile as u16;
        let attributes = sprite.attributes;
        for row in 0..height {
            let source_row = if attributes.flip_vertical() {
                height - 1 - row
            } else {
                row
            };
            let pattern_addr = if height == 16 {
                ((tile & 1) << 12) + (tile & 0xFE) * 16 + (source_row / 8) * 16 + source_row % 8
            } else {
                self.0.ctrl.sprite_table_base() + tile * 16 + source_row
            };
            for column in 0..8_u16 {
                let source_column = if attributes.flip_horizontal() {
                    7 - column
                } else {
                    column
                };
                let pixel = pattern_pixel(bus, pattern_addr, source_column);
                if pixel != 0 {
                    let entry = 0x10 | (attributes.palette().value() << 2) | pixel;
                    image.set_pixel((column as u32, row as u32), palette_color(bus, entry));
                }
            }
        }
        image
    }

    fn draw_tile(
        &self,
        bus: &impl Bus,
        image: &mut impl Image,
        tile_addr: u16,
        palette: u8,
        origin: (u32, u32),
    ) {
        for fine_y in 0..8_u16 {
            for fine_x in 0..8_u16 {
                let pixel = pattern_pixel(bus, tile_addr + fine_y, fine_x);
                let entry = if pixel == 0 { 0 } else { ((palette & 7) << 2) | pixel };
                image.set_pixel(
                    (origin.0 + fine_x as u32, origin.1 + fine_y as u32),
                    palette_color(bus, entry),
                );
            }
        }
    }
}

fn peek(bus: &impl Bus, addr: u16) -> u8 {
    bus.peek_u8(addr).unwrap_or_default()
}

/// 2-bit pixel of column `x` in the tile row at `row_addr`.
fn pattern_pixel(bus: &impl Bus, row_addr: u16, x: u16) -> u8 {
    let shift = 7 - x;
    let low = (peek(bus, row_addr) >> shift) & 1;
    let high = (peek(bus, row_addr + 8) >> shift) & 1;
    low | (high << 1)
}

fn palette_color(bus: &impl Bus, entry: u8) -> Rgba32 {
    Rgba32::from_argb(color_argb(peek(bus, 0x3F00 | (entry & 0x1F) as u16)))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::common::debug_events::dummy_collector;
    use crate::components::ppu::PALETTE_ARGB;

    struct PeekBus(Vec<u8>);

    impl Bus for PeekBus {
        fn peek_u8(&self, addr: u16) -> Option<u8> {
            self.0.get(addr as usize).copied()
        }

        fn cycle_read_u8(&mut self, addr: u16) -> u8 {
            self.0[addr as usize]
        }

        fn cycle_write_u8(&mut self, addr: u16, value: u8) {
            self.0[addr as usize] = value;
        }

        fn reset(&mut self) {}
    }

    struct TestImage {
        width: u32,
        pixels: Vec<Rgba32>,
    }

    impl Image for TestImage {
        fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                pixels: vec![Rgba32::default(); (width * height) as usize],
            }
        }

        fn set_pixel(&mut self, index: (u32, u32), value: Rgba32) {
            self.pixels[(index.1 * self.width + index.0) as usize] = value;
        }
    }

    impl TestImage {
        fn argb(&self, x: u32, y: u32) -> u32 {
            self.pixels[(y * self.width + x) as usize].to_argb()
        }
    }

    fn test_bus() -> PeekBus {
        let mut memory = vec![0; 0x4000];
        // Tile 1: left column uses color 1, right column color 3.
        for row in 0..8 {
            memory[16 + row] = 0x81;
            memory[24 + row] = 0x01;
        }
        memory[0x3F00] = 0x0F;
        memory[0x3F01] = 0x16;
        memory[0x3F03] = 0x2A;
        memory[0x3F15] = 0x11;
        memory[0x3F17] = 0x30;
        PeekBus(memory)
    }

    #[test]
    fn test_registers_info() {
        let ppu = Ppu::new(dummy_collector());
        let info = ppu.debug().registers_info();
        assert!(info.starts_with("CTRL:00 MASK:00"), "{info}");
        assert!(info.ends_with("PreRender L:261 D:0"), "{info}");
    }

    #[test]
    fn test_render_pattern_table() {
        let ppu = Ppu::new(dummy_collector());
        let image: TestImage = ppu.debug().render_pattern_table(&test_bus(), 0, 0);
        assert_eq!(image.argb(0, 0), PALETTE_ARGB[0x0F]);
        assert_eq!(image.argb(8, 0), PALETTE_ARGB[0x16]);
        assert_eq!(image.argb(15, 7), PALETTE_ARGB[0x2A]);
        assert_eq!(image.argb(9, 0), PALETTE_ARGB[0x0F]);
    }

    #[test]
    fn test_render_nametable() {
        let ppu = Ppu::new(dummy_collector());
        let mut bus = test_bus();
        bus.0[0x2400 + 33] = 1;
        let image: TestImage = ppu.debug().render_nametable(&bus, 1);
        assert_eq!(image.argb(8, 8), PALETTE_ARGB[0x16]);
        assert_eq!(image.argb(0, 0), PALETTE_ARGB[0x0F]);
    }

    #[test]
    fn test_render_sprite_with_flip() {
        let mut ppu = Ppu::new(dummy_collector());
        let mut bus = test_bus();
        for value in [0x10, 0x01, 0x41, 0x20] {
            ppu.write_register(4, value, &mut TestPpuBus(&mut bus));
        }
        let image: TestImage = ppu.debug().render_sprite(&bus, 0);
        assert_eq!(image.argb(0, 0), PALETTE_ARGB[0x30]);
        assert_eq!(image.argb(7, 0), PALETTE_ARGB[0x11]);
        assert_eq!(image.argb(3, 0), 0);
        assert!(ppu.debug().sprite_info(0).contains("flip-h"));
    }

    /// Adapts the peek bus for register writes.
    struct TestPpuBus<'a>(&'a mut PeekBus);

    impl Bus for TestPpuBus<'_> {
        fn peek_u8(&self, addr: u16) -> Option<u8> {
            self.0.peek_u8(addr)
        }

        fn cycle_read_u8(&mut self, addr: u16) -> u8 {
            self.0.cycle_read_u8(addr)
        }

        fn cycle_write_u8(&mut self, addr: u16, value: u8) {
            self.0.cycle_write_u8(addr, value)
        }

        fn reset(&mut self) {}
    }

    impl crate::components::ppu::PpuBus for TestPpuBus<'_> {
        fn scanline_irq(&mut self, _scanline: u16, _rendering_enabled: bool) {}
        fn address_changed(&mut self, _addr: u16) {}
    }
}
