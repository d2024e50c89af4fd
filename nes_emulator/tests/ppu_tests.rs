//! High level testing of the PPU as seen through the CPU bus.
mod util;

use image::RgbaImage;
use nes_emulator::common::bus::Bus;
use nes_emulator::common::image::Image;
use nes_emulator::common::image::Rgba32;
use nes_emulator::components::cartridge::Mirroring;
use nes_emulator::debugger::EventFilter;
use nes_emulator::Nes;
use pretty_assertions::assert_eq;
use util::rom_builder::RomBuilder;

fn set_vram_address(nes: &mut Nes, addr: u16) {
    nes.cpu.bus.cycle_write_u8(0x2006, (addr >> 8) as u8);
    nes.cpu.bus.cycle_write_u8(0x2006, addr as u8);
}

fn write_vram(nes: &mut Nes, addr: u16, values: &[u8]) {
    set_vram_address(nes, addr);
    for value in values {
        nes.cpu.bus.cycle_write_u8(0x2007, *value);
    }
}

/// Reads through the PPUDATA buffer, discarding the stale first read.
fn read_vram(nes: &mut Nes, addr: u16) -> u8 {
    set_vram_address(nes, addr);
    nes.cpu.bus.cycle_read_u8(0x2007);
    nes.cpu.bus.cycle_read_u8(0x2007)
}

#[test]
fn test_ppudata_reads_are_buffered() {
    let mut nes = RomBuilder::nrom().nes();
    write_vram(&mut nes, 0x2108, &[0x55, 0x66]);
    set_vram_address(&mut nes, 0x2108);
    // The first read returns the stale buffer.
    nes.cpu.bus.cycle_read_u8(0x2007);
    assert_eq!(nes.cpu.bus.cycle_read_u8(0x2007), 0x55);
    assert_eq!(nes.cpu.bus.cycle_read_u8(0x2007), 0x66);
}

#[test]
fn test_horizontal_mirroring() {
    let mut nes = RomBuilder::nrom().nes();
    write_vram(&mut nes, 0x2010, &[0x11]);
    write_vram(&mut nes, 0x2810, &[0x22]);
    assert_eq!(read_vram(&mut nes, 0x2410), 0x11);
    assert_eq!(read_vram(&mut nes, 0x2C10), 0x22);
    // $3000-$3EFF mirrors the nametables.
    assert_eq!(read_vram(&mut nes, 0x3010), 0x11);
}

#[test]
fn test_vertical_mirroring() {
    let mut nes = RomBuilder::nrom().mirroring(Mirroring::Vertical).nes();
    write_vram(&mut nes, 0x2010, &[0x11]);
    write_vram(&mut nes, 0x2410, &[0x22]);
    assert_eq!(read_vram(&mut nes, 0x2810), 0x11);
    assert_eq!(read_vram(&mut nes, 0x2C10), 0x22);
}

#[test]
fn test_palette_reads_are_not_buffered() {
    let mut nes = RomBuilder::nrom().nes();
    write_vram(&mut nes, 0x3F10, &[0x21]);
    set_vram_address(&mut nes, 0x3F00);
    assert_eq!(nes.cpu.bus.cycle_read_u8(0x2007), 0x21);
    assert_eq!(nes.debug().peek_ppu(0x3F00), Some(0x21));
}

#[test]
fn test_address_increment_32() {
    let mut nes = RomBuilder::nrom().nes();
    nes.cpu.bus.cycle_write_u8(0x2000, 0x04);
    write_vram(&mut nes, 0x2000, &[1, 2]);
    nes.cpu.bus.cycle_write_u8(0x2000, 0x00);
    assert_eq!(nes.debug().peek_ppu(0x2000), Some(1));
    assert_eq!(nes.debug().peek_ppu(0x2020), Some(2));
}

#[test]
fn test_ppuaddr_debug_event() {
    let mut nes = RomBuilder::nrom().nes();
    nes.debugger().enable();
    nes.debugger()
        .add_log_point("ppuaddr 2000:23FF".parse::<EventFilter>().unwrap());
    set_vram_address(&mut nes, 0x2345);
    set_vram_address(&mut nes, 0x3F00);
    assert_eq!(nes.debugger().log.len(), 1);
}

#[test]
fn test_vblank_flag_is_cleared_by_read() {
    let mut nes = RomBuilder::nrom().nes();
    nes.debug_until("scanline 242".parse().unwrap());
    assert_eq!(nes.cpu.bus.cycle_read_u8(0x2002) & 0x80, 0x80);
    assert_eq!(nes.cpu.bus.cycle_read_u8(0x2002) & 0x80, 0x00);
}

#[test]
fn test_oam_dma() {
    let mut nes = RomBuilder::nrom().nes();
    for i in 0..256_u16 {
        nes.cpu.bus.cycle_write_u8(0x0300 + i, i as u8);
    }
    nes.cpu.bus.cycle_write_u8(0x4014, 0x03);
    assert_eq!(nes.debug().peek_oam(0), 0);
    assert_eq!(nes.debug().peek_oam(0x7F), 0x7F);
    assert_eq!(nes.debug().peek_oam(0xFF), 0xFF);
}

struct TestImageImpl {
    inner: RgbaImage,
}

impl Image for TestImageImpl {
    fn new(width: u32, height: u32) -> Self {
        TestImageImpl {
            inner: RgbaImage::new(width, height),
        }
    }

    fn set_pixel(&mut self, index: (u32, u32), value: Rgba32) {
        self.inner[(index.0, index.1)] = image::Rgba::from(value.0);
    }
}

#[test]
fn test_render_pattern_table() {
    let nes = RomBuilder::nrom().nes();
    let image: TestImageImpl = nes.debug().render_pattern_table(0, 0);
    assert_eq!(image.inner.dimensions(), (128, 128));
    // Tile 64 is in the second 1 KB of CHR, where every byte is 0x01. Only its rightmost
    // column has a non-zero color index.
    assert_ne!(image.inner[(7, 32)], image.inner[(6, 32)]);
    assert_eq!(image.inner[(7, 32)], image.inner[(7, 39)]);
    assert_eq!(image.inner[(0, 0)], image.inner[(6, 32)]);
}

#[test]
fn test_render_palette_and_nametable() {
    let mut nes = RomBuilder::nrom().nes();
    write_vram(&mut nes, 0x3F00, &[0x0F, 0x30]);
    let palette: TestImageImpl = nes.debug().render_palette();
    assert_eq!(palette.inner.dimensions(), (128, 16));
    assert_ne!(palette.inner[(0, 0)], palette.inner[(8, 0)]);
    assert_eq!(palette.inner[(0, 0)], palette.inner[(7, 7)]);

    let nametable: TestImageImpl = nes.debug().render_nametable(0);
    assert_eq!(nametable.inner.dimensions(), (256, 240));
    let sprite: TestImageImpl = nes.debug().render_sprite(0);
    assert_eq!(sprite.inner.dimensions(), (8, 8));
}

#[test]
fn test_frame_is_backdrop_color_while_rendering_is_off() {
    let mut nes = RomBuilder::nrom().nes();
    nes.execute_frames(2);
    let frame: TestImageImpl = nes.frame();
    assert_eq!(frame.inner.dimensions(), (256, 240));
    let backdrop = frame.inner[(0, 0)];
    assert!(frame.inner.pixels().all(|pixel| *pixel == backdrop));
}
