//! Implementation of the Picture Processing Unit (Ricoh 2C02).
//!
//! The PPU advances one dot per [Ppu::step]. Memory accesses go through a [PpuBus] that is passed
//! into every call that needs one, so the PPU does not own the nametables or the cartridge.
mod debug;
mod oam;
mod palette;
mod patch;
mod registers;

use anyhow::ensure;
use anyhow::Result;
use log::warn;
use serde::Deserialize;
use serde::Serialize;

pub use self::debug::PpuDebug;
pub use self::oam::Oam;
pub use self::oam::Sprite;
pub use self::oam::SpriteAttributes;
pub use self::palette::color_argb;
pub use self::palette::PALETTE_ARGB;
pub use self::patch::PpuPatch;
pub use self::registers::PpuCtrl;
pub use self::registers::PpuMask;
pub use self::registers::PpuStatus;
use crate::common::bus::Bus;
use crate::common::debug_events::DebugEvent;
use crate::common::debug_events::DebugEventCollectorRef;
use crate::common::save_state::decode_from;
use crate::common::save_state::encode_into;
use crate::common::save_state::ensure_version;
use crate::common::save_state::SaveStateComponent;

pub const SCREEN_WIDTH: usize = 256;
pub const SCREEN_HEIGHT: usize = 240;

pub const DOTS_PER_SCANLINE: u16 = 341;
pub const SCANLINES_PER_FRAME: u16 = 262;
const LAST_DOT: u16 = DOTS_PER_SCANLINE - 1;
const POST_RENDER_SCANLINE: u16 = 240;
const VBLANK_SCANLINE: u16 = 241;
/// Number reported for the pre-render scanline in events and cartridge callbacks.
pub const PRE_RENDER_SCANLINE: u16 = 261;

/// PPU dots between setting the vblank flag and asserting NMI.
const NMI_DELAY: u8 = 15;

/// The PPU address space as seen by the PPU.
pub trait PpuBus: Bus {
    /// Signals the cartridge that the PPU reached the scanline IRQ dot of `scanline`.
    fn scanline_irq(&mut self, scanline: u16, rendering_enabled: bool);
    /// Called whenever the VRAM address is changed by a CPU access to the PPU registers.
    fn address_changed(&mut self, addr: u16);
}

#[derive(
    Default, Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
pub enum PipelineState {
    #[default]
    PreRender,
    Render,
    PostRender,
    VerticalBlank,
}

/// Encoded representation of the PPU.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
struct PpuState {
    ctrl: u8,
    mask: u8,
    status: u8,
    t: u16,
    v: u16,
    fine_x: u8,
    data_buffer: u8,
    write_toggle: bool,
    nmi_delay: u8,
    oam: Oam,
    pipeline: PipelineState,
    dot: u16,
    scanline: u16,
    even_frame: bool,
}

impl PpuState {
    /// Rejects positions and counters that the pipeline can never reach.
    fn validate(&self) -> Result<()> {
        ensure!(self.dot <= LAST_DOT, "PPU dot {} out of range", self.dot);
        let scanline_valid = match self.pipeline {
            PipelineState::PreRender => self.scanline == 0,
            PipelineState::Render => self.scanline < POST_RENDER_SCANLINE,
            PipelineState::PostRender => self.scanline == POST_RENDER_SCANLINE,
            PipelineState::VerticalBlank => {
                (VBLANK_SCANLINE..PRE_RENDER_SCANLINE).contains(&self.scanline)
            }
        };
        ensure!(
            scanline_valid,
            "PPU scanline {} does not match pipeline state {}",
            self.scanline,
            self.pipeline
        );
        ensure!(self.nmi_delay <= NMI_DELAY, "PPU NMI delay out of range");
        self.oam.validate()
    }
}

pub struct Ppu {
    ctrl: PpuCtrl,
    mask: PpuMask,
    status: PpuStatus,
    /// Temporary VRAM address (loopy t).
    t: u16,
    /// Current VRAM address (loopy v).
    v: u16,
    fine_x: u8,
    /// PPUDATA read buffer.
    data_buffer: u8,
    /// Shared first/second write toggle of PPUSCROLL and PPUADDR.
    write_toggle: bool,
    nmi_delay: u8,
    nmi_pending: bool,
    oam: Oam,
    pipeline: PipelineState,
    dot: u16,
    scanline: u16,
    even_frame: bool,
    patch: PpuPatch,
    frames: [Vec<u32>; 2],
    back_buffer: usize,
    frame_ready: bool,
    debug_event_collector: DebugEventCollectorRef,
}

impl Ppu {
    pub fn new(debug_event_collector: DebugEventCollectorRef) -> Self {
        Self {
            ctrl: PpuCtrl::default(),
            mask: PpuMask::default(),
            status: PpuStatus::default(),
            t: 0,
            v: 0,
            fine_x: 0,
            data_buffer: 0,
            write_toggle: false,
            nmi_delay: 0,
            nmi_pending: false,
            oam: Oam::default(),
            pipeline: PipelineState::PreRender,
            dot: 0,
            scanline: 0,
            even_frame: true,
            patch: PpuPatch::default(),
            frames: [
                vec![0; SCREEN_WIDTH * SCREEN_HEIGHT],
                vec![0; SCREEN_WIDTH * SCREEN_HEIGHT],
            ],
            back_buffer: 0,
            frame_ready: false,
            debug_event_collector,
        }
    }

    pub fn power_up(&mut self) {
        self.ctrl = PpuCtrl::default();
        self.mask = PpuMask::default();
        self.status = PpuStatus::default();
        self.oam.write_addr(0);
        self.t = 0;
        self.v = 0;
        self.fine_x = 0;
        self.data_buffer = 0;
        self.write_toggle = false;
        self.restart_frame();
        self.debug_event_collector.on_event(DebugEvent::PpuPowerOn);
    }

    /// Reset keeps VRAM addresses, OAM and the status register.
    pub fn reset(&mut self) {
        self.ctrl = PpuCtrl::default();
        self.mask = PpuMask::default();
        self.data_buffer = 0;
        self.write_toggle = false;
        self.restart_frame();
        self.debug_event_collector.on_event(DebugEvent::PpuReset);
    }

    fn restart_frame(&mut self) {
        self.pipeline = PipelineState::PreRender;
        self.dot = 0;
        self.scanline = 0;
        self.even_frame = true;
        self.nmi_delay = 0;
        self.nmi_pending = false;
        self.frame_ready = false;
    }

    pub fn set_patch(&mut self, patch: PpuPatch) {
        self.patch = patch;
    }

    /// Advances the PPU by one dot.
    pub fn step(&mut self, bus: &mut impl PpuBus) {
        if self.nmi_delay > 0 {
            self.nmi_delay -= 1;
            if self.nmi_delay == 0 {
                self.nmi_pending = true;
            }
        }
        if self.dot == 0 {
            let scanline = self.reported_scanline();
            self.debug_event_collector
                .emit(|| DebugEvent::ScanlineStart(scanline));
        }

        let scanline_done = match self.pipeline {
            PipelineState::PreRender => self.step_pre_render(bus),
            PipelineState::Render => self.step_render(bus),
            PipelineState::PostRender => self.step_post_render(),
            PipelineState::VerticalBlank => self.step_vertical_blank(),
        };
        if scanline_done {
            self.dot = 0;
        } else {
            self.dot += 1;
        }
        self.debug_event_collector.emit(|| DebugEvent::PpuStepped);
    }

    fn step_pre_render(&mut self, bus: &mut impl PpuBus) -> bool {
        let rendering_enabled = self.mask.rendering_enabled();
        match self.dot {
            0 => self.debug_event_collector.emit(|| DebugEvent::FrameStart),
            1 => {
                self.status.set_vblank(false);
                self.status.set_sprite_zero_hit(false);
                self.status.set_sprite_overflow(false);
                self.oam.clear_secondary();
            }
            257 if rendering_enabled => self.copy_horizontal_position(),
            _ => (),
        }
        if rendering_enabled && (280..=304).contains(&self.dot) {
            self.copy_vertical_position();
        }
        if self.dot == self.patch.scanline_irq_dot {
            bus.scanline_irq(PRE_RENDER_SCANLINE, rendering_enabled);
        }

        // Odd frames are one dot shorter while rendering.
        let last_dot = if !self.even_frame && rendering_enabled {
            LAST_DOT - 1
        } else {
            LAST_DOT
        };
        if self.dot >= last_dot {
            self.end_scanline(PRE_RENDER_SCANLINE);
            self.pipeline = PipelineState::Render;
            self.scanline = 0;
            return true;
        }
        false
    }

    fn step_render(&mut self, bus: &mut impl PpuBus) -> bool {
        if (1..=SCREEN_WIDTH as u16).contains(&self.dot) {
            self.render_pixel(bus, self.dot - 1);
        }
        let show_background = self.mask.show_background();
        match self.dot {
            256 if show_background => self.increment_vertical_position(),
            257 if show_background => self.copy_horizontal_position(),
            _ => (),
        }
        if self.dot == self.patch.scanline_irq_dot {
            bus.scanline_irq(self.scanline, self.mask.rendering_enabled());
        }
        if self.dot < LAST_DOT {
            return false;
        }

        let overflow = self.oam.evaluate(
            self.scanline,
            self.ctrl.sprite_height(),
            self.mask.rendering_enabled(),
        );
        if overflow {
            self.status.set_sprite_overflow(true);
        }
        self.end_scanline(self.scanline);
        self.scanline += 1;
        if self.scanline >= POST_RENDER_SCANLINE {
            self.pipeline = PipelineState::PostRender;
        }
        true
    }

    fn step_post_render(&mut self) -> bool {
        if self.dot < LAST_DOT {
            return false;
        }
        self.end_scanline(self.scanline);
        self.scanline += 1;
        self.pipeline = PipelineState::VerticalBlank;
        self.back_buffer ^= 1;
        self.frame_ready = true;
        true
    }

    fn step_vertical_blank(&mut self) -> bool {
        if self.scanline == VBLANK_SCANLINE && self.dot == 1 {
            self.status.set_vblank(true);
            if self.ctrl.nmi_enable() {
                self.nmi_delay = NMI_DELAY;
            }
        }
        if self.dot < LAST_DOT {
            return false;
        }
        self.end_scanline(self.scanline);
        self.scanline += 1;
        if self.scanline >= PRE_RENDER_SCANLINE {
            self.pipeline = PipelineState::PreRender;
            self.scanline = 0;
            self.even_frame = !self.even_frame;
            self.debug_event_collector.emit(|| DebugEvent::FrameEnd);
        }
        true
    }

    fn end_scanline(&self, scanline: u16) {
        self.debug_event_collector
            .emit(|| DebugEvent::ScanlineEnd(scanline));
    }

    fn render_pixel(&mut self, bus: &mut impl PpuBus, x: u16) {
        let y = self.scanline;
        let background = self.background_pixel(bus, x);
        let sprite = self.sprite_pixel(bus, x, y, background);

        let background_opaque = background & 0x03 != 0;
        let palette_index = match sprite {
            Some((color, in_front)) if in_front || !background_opaque => color,
            _ if background_opaque => background,
            _ => 0,
        };
        let mut entry = bus.cycle_read_u8(0x3F00 | palette_index as u16);
        if self.mask.grayscale() {
            entry &= 0x30;
        }
        self.frames[self.back_buffer][y as usize * SCREEN_WIDTH + x as usize] = color_argb(entry);
    }

    /// Returns the 4-bit palette index of the background at `x`. Zero in the low two bits is
    /// transparent.
    fn background_pixel(&mut self, bus: &mut impl PpuBus, x: u16) -> u8 {
        if !self.mask.show_background() {
            return 0;
        }
        let fine_x = (self.fine_x as u16 + x) % 8;
        let mut pixel = 0;
        if self.mask.show_background_left() || x >= 8 {
            let v = self.v;
            let tile = bus.cycle_read_u8(0x2000 | (v & 0x0FFF)) as u16;
            let pattern_addr = tile * 16 + ((v >> 12) & 7) + self.ctrl.background_table_base();
            let shift = 7 ^ fine_x;
            let low = (bus.cycle_read_u8(pattern_addr) >> shift) & 1;
            let high = (bus.cycle_read_u8(pattern_addr + 8) >> shift) & 1;
            let attribute =
                bus.cycle_read_u8(0x23C0 | (v & 0x0C00) | ((v >> 4) & 0x38) | ((v >> 2) & 0x07));
            let attribute_shift = ((v >> 4) & 4) | (v & 2);
            let palette = (attribute >> attribute_shift) & 3;
            pixel = low | (high << 1) | (palette << 2);
        }
        if fine_x == 7 {
            self.increment_horizontal_position();
        }
        pixel
    }

    /// Returns the palette index and front priority of the first opaque sprite pixel at `x`.
    fn sprite_pixel(
        &mut self,
        bus: &mut impl PpuBus,
        x: u16,
        y: u16,
        background: u8,
    ) -> Option<(u8, bool)> {
        if !self.mask.show_sprites() || (!self.mask.show_sprites_left() && x < 8) {
            return None;
        }
        let height = self.ctrl.sprite_height();
        let sprites: Vec<Sprite> = self.oam.secondary().collect();
        for sprite in sprites {
            let column = x as i32 - sprite.x as i32;
            if !(0..8).contains(&column) {
                continue;
            }
            let attributes = sprite.attributes;
            let mut x_shift = column as u16 % 8;
            if !attributes.flip_horizontal() {
                x_shift ^= 7;
            }
            let sprite_top = sprite.y as i32 + 1;
            let mut row = (y as i32 - sprite_top).rem_euclid(height as i32) as u16;
            if attributes.flip_vertical() {
                row ^= height - 1;
            }
            let tile = sprite.tile as u16;
            let pattern_addr = if height == 16 {
                let row = (row & 7) | ((row & 8) << 1);
                ((tile >> 1) * 32 + row) | ((tile & 1) << 12)
            } else {
                tile * 16 + row + self.ctrl.sprite_table_base()
            };
            let low = (bus.cycle_read_u8(pattern_addr) >> x_shift) & 1;
            let high = (bus.cycle_read_u8(pattern_addr + 8) >> x_shift) & 1;
            let pixel = low | (high << 1);
            if pixel == 0 {
                continue;
            }

            if sprite.index == 0
                && background & 0x03 != 0
                && x != 255
                && self.mask.show_background()
            {
                self.status.set_sprite_zero_hit(true);
            }
            let color = pixel | 0x10 | (attributes.palette().value() << 2);
            return Some((color, !attributes.behind_background()));
        }
        None
    }

    fn increment_horizontal_position(&mut self) {
        if self.v & 0x001F == 31 {
            self.v &= !0x001F;
            self.v ^= 0x0400;
        } else {
            self.v += 1;
        }
    }

    fn increment_vertical_position(&mut self) {
        if self.v & 0x7000 != 0x7000 {
            self.v += 0x1000;
            return;
        }
        self.v &= !0x7000;
        let mut coarse_y = (self.v & 0x03E0) >> 5;
        if coarse_y == 29 {
            coarse_y = 0;
            self.v ^= 0x0800;
        } else if coarse_y == 31 {
            coarse_y = 0;
        } else {
            coarse_y += 1;
        }
        self.v = (self.v & !0x03E0) | (coarse_y << 5);
    }

    fn copy_horizontal_position(&mut self) {
        self.v = (self.v & !0x041F) | (self.t & 0x041F);
    }

    fn copy_vertical_position(&mut self) {
        self.v = (self.v & !0x7BE0) | (self.t & 0x7BE0);
    }

    /// Reads one of the 8 registers at $2000-$2007, `addr` is taken modulo 8.
    pub fn read_register(&mut self, addr: u16, bus: &mut impl PpuBus) -> u8 {
        match addr & 7 {
            2 => {
                let value = u8::from(self.status) & 0xE0;
                self.status.set_vblank(false);
                self.write_toggle = false;
                value
            }
            4 => self.oam.read_data(),
            7 => {
                let addr = self.v & 0x3FFF;
                let mut value = bus.cycle_read_u8(addr);
                // Reads below the palette are delayed by one access.
                if addr < 0x3F00 {
                    std::mem::swap(&mut value, &mut self.data_buffer);
                }
                self.increment_address(bus);
                value
            }
            _ => self.data_buffer,
        }
    }

    /// Side effect free version of [Ppu::read_register].
    pub fn peek_register(&self, addr: u16) -> u8 {
        match addr & 7 {
            2 => u8::from(self.status) & 0xE0,
            4 => self.oam.read_data(),
            _ => self.data_buffer,
        }
    }

    pub fn write_register(&mut self, addr: u16, value: u8, bus: &mut impl PpuBus) {
        match addr & 7 {
            0 => {
                let previous = self.ctrl;
                self.ctrl = PpuCtrl::from(value);
                self.t = (self.t & !0x0C00) | ((value as u16 & 0x03) << 10);
                // Enabling NMI during vblank triggers it immediately.
                if self.pipeline == PipelineState::VerticalBlank
                    && self.status.vblank()
                    && !previous.nmi_enable()
                    && self.ctrl.nmi_enable()
                {
                    self.nmi_delay = NMI_DELAY;
                }
            }
            1 => self.mask = PpuMask::from(value),
            2 => (),
            3 => self.oam.write_addr(value),
            4 => self.oam.write_data(value),
            5 => {
                if !self.write_toggle {
                    self.t = (self.t & !0x001F) | (value as u16 >> 3);
                    self.fine_x = value & 0x07;
                } else {
                    self.t = (self.t & !0x73E0)
                        | ((value as u16 & 0x07) << 12)
                        | ((value as u16 & 0xF8) << 2);
                }
                self.write_toggle = !self.write_toggle;
            }
            6 => {
                if !self.write_toggle {
                    self.t = (self.t & 0x00FF) | ((value as u16 & 0x3F) << 8);
                } else {
                    self.t = (self.t & 0xFF00) | value as u16;
                    self.v = self.t;
                    bus.address_changed(self.v);
                    let v = self.v;
                    self.debug_event_collector.emit(|| DebugEvent::PpuAddr(v));
                }
                self.write_toggle = !self.write_toggle;
            }
            7 => {
                if self.write_toggle {
                    warn!("PPUDATA write while PPUADDR is half written");
                }
                bus.cycle_write_u8(self.v & 0x3FFF, value);
                self.increment_address(bus);
            }
            _ => unreachable!(),
        }
    }

    fn increment_address(&mut self, bus: &mut impl PpuBus) {
        self.v = self.v.wrapping_add(self.ctrl.address_increment()) & 0x7FFF;
        bus.address_changed(self.v & 0x3FFF);
    }

    /// Copies a 256 byte page into OAM. The CPU side of the transfer is handled by the CPU bus.
    pub fn oam_dma(&mut self, page: &[u8]) {
        self.oam.dma(page);
    }

    /// Returns true once after the vblank NMI has been asserted.
    pub fn take_nmi(&mut self) -> bool {
        std::mem::take(&mut self.nmi_pending)
    }

    /// Returns true once after a frame has been completed.
    pub fn take_frame(&mut self) -> bool {
        std::mem::take(&mut self.frame_ready)
    }

    /// The last completed frame as 256x240 ARGB pixels.
    pub fn frame(&self) -> &[u32] {
        &self.frames[self.back_buffer ^ 1]
    }

    pub fn pipeline_state(&self) -> PipelineState {
        self.pipeline
    }

    pub fn scanline(&self) -> u16 {
        self.scanline
    }

    /// Scanline number as used by events, 261 during pre-render.
    pub fn reported_scanline(&self) -> u16 {
        if self.pipeline == PipelineState::PreRender {
            PRE_RENDER_SCANLINE
        } else {
            self.scanline
        }
    }

    pub fn dot(&self) -> u16 {
        self.dot
    }

    pub fn is_even_frame(&self) -> bool {
        self.even_frame
    }

    pub fn ctrl(&self) -> PpuCtrl {
        self.ctrl
    }

    pub fn mask(&self) -> PpuMask {
        self.mask
    }

    pub fn status(&self) -> PpuStatus {
        self.status
    }

    pub fn rendering_enabled(&self) -> bool {
        self.mask.rendering_enabled()
    }

    pub fn vram_address(&self) -> u16 {
        self.v
    }

    pub fn temp_address(&self) -> u16 {
        self.t
    }

    pub fn fine_x(&self) -> u8 {
        self.fine_x
    }

    pub fn oam(&self) -> &Oam {
        &self.oam
    }

    pub fn debug(&self) -> PpuDebug<'_> {
        PpuDebug(self)
    }

    fn state(&self) -> PpuState {
        PpuState {
            ctrl: self.ctrl.into(),
            mask: self.mask.into(),
            status: self.status.into(),
            t: self.t,
            v: self.v,
            fine_x: self.fine_x,
            data_buffer: self.data_buffer,
            write_toggle: self.write_toggle,
            nmi_delay: self.nmi_delay,
            oam: self.oam.clone(),
            pipeline: self.pipeline,
            dot: self.dot,
            scanline: self.scanline,
            even_frame: self.even_frame,
        }
    }
}

impl SaveStateComponent for Ppu {
    fn save_state(&self, out: &mut Vec<u8>) -> Result<()> {
        encode_into(&self.state(), out)
    }

    fn load_state(&mut self, version: u32, input: &mut &[u8]) -> Result<()> {
        ensure_version("PPU", version)?;
        let state: PpuState = decode_from(input)?;
        state.validate()?;
        self.ctrl = state.ctrl.into();
        self.mask = state.mask.into();
        self.status = state.status.into();
        self.t = state.t;
        self.v = state.v;
        self.fine_x = state.fine_x;
        self.data_buffer = state.data_buffer;
        self.write_toggle = state.write_toggle;
        self.nmi_delay = state.nmi_delay;
        self.oam = state.oam;
        self.pipeline = state.pipeline;
        self.dot = state.dot;
        self.scanline = state.scanline;
        self.even_frame = state.even_frame;
        self.nmi_pending = false;
        self.frame_ready = false;
        Ok(())
    }
}
