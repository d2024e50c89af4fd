pub mod common;
pub mod components;
pub mod controller;
pub mod cpu_bus;
pub mod debugger;
pub mod devices;
pub mod emulator;
pub mod ppu_bus;
pub mod save_state;

use std::cell::RefCell;
use std::cell::RefMut;
use std::collections::HashMap;
use std::ops::Deref;
use std::rc::Rc;

use anyhow::Result;
use log::info;

use crate::common::bus::Bus;
use crate::common::debug_events::CpuTraceLine;
use crate::common::debug_events::DebugEvent;
use crate::common::debug_events::DebugEventCollectorRef;
use crate::common::image::image_from_argb;
use crate::common::image::Image;
use crate::common::save_state::SaveStateComponent;
use crate::components::apu::AudioChannels;
use crate::components::cartridge::Cartridge;
use crate::components::cpu::Cpu;
use crate::components::cpu::InterruptKind;
use crate::components::ppu::PpuDebug;
use crate::components::ppu::PpuPatch;
use crate::components::ppu::SCREEN_HEIGHT;
use crate::components::ppu::SCREEN_WIDTH;
use crate::controller::default_controller_types;
use crate::controller::ControllerType;
use crate::cpu_bus::CpuBusImpl;
use crate::debugger::BreakReason;
use crate::debugger::Debugger;
use crate::debugger::EventFilter;
use crate::devices::AudioDevice;
use crate::devices::Devices;
use crate::devices::NullAudio;
use crate::devices::NullInput;
use crate::devices::NullVideo;
use crate::devices::VideoDevice;
use crate::save_state::SaveStateSystem;

/// CPU cycles of one NTSC frame. Each cycle runs 3 PPU dots.
pub const CPU_CYCLES_PER_FRAME: u32 = 29_781;

pub type DebuggerRef = Rc<RefCell<Debugger>>;

#[derive(Debug, PartialEq, Eq)]
pub enum ExecutionResult {
    Normal,
    /// Execution was cancelled by the caller before the frame was complete.
    Stopped,
    Break(BreakReason),
}

/// The console: CPU, PPU, APU and cartridge wired together, plus the devices they talk to.
pub struct Nes {
    pub cpu: Cpu<CpuBusImpl>,
    video: Box<dyn VideoDevice>,
    audio: Box<dyn AudioDevice>,
    debugger: DebuggerRef,
    debug_event_collector: DebugEventCollectorRef,
    controller_overrides: HashMap<u32, [ControllerType; 2]>,
    /// CPU cycles already run of the current frame.
    frame_cycle: u32,
    frame_count: u64,
}

impl Nes {
    /// Wires up a powered on system for `cartridge`.
    pub fn new(cartridge: Cartridge) -> Self {
        let debugger = Rc::new(RefCell::new(Debugger::new()));
        let collector = DebugEventCollectorRef(debugger.clone());
        let mut nes = Self {
            cpu: Cpu::new(
                CpuBusImpl::new(cartridge, collector.clone()),
                collector.clone(),
            ),
            video: Box::new(NullVideo),
            audio: Box::new(NullAudio),
            debugger,
            debug_event_collector: collector,
            controller_overrides: HashMap::new(),
            frame_cycle: 0,
            frame_count: 0,
        };
        nes.configure_for_cartridge();
        nes.power_on();
        nes
    }

    pub fn with_ines_data(data: &[u8]) -> Result<Self> {
        Ok(Self::new(Cartridge::with_ines_data(data)?))
    }

    /// Swaps in a new cartridge and powers the system on again.
    pub fn load_cartridge(&mut self, cartridge: Cartridge) -> Cartridge {
        let previous = std::mem::replace(&mut self.cpu.bus.cartridge, cartridge);
        self.configure_for_cartridge();
        self.power_on();
        previous
    }

    fn configure_for_cartridge(&mut self) {
        let crc = self.cpu.bus.cartridge.checksum();
        info!(
            "Loaded ROM {:08X}: mapper {}, {} mirroring",
            crc,
            self.cpu.bus.cartridge.rom().mapper,
            self.cpu.bus.cartridge.mirroring()
        );
        self.cpu.bus.ppu.set_patch(PpuPatch::for_checksum(crc));
        self.apply_controller_types();
        self.debug_event_collector
            .on_event(DebugEvent::RomLoaded { checksum: crc });
    }

    fn apply_controller_types(&mut self) {
        let crc = self.cpu.bus.cartridge.checksum();
        let types = self
            .controller_overrides
            .get(&crc)
            .copied()
            .unwrap_or_else(|| default_controller_types(crc));
        for (controller, controller_type) in self.cpu.bus.controllers.iter_mut().zip(types) {
            controller.set_controller_type(controller_type);
        }
    }

    /// Selects the device on `port` for the title with checksum `crc`.
    pub fn set_controller_override(
        &mut self,
        crc: u32,
        port: usize,
        controller_type: ControllerType,
    ) {
        let types = self
            .controller_overrides
            .entry(crc)
            .or_insert_with(|| default_controller_types(crc));
        if let Some(entry) = types.get_mut(port) {
            *entry = controller_type;
        }
        if crc == self.cpu.bus.cartridge.checksum() {
            self.apply_controller_types();
        }
    }

    pub fn power_on(&mut self) {
        self.cpu.bus.power_up();
        self.cpu.reset();
        self.frame_cycle = 0;
    }

    /// Presses the reset button. RAM keeps its contents.
    pub fn reset(&mut self) {
        self.cpu.bus.reset();
        self.cpu.reset();
        self.frame_cycle = 0;
    }

    pub fn set_devices(&mut self, devices: Devices) {
        self.cpu.bus.input = devices.input;
        self.video = devices.video;
        self.audio = devices.audio;
    }

    /// Disconnects the devices, leaving null devices in their place.
    pub fn take_devices(&mut self) -> Devices {
        Devices {
            input: std::mem::replace(&mut self.cpu.bus.input, Box::new(NullInput)),
            video: std::mem::replace(&mut self.video, Box::new(NullVideo)),
            audio: std::mem::replace(&mut self.audio, Box::new(NullAudio)),
        }
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.cpu.bus.apu.set_volume(volume);
    }

    pub fn set_audio_channels(&mut self, channels: AudioChannels) {
        self.cpu.bus.apu.set_channels(channels);
    }

    /// Number of frames completed by the PPU since construction.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// One CPU cycle: three PPU dots, one CPU cycle, one APU cycle and the cartridge clock.
    fn step(&mut self) {
        for _ in 0..3 {
            self.cpu.bus.step_ppu();
            if self.cpu.bus.ppu.take_nmi() {
                self.cpu.interrupt(InterruptKind::Nmi);
            }
            if self.cpu.bus.ppu.take_frame() {
                self.end_frame();
            }
        }
        self.cpu.step();
        self.cpu.bus.tick_apu();
        self.cpu.bus.cartridge.mapper_mut().m2_cycle();
        // IRQ is level triggered. It is only latched while the CPU accepts it.
        if self.cpu.bus.irq_line() && !self.cpu.status.irq_disable {
            self.cpu.interrupt(InterruptKind::Irq);
        }
        self.debug_event_collector
            .emit(|| DebugEvent::EmulatorStepped);
    }

    fn end_frame(&mut self) {
        puffin::profile_function!();
        self.frame_count += 1;
        if self.video.wants_frame() {
            self.video
                .push_frame(SCREEN_WIDTH, SCREEN_HEIGHT, self.cpu.bus.ppu.frame());
        }
        let audio = &mut self.audio;
        self.cpu
            .bus
            .flush_audio(|samples| audio.push_samples(samples));
    }

    /// Runs the fixed 29781 cycle frame loop. `should_stop` is checked before each cycle; a
    /// stopped frame continues where it left off on the next call.
    pub fn run_frame_until(&mut self, mut should_stop: impl FnMut() -> bool) -> ExecutionResult {
        puffin::profile_function!();
        while self.frame_cycle < CPU_CYCLES_PER_FRAME {
            if should_stop() {
                return ExecutionResult::Stopped;
            }
            self.step();
            self.frame_cycle += 1;
            if let Some(break_reason) = self.debugger().take_break_reason() {
                return ExecutionResult::Break(break_reason);
            }
        }
        self.frame_cycle = 0;
        ExecutionResult::Normal
    }

    pub fn run_one_frame(&mut self) -> ExecutionResult {
        self.run_frame_until(|| false)
    }

    pub fn execute_frames(&mut self, count: u64) -> ExecutionResult {
        for _ in 0..count {
            match self.run_one_frame() {
                ExecutionResult::Normal => (),
                other => return other,
            }
        }
        ExecutionResult::Normal
    }

    /// Runs until `event` happens, or another break point is hit.
    pub fn debug_until(&mut self, event: EventFilter) -> ExecutionResult {
        self.debugger().enable();
        self.debugger().add_break_point(event.clone());
        let result = loop {
            self.step();
            self.frame_cycle = (self.frame_cycle + 1) % CPU_CYCLES_PER_FRAME;
            if let Some(break_reason) = self.debugger().take_break_reason() {
                if break_reason.trigger == event {
                    break ExecutionResult::Normal;
                } else {
                    break ExecutionResult::Break(break_reason);
                }
            }
        };
        self.debugger().remove_break_point(&event);
        result
    }

    /// The last completed frame.
    pub fn frame<ImageT: Image>(&self) -> ImageT {
        image_from_argb(
            SCREEN_WIDTH as u32,
            SCREEN_HEIGHT as u32,
            self.cpu.bus.ppu.frame(),
        )
    }

    pub fn save_state(&self) -> Result<Vec<u8>> {
        save_state::build(self)
    }

    /// Restores a blob created by [Nes::save_state]. Nothing changes if it fails.
    pub fn load_state(&mut self, data: &[u8]) -> Result<()> {
        save_state::restore(self, data)
    }

    /// Exposes debug information for investigating the system state.
    pub fn debug(&self) -> NesDebug<'_> {
        NesDebug(self)
    }

    /// Exposes an interactive debugger to set break and log points.
    pub fn debugger(&self) -> RefMut<'_, Debugger> {
        self.debugger.deref().borrow_mut()
    }
}

impl SaveStateSystem for Nes {
    fn visit_components(
        &self,
        visitor: &mut dyn FnMut(&dyn SaveStateComponent) -> Result<()>,
    ) -> Result<()> {
        visitor(&self.cpu.bus.cartridge)?;
        visitor(&self.cpu)?;
        visitor(&self.cpu.bus)?;
        visitor(&self.cpu.bus.ppu)?;
        visitor(&self.cpu.bus.ppu_memory)?;
        visitor(&self.cpu.bus.apu)
    }

    fn visit_components_mut(
        &mut self,
        visitor: &mut dyn FnMut(&mut dyn SaveStateComponent) -> Result<()>,
    ) -> Result<()> {
        visitor(&mut self.cpu.bus.cartridge)?;
        visitor(&mut self.cpu)?;
        visitor(&mut self.cpu.bus)?;
        visitor(&mut self.cpu.bus.ppu)?;
        visitor(&mut self.cpu.bus.ppu_memory)?;
        visitor(&mut self.cpu.bus.apu)
    }
}

/// Side effect free views into the system.
pub struct NesDebug<'a>(&'a Nes);

impl<'a> NesDebug<'a> {
    pub fn peek_cpu(&self, addr: u16) -> Option<u8> {
        self.0.cpu.bus.peek_u8(addr)
    }

    pub fn peek_ppu(&self, addr: u16) -> Option<u8> {
        self.0.cpu.bus.ppu_bus_peek().peek_u8(addr)
    }

    pub fn peek_oam(&self, addr: u8) -> u8 {
        self.0.cpu.bus.ppu.oam().peek(addr)
    }

    pub fn cpu_registers(&self) -> CpuTraceLine {
        self.0.cpu.debug().trace()
    }

    pub fn ppu(&self) -> PpuDebug<'a> {
        self.0.cpu.bus.ppu.debug()
    }

    pub fn render_pattern_table<ImageT: Image>(&self, table: u16, palette: u8) -> ImageT {
        self.ppu()
            .render_pattern_table(&self.0.cpu.bus.ppu_bus_peek(), table, palette)
    }

    pub fn render_nametable<ImageT: Image>(&self, table: u16) -> ImageT {
        self.ppu()
            .render_nametable(&self.0.cpu.bus.ppu_bus_peek(), table)
    }

    pub fn render_palette<ImageT: Image>(&self) -> ImageT {
        self.ppu().render_palette(&self.0.cpu.bus.ppu_bus_peek())
    }

    pub fn render_sprite<ImageT: Image>(&self, index: usize) -> ImageT {
        self.ppu()
            .render_sprite(&self.0.cpu.bus.ppu_bus_peek(), index)
    }
}
