//! Main bus used by the 6502 CPU.
use anyhow::ensure;
use anyhow::Result;
use log::warn;

use crate::common::bus::Bus;
use crate::common::debug_events::DebugEventCollectorRef;
use crate::common::save_state::decode_from;
use crate::common::save_state::encode_into;
use crate::common::save_state::ensure_version;
use crate::common::save_state::SaveStateComponent;
use crate::components::apu::Apu;
use crate::components::apu::SampleMemory;
use crate::components::cartridge::Cartridge;
use crate::components::cpu::CpuBus;
use crate::components::ppu::Ppu;
use crate::controller::Controller;
use crate::devices::InputDevice;
use crate::devices::NullInput;
use crate::ppu_bus::PpuBusImpl;
use crate::ppu_bus::PpuBusPeek;
use crate::ppu_bus::PpuMemory;

const RAM_SIZE: usize = 0x800;

/// DMC sample fetches read PRG directly from the cartridge.
struct PrgSampleMemory<'a>(&'a Cartridge);

impl SampleMemory for PrgSampleMemory<'_> {
    fn read_sample(&mut self, addr: u16) -> u8 {
        self.0.mapper().read_prg(addr)
    }
}

pub struct CpuBusImpl {
    pub ram: Vec<u8>,
    pub ppu: Ppu,
    pub ppu_memory: PpuMemory,
    pub apu: Apu,
    pub controllers: [Controller; 2],
    pub input: Box<dyn InputDevice>,
    pub cartridge: Cartridge,
    dma_stall: bool,
    debug_event_collector: DebugEventCollectorRef,
}

impl CpuBusImpl {
    pub fn new(cartridge: Cartridge, debug_event_collector: DebugEventCollectorRef) -> Self {
        Self {
            ram: vec![0; RAM_SIZE],
            ppu: Ppu::new(debug_event_collector.clone()),
            ppu_memory: PpuMemory::default(),
            apu: Apu::new(),
            controllers: [Controller::new(0), Controller::new(1)],
            input: Box::new(NullInput),
            cartridge,
            dma_stall: false,
            debug_event_collector,
        }
    }

    pub fn bus_peek(&self, addr: u16) -> Option<u8> {
        match addr {
            0x0000..=0x1FFF => Some(self.ram[addr as usize % RAM_SIZE]),
            0x2000..=0x3FFF => Some(self.ppu.peek_register(addr)),
            0x4015 => Some(self.apu.peek_status()),
            0x4016 => Some(self.controllers[0].peek(self.input.as_ref())),
            0x4017 => Some(self.controllers[1].peek(self.input.as_ref())),
            0x4000..=0x401F => None,
            0x4020..=0x7FFF => Some(self.cartridge.mapper().peek_extended_ram(addr)),
            0x8000..=0xFFFF => Some(self.cartridge.mapper().read_prg(addr)),
        }
    }

    pub fn bus_read(&mut self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.ram[addr as usize % RAM_SIZE],
            0x2000..=0x3FFF => {
                let mut ppu_bus = PpuBusImpl::new(&mut self.ppu_memory, &mut self.cartridge);
                self.ppu.read_register(addr, &mut ppu_bus)
            }
            0x4015 => self.apu.read_status(&mut PrgSampleMemory(&self.cartridge)),
            0x4016 => self.controllers[0].read(self.input.as_ref()),
            0x4017 => self.controllers[1].read(self.input.as_ref()),
            0x4000..=0x401F => {
                self.on_bus_error(format!("Read from write-only register ${:04X}", addr));
                (addr >> 8) as u8
            }
            0x4020..=0x7FFF => self.cartridge.mapper_mut().read_extended_ram(addr),
            0x8000..=0xFFFF => self.cartridge.mapper().read_prg(addr),
        }
    }

    pub fn bus_write(&mut self, addr: u16, value: u8) {
        match addr {
            0x0000..=0x1FFF => self.ram[addr as usize % RAM_SIZE] = value,
            0x2000..=0x3FFF => {
                let mut ppu_bus = PpuBusImpl::new(&mut self.ppu_memory, &mut self.cartridge);
                self.ppu.write_register(addr, value, &mut ppu_bus);
            }
            0x4014 => self.oam_dma(value),
            0x4016 => {
                for controller in &mut self.controllers {
                    controller.write_strobe(value, self.input.as_ref());
                }
            }
            0x4000..=0x4013 | 0x4015 | 0x4017 => {
                self.apu
                    .write_register(addr, value, &mut PrgSampleMemory(&self.cartridge));
            }
            0x4018..=0x401F => {
                self.on_bus_error(format!("Write to unmapped register ${:04X}", addr));
            }
            0x4020..=0x7FFF => self.cartridge.mapper_mut().write_extended_ram(addr, value),
            0x8000..=0xFFFF => self.cartridge.mapper_mut().write_prg(addr, value),
        }
    }

    /// Register $4014: OAMDMA - copies CPU page `page` into OAM and stalls the CPU.
    fn oam_dma(&mut self, page: u8) {
        let base = (page as u16) << 8;
        let data: Vec<u8> = (0..=0xFF_u16)
            .map(|offset| self.bus_read(base | offset))
            .collect();
        self.ppu.oam_dma(&data);
        self.dma_stall = true;
    }

    fn on_bus_error(&self, message: String) {
        warn!("{}", message);
        self.debug_event_collector.on_error(message);
    }

    /// Advances the PPU by one dot.
    pub fn step_ppu(&mut self) {
        let mut ppu_bus = PpuBusImpl::new(&mut self.ppu_memory, &mut self.cartridge);
        self.ppu.step(&mut ppu_bus);
    }

    /// Advances the APU by one CPU cycle.
    pub fn tick_apu(&mut self) {
        self.apu.tick(&mut PrgSampleMemory(&self.cartridge));
    }

    /// Synthesizes all pending APU cycles and hands out complete sample batches.
    pub fn flush_audio(&mut self, on_batch: impl FnMut(&[i16])) {
        self.apu
            .flush(&mut PrgSampleMemory(&self.cartridge), on_batch);
    }

    /// State of the shared IRQ line, driven by the cartridge and the APU.
    pub fn irq_line(&self) -> bool {
        self.cartridge.mapper().irq_line() || self.apu.irq_line()
    }

    /// Side effect free view of the PPU address space.
    pub fn ppu_bus_peek(&self) -> PpuBusPeek<'_> {
        PpuBusPeek {
            memory: &self.ppu_memory,
            cartridge: &self.cartridge,
        }
    }

    pub fn power_up(&mut self) {
        self.ram.fill(0);
        self.ppu_memory.reset();
        self.ppu.power_up();
        self.apu.reset();
        self.cartridge.reset();
        for controller in &mut self.controllers {
            controller.reset();
        }
        self.dma_stall = false;
    }
}

impl Bus for CpuBusImpl {
    fn peek_u8(&self, addr: u16) -> Option<u8> {
        self.bus_peek(addr)
    }

    fn cycle_read_u8(&mut self, addr: u16) -> u8 {
        self.bus_read(addr)
    }

    fn cycle_write_u8(&mut self, addr: u16, value: u8) {
        self.bus_write(addr, value);
    }

    /// The reset button resets the CPU, PPU and APU. RAM and the nametables keep their contents.
    fn reset(&mut self) {
        self.ppu.reset();
        self.apu.reset();
        self.cartridge.reset();
        for controller in &mut self.controllers {
            controller.reset();
        }
        self.dma_stall = false;
    }
}

impl CpuBus for CpuBusImpl {
    fn take_dma_stall(&mut self) -> bool {
        std::mem::take(&mut self.dma_stall)
    }
}

/// The save state of the CPU bus is its RAM. The devices on the bus are stored separately.
impl SaveStateComponent for CpuBusImpl {
    fn save_state(&self, out: &mut Vec<u8>) -> Result<()> {
        encode_into(&self.ram, out)
    }

    fn load_state(&mut self, version: u32, input: &mut &[u8]) -> Result<()> {
        ensure_version("CPU bus", version)?;
        let ram: Vec<u8> = decode_from(input)?;
        ensure!(ram.len() == RAM_SIZE, "Invalid RAM size {}", ram.len());
        self.ram = ram;
        Ok(())
    }
}
