//! Implementation of the 6502 derived CPU of the NES (Ricoh 2A03, without decimal mode).
//!
//! The CPU executes a whole instruction in the first cycle of [Cpu::step] and then idles for the
//! remaining cycles of the instruction. The number of idle cycles left is the cycle debt.
mod debug;
mod instructions;
mod opcode_table;
mod operands;
mod status;

use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;

use self::instructions::build_handler_table;
use self::instructions::Handler;
use self::opcode_table::OPCODES;
use self::operands::resolve;
use crate::common::bus::Bus;
use crate::common::debug_events::DebugEvent;
use crate::common::debug_events::DebugEventCollectorRef;
use crate::common::save_state::decode_from;
use crate::common::save_state::encode_into;
use crate::common::save_state::ensure_version;
use crate::common::save_state::SaveStateComponent;

pub use self::debug::CpuDebug;
pub use self::debug::Disassembly;
pub use self::opcode_table::AddressMode;
pub use self::opcode_table::Opcode;
pub use self::status::StatusFlags;

/// The bus as seen by the CPU.
pub trait CpuBus: Bus {
    /// Returns true once after a write to the OAM DMA register.
    fn take_dma_stall(&mut self) -> bool;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterruptKind {
    Nmi,
    Irq,
    Brk,
}

pub enum VectorTable {
    Nmi = 0xFFFA,
    Reset = 0xFFFC,
    Irq = 0xFFFE,
}

const STACK_BASE: u16 = 0x0100;

/// Cycles the CPU is stalled by an OAM DMA transfer, not counting the odd-cycle alignment.
const DMA_STALL_CYCLES: i64 = 513;

/// Cycle debt of the interrupt sequence on top of the cycle it is started in.
const INTERRUPT_CYCLES: i64 = 6;

/// Encoded representation of the CPU registers.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
struct CpuState {
    a: u8,
    x: u8,
    y: u8,
    s: u8,
    p: u8,
    pc: u16,
    pending_nmi: bool,
    pending_irq: bool,
    skip_cycles: i64,
    last_address: u16,
}

pub struct Cpu<BusT: CpuBus> {
    pub bus: BusT,
    pub pc: u16,
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub s: u8,
    pub status: StatusFlags,
    skip_cycles: i64,
    pending_nmi: bool,
    pending_irq: bool,
    has_break: bool,
    last_address: u16,
    handlers: [Handler<BusT>; 256],
    debug_event_collector: DebugEventCollectorRef,
}

impl<BusT: CpuBus> Cpu<BusT> {
    pub fn new(bus: BusT, debug_event_collector: DebugEventCollectorRef) -> Self {
        Self {
            bus,
            pc: 0,
            a: 0,
            x: 0,
            y: 0,
            s: 0xFD,
            status: StatusFlags::default(),
            skip_cycles: 0,
            pending_nmi: false,
            pending_irq: false,
            has_break: false,
            last_address: 0,
            handlers: build_handler_table(),
            debug_event_collector,
        }
    }

    /// Sets the power-up register pattern. PC is left untouched.
    pub fn power_up(&mut self) {
        self.status = StatusFlags::default();
        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.s = 0xFD;
        self.debug_event_collector.on_event(DebugEvent::CpuPowerOn);
    }

    pub fn reset(&mut self) {
        self.power_up();
        self.skip_cycles = 0;
        self.pending_nmi = false;
        self.pending_irq = false;
        self.pc = self.bus.cycle_read_u16(VectorTable::Reset as u16);
        self.has_break = false;
        self.debug_event_collector.on_event(DebugEvent::CpuReset);
    }

    /// Latches an interrupt to be serviced on the next instruction boundary.
    ///
    /// NMI takes priority over IRQ. A BRK is started immediately.
    pub fn interrupt(&mut self, kind: InterruptKind) {
        match kind {
            InterruptKind::Nmi => {
                self.pending_nmi = true;
                self.debug_event_collector.on_event(DebugEvent::Nmi);
            }
            InterruptKind::Irq => self.pending_irq = true,
            InterruptKind::Brk => self.interrupt_sequence(InterruptKind::Brk),
        }
    }

    /// Advances the CPU by one cycle.
    pub fn step(&mut self) {
        self.skip_cycles -= 1;
        if self.skip_cycles >= 0 {
            self.debug_event_collector.emit(|| DebugEvent::CpuStepped);
            return;
        }
        self.skip_cycles = 0;

        if self.pending_nmi || self.pending_irq {
            let kind = if self.pending_nmi {
                InterruptKind::Nmi
            } else {
                InterruptKind::Irq
            };
            self.interrupt_sequence(kind);
            self.pending_nmi = false;
            self.pending_irq = false;
            self.debug_event_collector.emit(|| DebugEvent::CpuStepped);
            return;
        }

        self.last_address = self.pc;
        if self.debug_event_collector.enabled() {
            let trace = self.debug().trace();
            self.debug_event_collector
                .on_event(DebugEvent::CpuBeforeStep(trace));
            if self.debug_event_collector.should_break() {
                // Break only once, the next step executes the instruction.
                if !self.has_break {
                    self.has_break = true;
                    return;
                }
                self.has_break = false;
            }
        }
        #[cfg(feature = "debug_log")]
        log::trace!(target: "cpu_state", "{}", self.debug().trace());

        self.execute_instruction();
        self.debug_event_collector.emit(|| DebugEvent::CpuStepped);
    }

    fn execute_instruction(&mut self) {
        let opcode = self.bus.cycle_read_u8(self.pc);
        self.pc = self.pc.wrapping_add(1);
        let entry = &OPCODES[opcode as usize];

        let (x, y) = (self.x, self.y);
        let bus = &mut self.bus;
        let resolved = resolve(entry.mode, self.pc, x, y, |addr| bus.cycle_read_u8(addr));
        self.pc = self.pc.wrapping_add(entry.mode.operand_len());
        if entry.page_penalty && resolved.page_crossed {
            self.skip_cycles += 1;
        }

        let handler = self.handlers[opcode as usize];
        handler(self, resolved.operand);

        if self.bus.take_dma_stall() {
            self.skip_cycles += DMA_STALL_CYCLES;
            self.skip_cycles += self.skip_cycles & 1;
        }
        // One cycle has been spent in this step.
        self.skip_cycles += entry.cycles as i64 - 1;
    }

    fn interrupt_sequence(&mut self, kind: InterruptKind) {
        if kind == InterruptKind::Irq && self.status.irq_disable {
            return;
        }
        if kind == InterruptKind::Brk {
            // Skip the padding byte following BRK.
            self.pc = self.pc.wrapping_add(1);
        }

        let mut pushed_status = self.status;
        pushed_status.unused = true;
        pushed_status.break_flag = kind == InterruptKind::Brk;
        self.stack_push_u16(self.pc);
        self.stack_push_u8(pushed_status.into());
        self.status.irq_disable = true;

        let vector = match kind {
            InterruptKind::Nmi => VectorTable::Nmi,
            InterruptKind::Irq | InterruptKind::Brk => VectorTable::Irq,
        };
        self.pc = self.bus.cycle_read_u16(vector as u16);
        // BRK pays for the sequence with its own opcode cost.
        if kind != InterruptKind::Brk {
            self.skip_cycles += INTERRUPT_CYCLES;
        }
    }

    /// Number of idle cycles left before the next instruction is executed.
    pub fn skip_cycles(&self) -> i64 {
        self.skip_cycles
    }

    /// Address of the last instruction that was started.
    pub fn last_address(&self) -> u16 {
        self.last_address
    }

    pub fn debug(&self) -> CpuDebug<'_, BusT> {
        CpuDebug(self)
    }

    /// Decodes the instruction at `addr` using side effect free bus reads.
    pub fn disassemble(&self, addr: u16) -> Disassembly {
        self.debug().disassemble(addr)
    }

    fn stack_push_u8(&mut self, value: u8) {
        self.bus.cycle_write_u8(STACK_BASE | self.s as u16, value);
        self.s = self.s.wrapping_sub(1);
    }

    fn stack_push_u16(&mut self, value: u16) {
        let bytes = value.to_le_bytes();
        self.stack_push_u8(bytes[1]);
        self.stack_push_u8(bytes[0]);
    }

    fn stack_pop_u8(&mut self) -> u8 {
        self.s = self.s.wrapping_add(1);
        self.bus.cycle_read_u8(STACK_BASE | self.s as u16)
    }

    fn stack_pop_u16(&mut self) -> u16 {
        u16::from_le_bytes([self.stack_pop_u8(), self.stack_pop_u8()])
    }

    fn state(&self) -> CpuState {
        CpuState {
            a: self.a,
            x: self.x,
            y: self.y,
            s: self.s,
            p: self.status.into(),
            pc: self.pc,
            pending_nmi: self.pending_nmi,
            pending_irq: self.pending_irq,
            skip_cycles: self.skip_cycles,
            last_address: self.last_address,
        }
    }
}

impl<BusT: CpuBus> SaveStateComponent for Cpu<BusT> {
    fn save_state(&self, out: &mut Vec<u8>) -> Result<()> {
        encode_into(&self.state(), out)
    }

    fn load_state(&mut self, version: u32, input: &mut &[u8]) -> Result<()> {
        ensure_version("CPU", version)?;
        let state: CpuState = decode_from(input)?;
        self.a = state.a;
        self.x = state.x;
        self.y = state.y;
        self.s = state.s;
        self.status = state.p.into();
        self.pc = state.pc;
        self.pending_nmi = state.pending_nmi;
        self.pending_irq = state.pending_irq;
        self.skip_cycles = state.skip_cycles;
        self.last_address = state.last_address;
        Ok(())
    }
}
