use std::fmt::Display;

use super::opcode_table::OPCODES;
use super::operands::format_operand;
use super::operands::resolve;
use super::Cpu;
use super::CpuBus;
use crate::common::debug_events::CpuTraceLine;

/// A decoded instruction, read without side effects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Disassembly {
    pub address: u16,
    pub opcode: u8,
    pub mnemonic: &'static str,
    pub operand: String,
    /// Instruction length in bytes, including the opcode.
    pub len: u16,
}

impl Display for Disassembly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.operand.is_empty() {
            write!(f, "{:04X}: {}", self.address, self.mnemonic)
        } else {
            write!(f, "{:04X}: {} {}", self.address, self.mnemonic, self.operand)
        }
    }
}

pub struct CpuDebug<'a, BusT: CpuBus>(pub &'a Cpu<BusT>);

impl<BusT: CpuBus> CpuDebug<'_, BusT> {
    pub fn disassemble(&self, address: u16) -> Disassembly {
        let cpu = self.0;
        let opcode = cpu.bus.peek_u8(address).unwrap_or_default();
        let entry = &OPCODES[opcode as usize];
        let operand_addr = address.wrapping_add(1);
        let resolved = resolve(entry.mode, operand_addr, cpu.x, cpu.y, |addr| {
            cpu.bus.peek_u8(addr).unwrap_or_default()
        });
        Disassembly {
            address,
            opcode,
            mnemonic: entry.mnemonic,
            operand: format_operand(entry.mode, &resolved),
            len: 1 + entry.mode.operand_len(),
        }
    }

    /// Disassembles `count` instructions starting at the current PC.
    pub fn peek_next_operations(&self, count: usize) -> Vec<Disassembly> {
        let mut address = self.0.pc;
        (0..count)
            .map(|_| {
                let disassembly = self.disassemble(address);
                address = address.wrapping_add(disassembly.len);
                disassembly
            })
            .collect()
    }

    pub fn trace(&self) -> CpuTraceLine {
        let cpu = self.0;
        let disassembly = self.disassemble(cpu.pc);
        CpuTraceLine {
            pc: cpu.pc,
            opcode: disassembly.opcode,
            mnemonic: disassembly.mnemonic,
            operand: disassembly.operand,
            a: cpu.a,
            x: cpu.x,
            y: cpu.y,
            s: cpu.s,
            status: cpu.status.format_string(),
        }
    }

    pub fn pending_interrupts(&self) -> (bool, bool) {
        (self.0.pending_nmi, self.0.pending_irq)
    }
}
