use std::collections::HashMap;
use std::fmt;
use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;

use itertools::Itertools;
use nes_emulator::common::bus::Bus;
use nes_emulator::components::cpu::CpuBus;

/// A test implementation of the `Bus`.
///
/// Stores memory sparsely and records all bus cycles for comparison to the test data.
#[derive(Default)]
pub struct TestBus {
    pub memory: SparseMemory,
    pub cycles: Vec<Cycle>,
}

impl Bus for TestBus {
    fn peek_u8(&self, addr: u16) -> Option<u8> {
        Some(self.memory.get(addr).unwrap_or_default())
    }

    fn cycle_read_u8(&mut self, addr: u16) -> u8 {
        let value = self.memory.get(addr).unwrap_or_default();
        self.cycles.push(Cycle::Read(addr, value));
        value
    }

    fn cycle_write_u8(&mut self, addr: u16, value: u8) {
        self.cycles.push(Cycle::Write(addr, value));
        self.memory.set(addr, value);
    }

    fn reset(&mut self) {}
}

impl CpuBus for TestBus {
    fn take_dma_stall(&mut self) -> bool {
        false
    }
}

/// Description of a bus cycle
#[derive(Clone, Copy, Eq, PartialEq)]
pub enum Cycle {
    /// The bus was in read mode: (addr, value read)
    Read(u16, u8),
    /// The bus was in write mode: (addr, value written)
    Write(u16, u8),
}

impl Debug for Cycle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Cycle::Read(addr, value) => write!(f, "R({:04X})={:02X}", addr, value),
            Cycle::Write(addr, value) => write!(f, "W({:04X})={:02X}", addr, value),
        }
    }
}

/// Implements a sparse memory HashMap with a readable display format.
#[derive(Default, PartialEq)]
pub struct SparseMemory {
    pub memory: HashMap<u16, u8>,
}

impl SparseMemory {
    pub fn get(&self, addr: u16) -> Option<u8> {
        self.memory.get(&addr).copied()
    }

    pub fn set(&mut self, addr: u16, value: u8) {
        self.memory.insert(addr, value);
    }
}

impl Display for SparseMemory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (addr, value) in self.memory.iter().sorted() {
            writeln!(f, "{:04X}: {:02X}", addr, value)?;
        }
        Ok(())
    }
}

impl Debug for SparseMemory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}
