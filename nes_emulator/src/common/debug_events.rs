//! Events emitted by components for the debugger.
//!
//! Components receive a [DebugEventCollectorRef] at construction. Events are delivered
//! synchronously, inside the step that produced them. The default collector ignores everything,
//! and a disabled collector is skipped before the event is even built.
use std::cell::RefCell;
use std::fmt::Display;
use std::rc::Rc;

/// Snapshot of the CPU registers and the instruction about to be executed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CpuTraceLine {
    pub pc: u16,
    pub opcode: u8,
    pub mnemonic: &'static str,
    pub operand: String,
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub s: u8,
    pub status: String,
}

impl Display for CpuTraceLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let instruction = if self.operand.is_empty() {
            self.mnemonic.to_string()
        } else {
            format!("{} {}", self.mnemonic, self.operand)
        };
        write!(
            f,
            "{:04X} {:<13} A:{:02X} X:{:02X} Y:{:02X} S:{:02X} P:{}",
            self.pc, instruction, self.a, self.x, self.y, self.s, self.status
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DebugEvent {
    RomLoaded { checksum: u32 },
    CpuPowerOn,
    CpuReset,
    PpuPowerOn,
    PpuReset,
    CpuBeforeStep(CpuTraceLine),
    CpuStepped,
    Nmi,
    PpuStepped,
    PpuAddr(u16),
    ScanlineStart(u16),
    ScanlineEnd(u16),
    FrameStart,
    FrameEnd,
    EmulatorStepped,
    Error(String),
}

impl Display for DebugEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use DebugEvent::*;
        match self {
            RomLoaded { checksum } => write!(f, "ROM loaded (crc {:08X})", checksum),
            CpuPowerOn => write!(f, "CPU power on"),
            CpuReset => write!(f, "CPU reset"),
            PpuPowerOn => write!(f, "PPU power on"),
            PpuReset => write!(f, "PPU reset"),
            CpuBeforeStep(trace) => write!(f, "{}", trace),
            CpuStepped => write!(f, "CPU stepped"),
            Nmi => write!(f, "NMI"),
            PpuStepped => write!(f, "PPU stepped"),
            PpuAddr(addr) => write!(f, "PPUADDR = ${:04X}", addr),
            ScanlineStart(scanline) => write!(f, "Scanline {} start", scanline),
            ScanlineEnd(scanline) => write!(f, "Scanline {} end", scanline),
            FrameStart => write!(f, "Frame start"),
            FrameEnd => write!(f, "Frame end"),
            EmulatorStepped => write!(f, "Emulator stepped"),
            Error(message) => write!(f, "Error: {}", message),
        }
    }
}

pub trait DebugEventCollector {
    /// Disabled collectors do not receive events.
    fn enabled(&self) -> bool;

    #[cold]
    fn on_event(&mut self, event: DebugEvent);

    /// Asked right after a [DebugEvent::CpuBeforeStep] event. Returning true vetoes the
    /// instruction once; the following step executes it.
    fn should_break(&self) -> bool {
        false
    }
}

/// Shared handle to a dyn DebugEventCollector.
#[derive(Clone)]
pub struct DebugEventCollectorRef(pub Rc<RefCell<dyn DebugEventCollector>>);

impl DebugEventCollectorRef {
    #[inline]
    pub fn enabled(&self) -> bool {
        self.0
            .try_borrow()
            .map(|collector| collector.enabled())
            .unwrap_or(false)
    }

    #[inline]
    pub fn on_event(&self, event: DebugEvent) {
        self.emit(|| event)
    }

    /// Builds and delivers the event only if the collector is enabled.
    #[inline]
    pub fn emit(&self, build_event: impl FnOnce() -> DebugEvent) {
        if let Ok(mut collector) = self.0.try_borrow_mut() {
            if collector.enabled() {
                collector.on_event(build_event());
            }
        }
    }

    pub fn on_error(&self, message: String) {
        self.emit(|| DebugEvent::Error(message))
    }

    pub fn should_break(&self) -> bool {
        self.0
            .try_borrow()
            .map(|collector| collector.enabled() && collector.should_break())
            .unwrap_or(false)
    }
}

struct NullCollector;

impl DebugEventCollector for NullCollector {
    fn enabled(&self) -> bool {
        false
    }

    fn on_event(&mut self, _event: DebugEvent) {}
}

/// Collector that ignores all events.
pub fn dummy_collector() -> DebugEventCollectorRef {
    DebugEventCollectorRef(Rc::new(RefCell::new(NullCollector)))
}
