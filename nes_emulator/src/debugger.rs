//! Debugger functionality
//!
//! Components notify the debugger of events during emulation (instruction steps, NMIs, scanlines),
//! and the front end sets log and break points on those events.
use std::fmt::Display;
use std::fmt::UpperHex;
use std::ops::Range;
use std::str::FromStr;

use anyhow::anyhow;
use num_traits::PrimInt;

use crate::common::debug_events::CpuTraceLine;
use crate::common::debug_events::DebugEvent;
use crate::common::debug_events::DebugEventCollector;
use crate::common::util::RingBuffer;

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum EventFilter {
    CpuProgramCounter(Range<u16>),
    CpuInstruction(String),
    PpuAddress(Range<u16>),
    Nmi,
    /// Start of a scanline, ranges are in decimal.
    Scanline(Range<u16>),
    Frame,
    ExecutionError,
}

impl EventFilter {
    pub fn matches(&self, event: &DebugEvent) -> bool {
        use EventFilter::*;
        match (self, event) {
            (CpuProgramCounter(range), DebugEvent::CpuBeforeStep(trace)) => {
                range.contains(&trace.pc)
            }
            (CpuInstruction(mnemonic), DebugEvent::CpuBeforeStep(trace)) => {
                mnemonic.eq_ignore_ascii_case(trace.mnemonic)
            }
            (PpuAddress(range), DebugEvent::PpuAddr(addr)) => range.contains(addr),
            (Nmi, DebugEvent::Nmi) => true,
            (Scanline(range), DebugEvent::ScanlineStart(scanline)) => range.contains(scanline),
            (Frame, DebugEvent::FrameEnd) => true,
            (ExecutionError, DebugEvent::Error(_)) => true,
            _ => false,
        }
    }
}

impl FromStr for EventFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use EventFilter::*;
        let (key, arg) = s.split_once(' ').unwrap_or((s, ""));
        Ok(match key.to_lowercase().as_str() {
            "pc" => CpuProgramCounter(parse_range(arg, 16)?),
            "ppuaddr" => PpuAddress(parse_range(arg, 16)?),
            "scanline" => Scanline(parse_range(arg, 10)?),
            "nmi" => Nmi,
            "frame" => Frame,
            "error" => ExecutionError,
            _ if arg.is_empty() => CpuInstruction(key.to_uppercase()),
            _ => return Err(anyhow!("Invalid event filter: {}", s)),
        })
    }
}

impl Display for EventFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use EventFilter::*;
        match self {
            CpuProgramCounter(range) => write!(f, "pc{}", format_range(range, 16)),
            CpuInstruction(mnemonic) => write!(f, "{}", mnemonic),
            PpuAddress(range) => write!(f, "ppuaddr{}", format_range(range, 16)),
            Nmi => write!(f, "nmi"),
            Scanline(range) => write!(f, "scanline{}", format_range(range, 10)),
            Frame => write!(f, "frame"),
            ExecutionError => write!(f, "error"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BreakReason {
    pub trigger: EventFilter,
    pub event: DebugEvent,
}

/// Event filters in insertion order, without duplicates.
#[derive(Clone, Debug, Default)]
pub struct FilterSet(Vec<EventFilter>);

impl FilterSet {
    pub fn contains(&self, filter: &EventFilter) -> bool {
        self.0.contains(filter)
    }

    pub fn insert(&mut self, filter: EventFilter) {
        if !self.contains(&filter) {
            self.0.push(filter);
        }
    }

    pub fn remove(&mut self, filter: &EventFilter) {
        self.0.retain(|existing| existing != filter);
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventFilter> {
        self.0.iter()
    }

    fn first_match(&self, event: &DebugEvent) -> Option<&EventFilter> {
        self.0.iter().find(|filter| filter.matches(event))
    }
}

/// Break point handling of CPU instructions. A break point on an instruction stops the CPU
/// before it executes, resuming executes it without reporting the same break again.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum CpuBreakState {
    #[default]
    Running,
    /// The pending instruction is vetoed.
    Halted,
    /// The previously vetoed instruction is executing.
    Resuming,
}

#[derive(Default)]
pub struct Debugger {
    pub log_points: FilterSet,
    pub break_points: FilterSet,
    pub log: RingBuffer<DebugEvent, 1024>,
    break_reason: Option<BreakReason>,
    enabled: bool,
    cpu_state: CpuBreakState,
}

impl Debugger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
        self.cpu_state = CpuBreakState::Running;
    }

    /// CPU trace lines in the log, most recent first.
    pub fn cpu_trace(&self) -> impl Iterator<Item = &CpuTraceLine> {
        self.log.iter().filter_map(|event| match event {
            DebugEvent::CpuBeforeStep(trace) => Some(trace),
            _ => None,
        })
    }

    pub fn take_break_reason(&mut self) -> Option<BreakReason> {
        self.break_reason.take()
    }

    pub fn has_break_point(&self, trigger: &EventFilter) -> bool {
        self.break_points.contains(trigger)
    }

    pub fn add_break_point(&mut self, trigger: EventFilter) {
        self.break_points.insert(trigger)
    }

    pub fn remove_break_point(&mut self, trigger: &EventFilter) {
        self.break_points.remove(trigger)
    }

    pub fn add_log_point(&mut self, trigger: EventFilter) {
        self.log_points.insert(trigger)
    }

    pub fn remove_log_point(&mut self, trigger: &EventFilter) {
        self.log_points.remove(trigger)
    }

    fn report_break(&mut self, trigger: &EventFilter, event: &DebugEvent) {
        self.break_reason = Some(BreakReason {
            trigger: trigger.clone(),
            event: event.clone(),
        });
    }
}

impl DebugEventCollector for Debugger {
    fn enabled(&self) -> bool {
        self.enabled
    }

    fn on_event(&mut self, event: DebugEvent) {
        let trigger = self.break_points.first_match(&event).cloned();
        match (&event, trigger) {
            (DebugEvent::CpuBeforeStep(_), None) => self.cpu_state = CpuBreakState::Running,
            (DebugEvent::CpuBeforeStep(_), Some(_)) if self.cpu_state == CpuBreakState::Halted => {
                self.cpu_state = CpuBreakState::Resuming
            }
            (DebugEvent::CpuBeforeStep(_), Some(trigger)) => {
                self.report_break(&trigger, &event);
                self.cpu_state = CpuBreakState::Halted;
            }
            (_, Some(trigger)) => self.report_break(&trigger, &event),
            (_, None) => (),
        }

        if self.log_points.first_match(&event).is_some() {
            self.log.push(event);
        }
    }

    /// True while a break point matches the pending instruction. The CPU vetoes it the first
    /// time and executes it the second.
    fn should_break(&self) -> bool {
        self.cpu_state != CpuBreakState::Running
    }
}

/// Parses a range given as `first:last` (inclusive). Either side may be left out, a single
/// value selects just that value and an empty string selects everything.
fn parse_range<T: PrimInt>(s: &str, radix: u32) -> anyhow::Result<Range<T>> {
    let value = |text: &str| {
        T::from_str_radix(text, radix).map_err(|_| anyhow!("Invalid range value: {}", text))
    };
    let (first, last) = match s.split_once(':') {
        Some(bounds) => bounds,
        None if s.is_empty() => return Ok(T::zero()..T::max_value()),
        None => (s, s),
    };
    let start = match first {
        "" => T::zero(),
        first => value(first)?,
    };
    let end = match last {
        "" => T::max_value(),
        last => value(last)?.saturating_add(T::one()),
    };
    Ok(start..end)
}

/// Inverse of [parse_range], with a leading space unless the range covers everything.
fn format_range<T: PrimInt + Display + UpperHex>(range: &Range<T>, radix: u32) -> String {
    let text = |value: T| match radix {
        16 => format!("{:X}", value),
        _ => value.to_string(),
    };
    let open_start = range.start == T::zero();
    let open_end = range.end == T::max_value();
    let last = range.end.saturating_sub(T::one());
    match (open_start, open_end) {
        (true, true) => String::new(),
        _ if range.start == last => format!(" {}", text(range.start)),
        (true, false) => format!(" :{}", text(last)),
        (false, true) => format!(" {}:", text(range.start)),
        (false, false) => format!(" {}:{}", text(range.start), text(last)),
    }
}
