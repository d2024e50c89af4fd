//! End-to-end tests of the whole system running small hand assembled programs.
mod util;

use std::cell::RefCell;
use std::rc::Rc;

use nes_emulator::common::debug_events::DebugEvent;
use nes_emulator::debugger::EventFilter;
use nes_emulator::devices::AudioDevice;
use nes_emulator::devices::Button;
use nes_emulator::devices::Devices;
use nes_emulator::devices::InputDevice;
use nes_emulator::devices::NullInput;
use nes_emulator::devices::VideoDevice;
use nes_emulator::ExecutionResult;
use pretty_assertions::assert_eq;
use util::rom_builder::RomBuilder;

/// LDA #$42, STA $0200, then loops at $C005.
const STORE_PROGRAM: &[u8] = &[0xA9, 0x42, 0x8D, 0x00, 0x02, 0x4C, 0x05, 0xC0];

/// INC $0200, then loops at $C003.
const INCREMENT_PROGRAM: &[u8] = &[0xEE, 0x00, 0x02, 0x4C, 0x03, 0xC0];

#[test]
fn test_one_frame_ends_exactly_once() {
    let mut nes = RomBuilder::nrom().nes();
    nes.debugger().enable();
    nes.debugger().add_log_point(EventFilter::Frame);

    assert_eq!(nes.run_one_frame(), ExecutionResult::Normal);

    let frame_ends = nes
        .debugger()
        .log
        .iter()
        .filter(|event| **event == DebugEvent::FrameEnd)
        .count();
    assert_eq!(frame_ends, 1);
    assert_eq!(nes.frame_count(), 1);
}

#[test]
fn test_program_writes_ram() {
    let mut nes = RomBuilder::nrom().program(0xC000, STORE_PROGRAM).nes();
    nes.run_one_frame();
    assert_eq!(nes.debug().peek_cpu(0x0200), Some(0x42));
    // RAM is mirrored up to $1FFF.
    assert_eq!(nes.debug().peek_cpu(0x1A00), Some(0x42));
    assert_eq!(nes.cpu.pc, 0xC005);
}

#[test]
fn test_reset_keeps_ram_and_power_on_clears_it() {
    let mut nes = RomBuilder::nrom().program(0xC000, INCREMENT_PROGRAM).nes();
    nes.run_one_frame();
    assert_eq!(nes.debug().peek_cpu(0x0200), Some(1));

    nes.reset();
    assert_eq!(nes.cpu.pc, 0xC000);
    nes.run_one_frame();
    assert_eq!(nes.debug().peek_cpu(0x0200), Some(2));

    nes.power_on();
    assert_eq!(nes.debug().peek_cpu(0x0200), Some(0));
}

#[test]
fn test_nmi_is_delivered_every_frame() {
    // Enable NMI, then idle. The NMI handler at $D000 increments $10.
    let program = [0xA9, 0x80, 0x8D, 0x00, 0x20, 0x4C, 0x05, 0xC0];
    let mut nes = RomBuilder::nrom()
        .program(0xC000, &program)
        .program(0xD000, &[0xE6, 0x10, 0x40])
        .nmi_vector(0xD000)
        .nes();
    nes.execute_frames(3);
    assert_eq!(nes.debug().peek_cpu(0x0010), Some(3));
}

#[test]
fn test_debug_until_nmi() {
    let program = [0xA9, 0x80, 0x8D, 0x00, 0x20, 0x4C, 0x05, 0xC0];
    let mut nes = RomBuilder::nrom()
        .program(0xC000, &program)
        .program(0xD000, &[0xE6, 0x10, 0x40])
        .nmi_vector(0xD000)
        .nes();
    assert_eq!(nes.debug_until(EventFilter::Nmi), ExecutionResult::Normal);
    assert_eq!(nes.debug().ppu().0.reported_scanline(), 241);
    assert!(!nes.debugger().has_break_point(&EventFilter::Nmi));
}

#[test]
fn test_break_point_vetoes_instruction() {
    let mut nes = RomBuilder::nrom().program(0xC000, STORE_PROGRAM).nes();
    nes.debugger().enable();
    nes.debugger()
        .add_break_point("pc C002".parse::<EventFilter>().unwrap());

    let ExecutionResult::Break(reason) = nes.run_one_frame() else {
        panic!("Expected a break");
    };
    assert_eq!(reason.trigger, EventFilter::CpuProgramCounter(0xC002..0xC003));
    assert_eq!(nes.cpu.pc, 0xC002);
    assert_eq!(nes.cpu.a, 0x42);
    assert_eq!(nes.debug().peek_cpu(0x0200), Some(0));

    // Continuing runs the vetoed STA and completes the frame.
    assert_eq!(nes.run_one_frame(), ExecutionResult::Normal);
    assert_eq!(nes.debug().peek_cpu(0x0200), Some(0x42));
    assert_eq!(nes.frame_count(), 1);
}

#[test]
fn test_stopped_frame_resumes() {
    let mut nes = RomBuilder::nrom().nes();
    let mut cycles = 0;
    let result = nes.run_frame_until(|| {
        cycles += 1;
        cycles > 1000
    });
    assert_eq!(result, ExecutionResult::Stopped);
    assert_eq!(nes.frame_count(), 0);
    assert_eq!(nes.run_one_frame(), ExecutionResult::Normal);
    assert_eq!(nes.frame_count(), 1);
}

#[test]
fn test_disassemble() {
    let nes = RomBuilder::nrom().program(0xC000, STORE_PROGRAM).nes();
    let lines: Vec<String> = nes
        .cpu
        .debug()
        .peek_next_operations(3)
        .iter()
        .map(|line| line.to_string())
        .collect();
    assert_eq!(lines, vec!["C000: LDA #$42", "C002: STA $0200", "C005: JMP $C005"]);
    assert_eq!(nes.cpu.disassemble(0xC002).len, 3);
}

struct PressedButtons(Vec<Button>);

impl InputDevice for PressedButtons {
    fn is_pressed(&self, port: usize, button: Button) -> bool {
        port == 0 && self.0.contains(&button)
    }
}

#[test]
fn test_program_reads_controller() {
    // Strobe $4016, then read the first two bits of port 0 into $00 and $01.
    let program = [
        0xA9, 0x01, 0x8D, 0x16, 0x40, // LDA #1, STA $4016
        0xA9, 0x00, 0x8D, 0x16, 0x40, // LDA #0, STA $4016
        0xAD, 0x16, 0x40, 0x85, 0x00, // LDA $4016, STA $00
        0xAD, 0x16, 0x40, 0x85, 0x01, // LDA $4016, STA $01
        0x4C, 0x14, 0xC0, // JMP $C014
    ];
    let mut nes = RomBuilder::nrom().program(0xC000, &program).nes();
    nes.set_devices(Devices {
        input: Box::new(PressedButtons(vec![Button::A])),
        ..Default::default()
    });
    nes.run_one_frame();
    assert_eq!(nes.debug().peek_cpu(0x0000), Some(0x41));
    assert_eq!(nes.debug().peek_cpu(0x0001), Some(0x40));
}

#[derive(Default)]
struct Sinks {
    frames: Vec<(usize, usize)>,
    samples: usize,
    batches: usize,
}

struct SharedVideo(Rc<RefCell<Sinks>>);

impl VideoDevice for SharedVideo {
    fn push_frame(&mut self, width: usize, height: usize, pixels: &[u32]) {
        assert_eq!(pixels.len(), width * height);
        self.0.borrow_mut().frames.push((width, height));
    }
}

struct SharedAudio(Rc<RefCell<Sinks>>);

impl AudioDevice for SharedAudio {
    fn push_samples(&mut self, samples: &[i16]) {
        let mut sinks = self.0.borrow_mut();
        sinks.samples += samples.len();
        sinks.batches += 1;
    }
}

#[test]
fn test_frames_and_samples_reach_devices() {
    let sinks = Rc::new(RefCell::new(Sinks::default()));
    let mut nes = RomBuilder::nrom().nes();
    nes.set_devices(Devices {
        input: Box::new(NullInput),
        video: Box::new(SharedVideo(sinks.clone())),
        audio: Box::new(SharedAudio(sinks.clone())),
    });
    nes.execute_frames(3);

    let sinks = sinks.borrow();
    assert_eq!(sinks.frames, vec![(256, 240); 3]);
    // About 735 samples per frame, delivered in batches of 1024.
    assert_eq!(sinks.samples, sinks.batches * 1024);
    assert!(sinks.batches >= 1);
}

#[test]
fn test_take_devices_disconnects() {
    let sinks = Rc::new(RefCell::new(Sinks::default()));
    let mut nes = RomBuilder::nrom().nes();
    nes.set_devices(Devices {
        input: Box::new(NullInput),
        video: Box::new(SharedVideo(sinks.clone())),
        audio: Box::new(SharedAudio(sinks.clone())),
    });
    nes.run_one_frame();
    let _devices = nes.take_devices();
    nes.run_one_frame();
    assert_eq!(sinks.borrow().frames.len(), 1);
}

#[test]
fn test_load_cartridge_powers_on_new_rom() {
    let mut nes = RomBuilder::nrom().program(0xC000, INCREMENT_PROGRAM).nes();
    nes.run_one_frame();
    let cartridge = RomBuilder::nrom()
        .program(0xC000, STORE_PROGRAM)
        .cartridge();
    let previous = nes.load_cartridge(cartridge);
    assert_ne!(previous.checksum(), nes.cpu.bus.cartridge.checksum());
    nes.run_one_frame();
    assert_eq!(nes.debug().peek_cpu(0x0200), Some(0x42));
}
