//! Tests of the emulator running on its own thread.
mod util;

use std::time::Duration;

use anyhow::Result;
use crossbeam_channel as cb;
use nes_emulator::controller::ControllerType;
use nes_emulator::devices::NullAudio;
use nes_emulator::devices::NullInput;
use nes_emulator::devices::VideoDevice;
use nes_emulator::emulator::Emulator;
use nes_emulator::emulator::EmulatorConfig;
use nes_emulator::emulator::RunningState;
use nes_emulator::emulator::SendDevices;
use pretty_assertions::assert_eq;
use util::rom_builder::RomBuilder;

const TIMEOUT: Duration = Duration::from_secs(10);

/// Sends the index of each completed frame.
struct FrameNotifier {
    frames: cb::Sender<u64>,
    count: u64,
}

impl VideoDevice for FrameNotifier {
    fn push_frame(&mut self, _width: usize, _height: usize, _pixels: &[u32]) {
        self.count += 1;
        let _ = self.frames.send(self.count);
    }
}

fn power_on() -> (Emulator, cb::Receiver<u64>) {
    let (sender, frames) = cb::unbounded();
    let config = EmulatorConfig {
        frame_pacing: false,
        ..Default::default()
    };
    let devices = SendDevices {
        input: Box::new(NullInput),
        video: Box::new(FrameNotifier {
            frames: sender,
            count: 0,
        }),
        audio: Box::new(NullAudio),
    };
    (Emulator::power_on(config, devices).unwrap(), frames)
}

/// Turns a reply callback into a channel to wait on.
fn reply<T: Send + 'static>() -> (
    impl FnOnce(Result<T>) + Send + 'static,
    cb::Receiver<Result<T>>,
) {
    let (sender, receiver) = cb::bounded(1);
    (
        move |result: Result<T>| {
            let _ = sender.send(result);
        },
        receiver,
    )
}

fn load_nrom(emulator: &Emulator) -> u32 {
    let (callback, result) = reply();
    emulator.load_rom(&RomBuilder::nrom().build(), callback);
    result.recv_timeout(TIMEOUT).unwrap().unwrap()
}

#[test]
fn test_run_delivers_frames_and_stays_running() {
    let (emulator, frames) = power_on();
    assert_eq!(emulator.running_state(), RunningState::Stopped);
    let crc = load_nrom(&emulator);
    assert_eq!(crc, RomBuilder::nrom().cartridge().checksum());

    emulator.run();
    assert_eq!(frames.recv_timeout(TIMEOUT).unwrap(), 1);
    assert_eq!(frames.recv_timeout(TIMEOUT).unwrap(), 2);
    assert_eq!(emulator.running_state(), RunningState::Running);

    emulator.pause();
    assert_eq!(emulator.running_state(), RunningState::Paused);
    emulator.power_off();
}

#[test]
fn test_invalid_rom_fails_on_caller_thread() {
    let (emulator, _frames) = power_on();
    let (callback, result) = reply::<u32>();
    emulator.load_rom(b"not a rom", callback);
    // The reply has already been sent when load_rom returns.
    assert!(result.try_recv().unwrap().is_err());
}

#[test]
fn test_requests_without_rom_fail() {
    let (emulator, _frames) = power_on();
    let (callback, result) = reply::<Vec<u8>>();
    emulator.save_state(callback);
    assert!(result.recv_timeout(TIMEOUT).unwrap().is_err());

    let (callback, result) = reply::<()>();
    emulator.reset(callback);
    assert!(result.recv_timeout(TIMEOUT).unwrap().is_err());
}

#[test]
fn test_save_and_load_state() {
    let (emulator, _frames) = power_on();
    load_nrom(&emulator);

    let (callback, result) = reply::<Vec<u8>>();
    emulator.save_state(callback);
    let state = result.recv_timeout(TIMEOUT).unwrap().unwrap();

    let (callback, result) = reply::<()>();
    emulator.load_state(state.clone(), callback);
    result.recv_timeout(TIMEOUT).unwrap().unwrap();

    let (callback, result) = reply::<()>();
    emulator.load_state(state[..10].to_vec(), callback);
    assert!(result.recv_timeout(TIMEOUT).unwrap().is_err());
}

#[test]
fn test_reset_resumes_only_if_running() {
    let (emulator, frames) = power_on();
    load_nrom(&emulator);

    let (callback, result) = reply::<()>();
    emulator.reset(callback);
    result.recv_timeout(TIMEOUT).unwrap().unwrap();
    assert_eq!(emulator.running_state(), RunningState::Stopped);

    emulator.run();
    frames.recv_timeout(TIMEOUT).unwrap();
    let (callback, result) = reply::<()>();
    emulator.reset(callback);
    result.recv_timeout(TIMEOUT).unwrap().unwrap();
    assert_eq!(emulator.running_state(), RunningState::Running);
}

#[test]
fn test_run_task_sees_system() {
    let (emulator, frames) = power_on();

    let (sender, receiver) = cb::bounded(1);
    emulator.run_task(move |nes| {
        let _ = sender.send(nes.is_some());
    });
    assert!(!receiver.recv_timeout(TIMEOUT).unwrap());

    load_nrom(&emulator);
    emulator.run();
    frames.recv_timeout(TIMEOUT).unwrap();
    emulator.pause();

    let (sender, receiver) = cb::bounded(1);
    emulator.run_task(move |nes| {
        let _ = sender.send(nes.map(|nes| nes.frame_count()));
    });
    assert!(receiver.recv_timeout(TIMEOUT).unwrap().unwrap() >= 1);
}

#[test]
fn test_unload_stops_and_keeps_devices() {
    let (emulator, frames) = power_on();
    load_nrom(&emulator);
    let (callback, result) = reply::<()>();
    emulator.unload(callback);
    result.recv_timeout(TIMEOUT).unwrap().unwrap();
    assert_eq!(emulator.running_state(), RunningState::Stopped);

    // The video device is handed to the next system.
    load_nrom(&emulator);
    emulator.run();
    assert!(frames.recv_timeout(TIMEOUT).is_ok());
}

fn port_types(emulator: &Emulator) -> [ControllerType; 2] {
    let (sender, receiver) = cb::bounded(1);
    emulator.run_task(move |nes| {
        let types = nes.map(|nes| {
            let controllers = &nes.cpu.bus.controllers;
            [controllers[0].controller_type(), controllers[1].controller_type()]
        });
        let _ = sender.send(types);
    });
    receiver.recv_timeout(TIMEOUT).unwrap().unwrap()
}

#[test]
fn test_controller_override_before_load() {
    let (emulator, _frames) = power_on();
    let crc = RomBuilder::nrom().cartridge().checksum();
    emulator.set_controller_override(crc, 1, ControllerType::Zapper);

    load_nrom(&emulator);
    assert_eq!(
        port_types(&emulator),
        [ControllerType::Standard, ControllerType::Zapper]
    );
}

#[test]
fn test_controller_override_survives_unload() {
    let (emulator, _frames) = power_on();
    let crc = load_nrom(&emulator);
    emulator.set_controller_override(crc, 1, ControllerType::Zapper);
    assert_eq!(port_types(&emulator)[1], ControllerType::Zapper);

    let (callback, result) = reply::<()>();
    emulator.unload(callback);
    result.recv_timeout(TIMEOUT).unwrap().unwrap();

    load_nrom(&emulator);
    assert_eq!(port_types(&emulator)[1], ControllerType::Zapper);

    // Titles without an override keep their defaults.
    let (callback, result) = reply();
    let other = RomBuilder::nrom().program(0xC000, &[0x4C, 0x00, 0xC0]).build();
    emulator.load_rom(&other, callback);
    result.recv_timeout(TIMEOUT).unwrap().unwrap();
    assert_eq!(port_types(&emulator)[1], ControllerType::Standard);
}
