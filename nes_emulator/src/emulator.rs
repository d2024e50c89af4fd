//! Runs a [Nes] on its own thread.
//!
//! The system is only ever touched by the emulation thread. Other threads post requests through a
//! channel and receive the result through a reply callback, which is called on the emulation
//! thread. The running state is shared through an atomic and checked before every CPU cycle, so
//! pausing takes effect within the current frame.
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

use anyhow::anyhow;
use anyhow::Context;
use anyhow::Result;
use crossbeam_channel as cb;
use log::error;
use log::info;

use crate::components::apu::AudioChannels;
use crate::components::cartridge::Cartridge;
use crate::controller::ControllerType;
use crate::devices::AudioDevice;
use crate::devices::Devices;
use crate::devices::InputDevice;
use crate::devices::VideoDevice;
use crate::ExecutionResult;
use crate::Nes;

/// Duration of one NTSC frame (60.0988 Hz).
const FRAME_DURATION: Duration = Duration::from_nanos(16_639_267);

/// How long the idle emulation thread waits for requests before checking the running state.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[repr(u8)]
pub enum RunningState {
    Stopped = 0,
    Paused = 1,
    Running = 2,
}

impl From<u8> for RunningState {
    fn from(value: u8) -> Self {
        match value {
            2 => RunningState::Running,
            1 => RunningState::Paused,
            _ => RunningState::Stopped,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EmulatorConfig {
    /// Sleep between frames to run at the speed of the real console.
    pub frame_pacing: bool,
    /// Master volume from 0.0 to 1.0.
    pub volume: f32,
    pub audio_channels: AudioChannels,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            frame_pacing: true,
            volume: 1.0,
            audio_channels: AudioChannels::all(),
        }
    }
}

pub type Reply<T> = Box<dyn FnOnce(Result<T>) + Send>;

/// Code run on the emulation thread with access to the loaded system, if any.
pub type Task = Box<dyn FnOnce(Option<&mut Nes>) + Send>;

enum Request {
    Load(Cartridge, Reply<u32>),
    Unload(Reply<()>),
    Reset { resume: bool, reply: Reply<()> },
    SaveState(Reply<Vec<u8>>),
    LoadState(Vec<u8>, Reply<()>),
    SetConfig(EmulatorConfig),
    SetControllerOverride(u32, usize, ControllerType),
    Run(Task),
    PowerOff,
}

/// Devices handed to the emulation thread.
pub struct SendDevices {
    pub input: Box<dyn InputDevice + Send>,
    pub video: Box<dyn VideoDevice + Send>,
    pub audio: Box<dyn AudioDevice + Send>,
}

impl From<SendDevices> for Devices {
    fn from(devices: SendDevices) -> Self {
        Devices {
            input: devices.input,
            video: devices.video,
            audio: devices.audio,
        }
    }
}

pub struct Emulator {
    requests: cb::Sender<Request>,
    state: Arc<AtomicU8>,
    thread: Option<JoinHandle<()>>,
}

impl Emulator {
    /// Starts the emulation thread. No ROM is loaded and the emulator is stopped.
    pub fn power_on(config: EmulatorConfig, devices: SendDevices) -> Result<Self> {
        let (requests, receiver) = cb::unbounded();
        let state = Arc::new(AtomicU8::new(RunningState::Stopped as u8));
        let thread_state = state.clone();
        let thread = std::thread::Builder::new()
            .name("nes-emulation".to_string())
            .spawn(move || {
                EmulationThread::new(config, devices.into(), receiver, thread_state).run()
            })
            .context("Cannot start emulation thread")?;
        Ok(Self {
            requests,
            state,
            thread: Some(thread),
        })
    }

    pub fn running_state(&self) -> RunningState {
        RunningState::from(self.state.load(Ordering::Acquire))
    }

    fn set_running_state(&self, state: RunningState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn run(&self) {
        self.set_running_state(RunningState::Running);
    }

    pub fn pause(&self) {
        self.set_running_state(RunningState::Paused);
    }

    fn post(&self, request: Request) -> std::result::Result<(), Request> {
        self.requests.send(request).map_err(|err| err.into_inner())
    }

    /// Parses the iNES image on the calling thread and loads it on the emulation thread. The
    /// reply receives the ROM checksum.
    pub fn load_rom(&self, data: &[u8], reply: impl FnOnce(Result<u32>) + Send + 'static) {
        match Cartridge::with_ines_data(data) {
            Ok(cartridge) => {
                let request = Request::Load(cartridge, Box::new(reply));
                if let Err(Request::Load(_, reply)) = self.post(request) {
                    reply(Err(anyhow!("Emulator is powered off")));
                }
            }
            Err(err) => reply(Err(err)),
        }
    }

    pub fn load_file(&self, path: &Path, reply: impl FnOnce(Result<u32>) + Send + 'static) {
        match std::fs::read(path).with_context(|| format!("Cannot read {}", path.display())) {
            Ok(data) => self.load_rom(&data, reply),
            Err(err) => reply(Err(err)),
        }
    }

    pub fn unload(&self, reply: impl FnOnce(Result<()>) + Send + 'static) {
        self.set_running_state(RunningState::Stopped);
        if let Err(Request::Unload(reply)) = self.post(Request::Unload(Box::new(reply))) {
            reply(Err(anyhow!("Emulator is powered off")));
        }
    }

    /// Pauses, resets the system and resumes if it was running before.
    pub fn reset(&self, reply: impl FnOnce(Result<()>) + Send + 'static) {
        let resume = self.running_state() == RunningState::Running;
        if resume {
            self.pause();
        }
        let request = Request::Reset {
            resume,
            reply: Box::new(reply),
        };
        if let Err(Request::Reset { reply, .. }) = self.post(request) {
            reply(Err(anyhow!("Emulator is powered off")));
        }
    }

    pub fn save_state(&self, reply: impl FnOnce(Result<Vec<u8>>) + Send + 'static) {
        if let Err(Request::SaveState(reply)) = self.post(Request::SaveState(Box::new(reply))) {
            reply(Err(anyhow!("Emulator is powered off")));
        }
    }

    /// Restores a save state. On failure the system keeps running from its previous state.
    pub fn load_state(&self, data: Vec<u8>, reply: impl FnOnce(Result<()>) + Send + 'static) {
        let request = Request::LoadState(data, Box::new(reply));
        if let Err(Request::LoadState(_, reply)) = self.post(request) {
            reply(Err(anyhow!("Emulator is powered off")));
        }
    }

    pub fn set_config(&self, config: EmulatorConfig) {
        let _ = self.post(Request::SetConfig(config));
    }

    /// Selects the device on `port` for the title with checksum `crc`. Overrides are kept for
    /// the lifetime of the emulator, across ROM loads and unloads.
    pub fn set_controller_override(
        &self,
        crc: u32,
        port: usize,
        controller_type: ControllerType,
    ) {
        let _ = self.post(Request::SetControllerOverride(crc, port, controller_type));
    }

    /// Runs `task` on the emulation thread between two frames.
    pub fn run_task(&self, task: impl FnOnce(Option<&mut Nes>) + Send + 'static) {
        if let Err(Request::Run(task)) = self.post(Request::Run(Box::new(task))) {
            task(None);
        }
    }

    /// Stops the emulation thread after the current frame and waits for it to exit.
    pub fn power_off(mut self) {
        self.shut_down();
    }

    fn shut_down(&mut self) {
        self.set_running_state(RunningState::Stopped);
        let _ = self.post(Request::PowerOff);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Emulation thread panicked");
            }
        }
    }
}

impl Drop for Emulator {
    fn drop(&mut self) {
        self.shut_down();
    }
}

struct EmulationThread {
    nes: Option<Nes>,
    devices: Option<Devices>,
    config: EmulatorConfig,
    /// Controller overrides by checksum and port, applied to every system that is created.
    controller_overrides: HashMap<(u32, usize), ControllerType>,
    requests: cb::Receiver<Request>,
    state: Arc<AtomicU8>,
    next_frame: Instant,
}

impl EmulationThread {
    fn new(
        config: EmulatorConfig,
        devices: Devices,
        requests: cb::Receiver<Request>,
        state: Arc<AtomicU8>,
    ) -> Self {
        Self {
            nes: None,
            devices: Some(devices),
            config,
            controller_overrides: HashMap::new(),
            requests,
            state,
            next_frame: Instant::now(),
        }
    }

    fn running_state(&self) -> RunningState {
        RunningState::from(self.state.load(Ordering::Acquire))
    }

    fn run(mut self) {
        info!("Emulation thread started");
        loop {
            let running = self.running_state() == RunningState::Running && self.nes.is_some();
            let request = if running {
                match self.requests.try_recv() {
                    Ok(request) => Some(request),
                    Err(cb::TryRecvError::Empty) => None,
                    Err(cb::TryRecvError::Disconnected) => break,
                }
            } else {
                match self.requests.recv_timeout(IDLE_POLL_INTERVAL) {
                    Ok(request) => Some(request),
                    Err(cb::RecvTimeoutError::Timeout) => None,
                    Err(cb::RecvTimeoutError::Disconnected) => break,
                }
            };
            if let Some(request) = request {
                if !self.handle_request(request) {
                    break;
                }
                continue;
            }
            if running {
                self.run_frame();
            } else {
                self.next_frame = Instant::now();
            }
        }
        info!("Emulation thread stopped");
    }

    fn run_frame(&mut self) {
        let state = self.state.clone();
        let Some(nes) = self.nes.as_mut() else {
            return;
        };
        let result = nes.run_frame_until(|| {
            RunningState::from(state.load(Ordering::Acquire)) != RunningState::Running
        });
        if let ExecutionResult::Break(reason) = result {
            info!("Break: {} ({})", reason.trigger, reason.event);
            self.state
                .store(RunningState::Paused as u8, Ordering::Release);
            return;
        }
        if self.config.frame_pacing {
            self.next_frame += FRAME_DURATION;
            let now = Instant::now();
            if self.next_frame > now {
                std::thread::sleep(self.next_frame - now);
            } else {
                // Running behind, do not try to catch up.
                self.next_frame = now;
            }
        }
    }

    fn apply_config(&mut self) {
        if let Some(nes) = self.nes.as_mut() {
            nes.set_volume(self.config.volume);
            nes.set_audio_channels(self.config.audio_channels);
        }
    }

    /// Returns false when the thread should exit.
    fn handle_request(&mut self, request: Request) -> bool {
        match request {
            Request::Load(cartridge, reply) => {
                let crc = cartridge.checksum();
                match self.nes.as_mut() {
                    Some(nes) => {
                        nes.load_cartridge(cartridge);
                    }
                    None => {
                        let mut nes = Nes::new(cartridge);
                        nes.set_devices(self.devices.take().unwrap_or_default());
                        for (&(crc, port), &controller_type) in &self.controller_overrides {
                            nes.set_controller_override(crc, port, controller_type);
                        }
                        self.nes = Some(nes);
                    }
                }
                self.apply_config();
                reply(Ok(crc));
            }
            Request::Unload(reply) => {
                if let Some(mut nes) = self.nes.take() {
                    self.devices = Some(nes.take_devices());
                }
                reply(Ok(()));
            }
            Request::Reset { resume, reply } => match self.nes.as_mut() {
                Some(nes) => {
                    nes.reset();
                    if resume {
                        self.state
                            .store(RunningState::Running as u8, Ordering::Release);
                    }
                    reply(Ok(()));
                }
                None => reply(Err(anyhow!("No ROM loaded"))),
            },
            Request::SaveState(reply) => match self.nes.as_ref() {
                Some(nes) => reply(nes.save_state()),
                None => reply(Err(anyhow!("No ROM loaded"))),
            },
            Request::LoadState(data, reply) => match self.nes.as_mut() {
                Some(nes) => {
                    let result = nes.load_state(&data);
                    if let Err(err) = &result {
                        error!("Cannot load save state: {err:#}");
                    }
                    reply(result);
                }
                None => reply(Err(anyhow!("No ROM loaded"))),
            },
            Request::SetConfig(config) => {
                self.config = config;
                self.apply_config();
            }
            Request::SetControllerOverride(crc, port, controller_type) => {
                self.controller_overrides.insert((crc, port), controller_type);
                if let Some(nes) = self.nes.as_mut() {
                    nes.set_controller_override(crc, port, controller_type);
                }
            }
            Request::Run(task) => task(self.nes.as_mut()),
            Request::PowerOff => {
                self.nes = None;
                return false;
            }
        }
        true
    }
}
