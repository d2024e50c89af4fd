use std::path::Path;
use std::path::PathBuf;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use argh::FromArgs;
use crossbeam_channel as cb;
use image::RgbaImage;
use log::info;
use nes_emulator::common::image::Image;
use nes_emulator::common::image::Rgba32;
use nes_emulator::common::logging;
use nes_emulator::debugger::EventFilter;
use nes_emulator::devices::AudioDevice;
use nes_emulator::devices::NullAudio;
use nes_emulator::devices::NullInput;
use nes_emulator::devices::NullVideo;
use nes_emulator::devices::WavRecorder;
use nes_emulator::emulator::Emulator;
use nes_emulator::emulator::EmulatorConfig;
use nes_emulator::emulator::SendDevices;
use nes_emulator::ExecutionResult;

/// Runs a NES ROM without a window
#[derive(FromArgs)]
struct HeadlessArgs {
    /// iNES file to load
    #[argh(positional)]
    rom: PathBuf,

    /// number of frames to run
    #[argh(option, default = "60")]
    frames: u64,

    /// write the last frame to this PNG file
    #[argh(option)]
    screenshot: Option<PathBuf>,

    /// record audio to this WAV file
    #[argh(option)]
    wav: Option<PathBuf>,

    /// write a save state after running
    #[argh(option)]
    save_state: Option<PathBuf>,

    /// restore this save state before running
    #[argh(option)]
    load_state: Option<PathBuf>,

    /// stop when this event happens, e.g. "pc C000" or "scanline 241". Can be repeated.
    #[argh(option)]
    break_on: Vec<String>,
}

struct Screenshot(RgbaImage);

impl Image for Screenshot {
    fn new(width: u32, height: u32) -> Self {
        Screenshot(RgbaImage::new(width, height))
    }

    fn set_pixel(&mut self, index: (u32, u32), value: Rgba32) {
        self.0[(index.0, index.1)] = image::Rgba::from(value.0);
    }
}

/// Outcome of running the frames on the emulation thread.
struct RunResult {
    frame_count: u64,
    break_reason: Option<String>,
    screenshot: Option<RgbaImage>,
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

fn wait<T>(receiver: cb::Receiver<Result<T>>) -> Result<T> {
    receiver.recv().context("Emulation thread stopped")?
}

fn main() -> Result<()> {
    logging::init();
    let args: HeadlessArgs = argh::from_env();

    let audio: Box<dyn AudioDevice + Send> = match &args.wav {
        Some(path) => Box::new(WavRecorder::create(path)?),
        None => Box::new(NullAudio),
    };
    let config = EmulatorConfig {
        frame_pacing: false,
        ..Default::default()
    };
    let devices = SendDevices {
        input: Box::new(NullInput),
        video: Box::new(NullVideo),
        audio,
    };
    let emulator = Emulator::power_on(config, devices)?;

    let (callback, result) = reply();
    emulator.load_file(&args.rom, callback);
    let crc = wait(result)?;
    info!("Loaded {} ({:08X})", args.rom.display(), crc);

    if let Some(path) = &args.load_state {
        let data = std::fs::read(path).with_context(|| format!("Cannot read {}", path.display()))?;
        let (callback, result) = reply();
        emulator.load_state(data, callback);
        wait(result).with_context(|| format!("Cannot restore {}", path.display()))?;
    }

    let break_points = args
        .break_on
        .iter()
        .map(|filter| filter.parse::<EventFilter>())
        .collect::<Result<Vec<_>>>()?;
    let run = run_frames(
        &emulator,
        args.frames,
        args.screenshot.is_some(),
        break_points,
    )?;
    info!("Ran {} frames", run.frame_count);

    if let Some(path) = &args.save_state {
        let (callback, result) = reply();
        emulator.save_state(callback);
        let data = wait(result)?;
        std::fs::write(path, data).with_context(|| format!("Cannot write {}", path.display()))?;
    }
    // Finalizes the WAV file.
    emulator.power_off();

    if let (Some(path), Some(screenshot)) = (&args.screenshot, run.screenshot) {
        save_screenshot(&screenshot, path)?;
    }
    if let Some(reason) = run.break_reason {
        bail!("Execution stopped: {}", reason);
    }
    Ok(())
}

fn run_frames(
    emulator: &Emulator,
    frames: u64,
    screenshot: bool,
    break_points: Vec<EventFilter>,
) -> Result<RunResult> {
    let (sender, receiver) = cb::bounded(1);
    emulator.run_task(move |nes| {
        let result = nes.map(|nes| {
            if !break_points.is_empty() {
                let mut debugger = nes.debugger();
                debugger.enable();
                for break_point in break_points {
                    debugger.add_break_point(break_point);
                }
            }
            let break_reason = match nes.execute_frames(frames) {
                ExecutionResult::Break(reason) => Some(format!(
                    "{} ({})\n{}\n{}",
                    reason.trigger,
                    reason.event,
                    nes.debug().cpu_registers(),
                    nes.debug().ppu().registers_info()
                )),
                _ => None,
            };
            RunResult {
                frame_count: nes.frame_count(),
                break_reason,
                screenshot: screenshot.then(|| nes.frame::<Screenshot>().0),
            }
        });
        let _ = sender.send(result);
    });
    match receiver.recv().context("Emulation thread stopped")? {
        Some(result) => Ok(result),
        None => bail!("No ROM loaded"),
    }
}

fn save_screenshot(image: &RgbaImage, path: &Path) -> Result<()> {
    image
        .save(path)
        .with_context(|| format!("Cannot write {}", path.display()))
}
