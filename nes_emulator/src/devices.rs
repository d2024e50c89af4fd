//! Interfaces to the outside world: input, video and audio.
//!
//! Front ends implement these traits and hand them to [crate::Nes] or [crate::emulator::Emulator].
//! Frames and sample batches are pushed synchronously from inside the frame loop, so
//! implementations must not block.
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use hound::WavSpec;
use hound::WavWriter;
use log::error;

use crate::components::apu::SAMPLE_RATE;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum Button {
    A,
    B,
    Select,
    Start,
    Up,
    Down,
    Left,
    Right,
}

/// State of a light gun plugged into a controller port.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ZapperState {
    pub trigger: bool,
    pub light_sensed: bool,
}

pub trait InputDevice {
    fn is_pressed(&self, port: usize, button: Button) -> bool;

    fn zapper_state(&self, _port: usize) -> ZapperState {
        ZapperState::default()
    }
}

pub trait VideoDevice {
    /// Front ends that are minimized or skipping frames can decline a frame.
    fn wants_frame(&self) -> bool {
        true
    }

    /// Receives a completed frame of `width` x `height` ARGB pixels.
    fn push_frame(&mut self, width: usize, height: usize, pixels: &[u32]);
}

pub trait AudioDevice {
    /// Receives a batch of signed 16-bit mono samples at [SAMPLE_RATE].
    fn push_samples(&mut self, samples: &[i16]);
}

#[derive(Default)]
pub struct NullInput;

impl InputDevice for NullInput {
    fn is_pressed(&self, _port: usize, _button: Button) -> bool {
        false
    }
}

#[derive(Default)]
pub struct NullVideo;

impl VideoDevice for NullVideo {
    fn wants_frame(&self) -> bool {
        false
    }

    fn push_frame(&mut self, _width: usize, _height: usize, _pixels: &[u32]) {}
}

#[derive(Default)]
pub struct NullAudio;

impl AudioDevice for NullAudio {
    fn push_samples(&mut self, _samples: &[i16]) {}
}

/// The devices a system is connected to.
pub struct Devices {
    pub input: Box<dyn InputDevice>,
    pub video: Box<dyn VideoDevice>,
    pub audio: Box<dyn AudioDevice>,
}

impl Default for Devices {
    fn default() -> Self {
        Self {
            input: Box::new(NullInput),
            video: Box::new(NullVideo),
            audio: Box::new(NullAudio),
        }
    }
}

/// Keeps the most recent frame, e.g. for screenshots.
#[derive(Default)]
pub struct FrameCapture {
    pub frame: Vec<u32>,
    pub frame_count: u64,
}

impl VideoDevice for FrameCapture {
    fn push_frame(&mut self, _width: usize, _height: usize, pixels: &[u32]) {
        self.frame.clear();
        self.frame.extend_from_slice(pixels);
        self.frame_count += 1;
    }
}

/// Writes all received samples into a 16-bit mono WAV file.
pub struct WavRecorder {
    writer: Option<WavWriter<BufWriter<File>>>,
}

impl WavRecorder {
    pub fn create(path: &Path) -> Result<Self> {
        let spec = WavSpec {
            channels: 1,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = WavWriter::create(path, spec)
            .with_context(|| format!("Cannot create {}", path.display()))?;
        Ok(Self {
            writer: Some(writer),
        })
    }

    /// Writes the WAV header sizes and closes the file.
    pub fn finish(mut self) -> Result<()> {
        match self.writer.take() {
            Some(writer) => writer.finalize().context("Cannot finalize WAV file"),
            None => Ok(()),
        }
    }
}

impl AudioDevice for WavRecorder {
    fn push_samples(&mut self, samples: &[i16]) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        for sample in samples {
            if let Err(err) = writer.write_sample(*sample) {
                error!("Cannot write audio samples: {err}");
                // Stop recording, the file is finalized on drop.
                self.writer = None;
                return;
            }
        }
    }
}

impl Drop for WavRecorder {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(err) = writer.finalize() {
                error!("Cannot finalize WAV file: {err}");
            }
        }
    }
}
