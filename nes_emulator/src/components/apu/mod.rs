//! Implementation of the audio processing unit of the 2A03.
//!
//! The CPU only counts cycles into the APU with [Apu::tick]. The channels are run lazily, in
//! batches, whenever a register is accessed or enough cycles are pending. Interrupts raised by
//! the frame counter or the DMC are therefore visible at these catch-up points only.
mod channels;
mod dmc;
mod mixer;

use anyhow::ensure;
use anyhow::Result;
use log::debug;
use serde::Deserialize;
use serde::Serialize;

use self::channels::Noise;
use self::channels::Pulse;
use self::channels::Triangle;
use self::dmc::Dmc;
use self::mixer::ChannelLevels;
use self::mixer::Downsampler;
use crate::common::save_state::decode_from;
use crate::common::save_state::encode_into;
use crate::common::save_state::ensure_version;
use crate::common::save_state::SaveStateComponent;

pub use self::mixer::AudioChannels;

pub const CPU_CLOCK_HZ: u32 = 1_789_773;
pub const SAMPLE_RATE: u32 = 44_100;
/// Samples are handed to the audio sink in batches of this size.
pub const SAMPLE_BATCH_SIZE: usize = 1024;

/// Pending cycles that force a catch-up, about one scanline.
const CATCH_UP_CYCLES: u32 = 114;

/// CPU cycles of the frame counter steps in 4-step and 5-step mode.
const FOUR_STEP_SEQUENCE: [u32; 4] = [7457, 14913, 22371, 29829];
const FIVE_STEP_SEQUENCE: [u32; 5] = [7457, 14913, 22371, 29829, 37281];

/// Memory the DMC reads its samples from ($8000-$FFFF).
pub trait SampleMemory {
    fn read_sample(&mut self, addr: u16) -> u8;
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
enum FrameCounterMode {
    #[default]
    FourStep,
    FiveStep,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
struct FrameCounter {
    mode: FrameCounterMode,
    cycle: u32,
    step: usize,
    irq_inhibit: bool,
    irq_flag: bool,
}

/// Encoded representation of the APU.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
struct ApuState {
    pulse1: Pulse,
    pulse2: Pulse,
    triangle: Triangle,
    noise: Noise,
    dmc: Dmc,
    frame_counter: FrameCounter,
    odd_cycle: bool,
    pending_cycles: u32,
    downsampler: Downsampler,
}

impl Default for ApuState {
    fn default() -> Self {
        Self {
            pulse1: Pulse::new(true),
            pulse2: Pulse::new(false),
            triangle: Triangle::default(),
            noise: Noise::default(),
            dmc: Dmc::default(),
            frame_counter: FrameCounter::default(),
            odd_cycle: false,
            pending_cycles: 0,
            downsampler: Downsampler::default(),
        }
    }
}

impl FrameCounter {
    fn sequence(&self) -> &'static [u32] {
        match self.mode {
            FrameCounterMode::FourStep => &FOUR_STEP_SEQUENCE,
            FrameCounterMode::FiveStep => &FIVE_STEP_SEQUENCE,
        }
    }
}

impl ApuState {
    /// Rejects decoded values the channels would index or shift out of range with.
    fn validate(&self) -> Result<()> {
        self.pulse1.validate()?;
        self.pulse2.validate()?;
        self.triangle.validate()?;
        self.noise.validate()?;
        self.dmc.validate()?;
        self.downsampler.validate()?;
        let counter = &self.frame_counter;
        ensure!(
            counter.step < counter.sequence().len(),
            "Frame counter step {} out of range",
            counter.step
        );
        ensure!(
            self.pending_cycles < CATCH_UP_CYCLES,
            "Pending APU cycles out of range"
        );
        Ok(())
    }
}

pub struct Apu {
    state: ApuState,
    samples: Vec<i16>,
    volume: f32,
    channels: AudioChannels,
}

impl Default for Apu {
    fn default() -> Self {
        Self::new()
    }
}

impl Apu {
    pub fn new() -> Self {
        Self {
            state: ApuState::default(),
            samples: Vec::with_capacity(SAMPLE_BATCH_SIZE * 2),
            volume: 1.0,
            channels: AudioChannels::all(),
        }
    }

    pub fn reset(&mut self) {
        self.state = ApuState::default();
        self.samples.clear();
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    pub fn set_channels(&mut self, channels: AudioChannels) {
        self.channels = channels;
    }

    pub fn channels(&self) -> AudioChannels {
        self.channels
    }

    /// Counts one CPU cycle.
    pub fn tick(&mut self, memory: &mut impl SampleMemory) {
        self.state.pending_cycles += 1;
        if self.state.pending_cycles >= CATCH_UP_CYCLES {
            self.catch_up(memory);
        }
    }

    /// Runs all pending cycles.
    pub fn catch_up(&mut self, memory: &mut impl SampleMemory) {
        let cycles = std::mem::take(&mut self.state.pending_cycles);
        for _ in 0..cycles {
            self.run_cycle(memory);
        }
    }

    fn run_cycle(&mut self, memory: &mut impl SampleMemory) {
        let state = &mut self.state;
        state.triangle.clock_timer();
        if state.odd_cycle {
            state.pulse1.clock_timer();
            state.pulse2.clock_timer();
            state.noise.clock_timer();
        }
        state.odd_cycle = !state.odd_cycle;
        state.dmc.clock(&mut |addr| memory.read_sample(addr));
        self.clock_frame_counter();

        let level = self.levels().masked(self.channels).mix();
        if let Some(sample) = self.state.downsampler.push(level, self.volume) {
            self.samples.push(sample);
        }
    }

    fn clock_frame_counter(&mut self) {
        let counter = &mut self.state.frame_counter;
        counter.cycle += 1;
        let sequence = counter.sequence();
        if counter.cycle < sequence[counter.step] {
            return;
        }
        let step = counter.step;
        let last_step = step == sequence.len() - 1;
        if last_step {
            counter.cycle = 0;
            counter.step = 0;
            if counter.mode == FrameCounterMode::FourStep && !counter.irq_inhibit {
                counter.irq_flag = true;
            }
        } else {
            counter.step += 1;
        }

        // The fourth step of the 5-step sequence does not clock anything.
        let mode = counter.mode;
        if mode == FrameCounterMode::FiveStep && step == 3 {
            return;
        }
        self.clock_quarter_frame();
        if step == 1 || last_step {
            self.clock_half_frame();
        }
    }

    fn clock_quarter_frame(&mut self) {
        let state = &mut self.state;
        state.pulse1.envelope.clock();
        state.pulse2.envelope.clock();
        state.noise.envelope.clock();
        state.triangle.clock_linear_counter();
    }

    fn clock_half_frame(&mut self) {
        let state = &mut self.state;
        state.pulse1.length.clock();
        state.pulse2.length.clock();
        state.triangle.length.clock();
        state.noise.length.clock();
        state.pulse1.clock_sweep();
        state.pulse2.clock_sweep();
    }

    fn levels(&self) -> ChannelLevels {
        ChannelLevels {
            pulse1: self.state.pulse1.output(),
            pulse2: self.state.pulse2.output(),
            triangle: self.state.triangle.output(),
            noise: self.state.noise.output(),
            dmc: self.state.dmc.output(),
        }
    }

    /// Reads $4015, the only readable APU register. Clears the frame interrupt.
    pub fn read_status(&mut self, memory: &mut impl SampleMemory) -> u8 {
        self.catch_up(memory);
        let value = self.peek_status();
        self.state.frame_counter.irq_flag = false;
        value
    }

    pub fn peek_status(&self) -> u8 {
        let state = &self.state;
        [
            state.pulse1.length.active(),
            state.pulse2.length.active(),
            state.triangle.length.active(),
            state.noise.length.active(),
            state.dmc.active(),
            false,
            state.frame_counter.irq_flag,
            state.dmc.irq_flag,
        ]
        .iter()
        .enumerate()
        .fold(0, |status, (bit, set)| status | ((*set as u8) << bit))
    }

    /// Writes one of the registers $4000-$4013, $4015 or $4017.
    pub fn write_register(&mut self, addr: u16, value: u8, memory: &mut impl SampleMemory) {
        self.catch_up(memory);
        let state = &mut self.state;
        match addr {
            0x4000..=0x4003 => state.pulse1.write_register(addr & 3, value),
            0x4004..=0x4007 => state.pulse2.write_register(addr & 3, value),
            0x4008..=0x400B => state.triangle.write_register(addr & 3, value),
            0x400C..=0x400F => state.noise.write_register(addr & 3, value),
            0x4010..=0x4013 => state.dmc.write_register(addr & 3, value),
            0x4015 => {
                state.pulse1.length.set_enabled(value & 0x01 != 0);
                state.pulse2.length.set_enabled(value & 0x02 != 0);
                state.triangle.length.set_enabled(value & 0x04 != 0);
                state.noise.length.set_enabled(value & 0x08 != 0);
                state.dmc.set_enabled(value & 0x10 != 0);
            }
            0x4017 => {
                let counter = &mut state.frame_counter;
                counter.mode = if value & 0x80 != 0 {
                    FrameCounterMode::FiveStep
                } else {
                    FrameCounterMode::FourStep
                };
                counter.irq_inhibit = value & 0x40 != 0;
                if counter.irq_inhibit {
                    counter.irq_flag = false;
                }
                counter.cycle = 0;
                counter.step = 0;
                if counter.mode == FrameCounterMode::FiveStep {
                    self.clock_quarter_frame();
                    self.clock_half_frame();
                }
            }
            _ => debug!("Write to unmapped APU register {:04X}", addr),
        }
    }

    /// True while the frame counter or the DMC assert an interrupt.
    pub fn irq_line(&self) -> bool {
        self.state.frame_counter.irq_flag || self.state.dmc.irq_flag
    }

    /// Catches up and hands every complete batch of samples to `on_batch`. Called once per
    /// frame; the remainder is kept for the next frame.
    pub fn flush(&mut self, memory: &mut impl SampleMemory, mut on_batch: impl FnMut(&[i16])) {
        self.catch_up(memory);
        let complete = self.samples.len() - self.samples.len() % SAMPLE_BATCH_SIZE;
        for batch in self.samples[..complete].chunks(SAMPLE_BATCH_SIZE) {
            on_batch(batch);
        }
        self.samples.drain(..complete);
    }

    /// Number of samples waiting for a complete batch.
    pub fn buffered_samples(&self) -> usize {
        self.samples.len()
    }
}

impl SaveStateComponent for Apu {
    fn save_state(&self, out: &mut Vec<u8>) -> Result<()> {
        encode_into(&self.state, out)
    }

    fn load_state(&mut self, version: u32, input: &mut &[u8]) -> Result<()> {
        ensure_version("APU", version)?;
        let state: ApuState = decode_from(input)?;
        state.validate()?;
        self.state = state;
        self.samples.clear();
        Ok(())
    }
}
