//! Mixing of the channel levels and conversion to the output sample rate.
use anyhow::ensure;
use anyhow::Result;
use bilge::prelude::*;
use serde::Deserialize;
use serde::Serialize;

use super::CPU_CLOCK_HZ;
use super::SAMPLE_RATE;

/// First order DC blocking filter coefficient, about 37 Hz at 44.1 kHz.
const HIGH_PASS_ALPHA: f32 = 0.9947;

/// Mask of the channels that are audible.
#[bitsize(8)]
#[derive(Clone, Copy, DebugBits, FromBits, PartialEq)]
pub struct AudioChannels {
    pub pulse1: bool,
    pub pulse2: bool,
    pub triangle: bool,
    pub noise: bool,
    pub dmc: bool,
    pub unused: u3,
}

impl AudioChannels {
    pub fn all() -> Self {
        Self::from(0x1F)
    }

    pub fn none() -> Self {
        Self::from(0x00)
    }
}

impl Default for AudioChannels {
    fn default() -> Self {
        Self::all()
    }
}

/// Output levels of the five channels during one CPU cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelLevels {
    pub pulse1: u8,
    pub pulse2: u8,
    pub triangle: u8,
    pub noise: u8,
    pub dmc: u8,
}

impl ChannelLevels {
    pub fn masked(self, channels: AudioChannels) -> Self {
        let keep = |enabled: bool, level: u8| if enabled { level } else { 0 };
        Self {
            pulse1: keep(channels.pulse1(), self.pulse1),
            pulse2: keep(channels.pulse2(), self.pulse2),
            triangle: keep(channels.triangle(), self.triangle),
            noise: keep(channels.noise(), self.noise),
            dmc: keep(channels.dmc(), self.dmc),
        }
    }

    /// Non-linear mix of the 2A03 DAC, in the range 0.0 to about 1.0.
    pub fn mix(&self) -> f32 {
        let pulse = (self.pulse1 + self.pulse2) as f32;
        let pulse_out = if pulse > 0.0 {
            95.88 / (8128.0 / pulse + 100.0)
        } else {
            0.0
        };
        let tnd = self.triangle as f32 / 8227.0
            + self.noise as f32 / 12241.0
            + self.dmc as f32 / 22638.0;
        let tnd_out = if tnd > 0.0 {
            159.79 / (1.0 / tnd + 100.0)
        } else {
            0.0
        };
        pulse_out + tnd_out
    }
}

/// Averages the per-cycle mix over each output sample period and removes the DC offset.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct Downsampler {
    sum: f32,
    count: u32,
    phase: u32,
    previous_input: f32,
    previous_output: f32,
}

impl Downsampler {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.phase < CPU_CLOCK_HZ, "Downsampler phase out of range");
        Ok(())
    }

    /// Adds the mix of one CPU cycle. Returns a sample whenever an output period is complete.
    pub fn push(&mut self, level: f32, volume: f32) -> Option<i16> {
        self.sum += level;
        self.count += 1;
        self.phase += SAMPLE_RATE;
        if self.phase < CPU_CLOCK_HZ {
            return None;
        }
        self.phase -= CPU_CLOCK_HZ;

        let average = self.sum / self.count as f32;
        self.sum = 0.0;
        self.count = 0;
        let filtered = HIGH_PASS_ALPHA * (self.previous_output + average - self.previous_input);
        self.previous_input = average;
        self.previous_output = filtered;
        let scaled = filtered * volume.clamp(0.0, 1.0) * i16::MAX as f32;
        Some(scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_mixes_to_zero() {
        assert_eq!(ChannelLevels::default().mix(), 0.0);
    }

    #[test]
    fn test_mask_removes_channels() {
        let levels = ChannelLevels {
            pulse1: 15,
            pulse2: 15,
            triangle: 15,
            noise: 15,
            dmc: 127,
        };
        let mut channels = AudioChannels::all();
        channels.set_pulse1(false);
        let masked = levels.masked(channels);
        assert_eq!(masked.pulse1, 0);
        assert_eq!(masked.pulse2, 15);
        assert!(levels.mix() > masked.mix());
        assert_eq!(levels.masked(AudioChannels::none()).mix(), 0.0);
    }

    #[test]
    fn test_downsampling_rate() {
        let mut downsampler = Downsampler::default();
        let samples = (0..CPU_CLOCK_HZ)
            .filter_map(|_| downsampler.push(0.0, 1.0))
            .count();
        assert_eq!(samples, SAMPLE_RATE as usize);
    }

    #[test]
    fn test_dc_offset_is_removed() {
        let mut downsampler = Downsampler::default();
        let samples = (0..CPU_CLOCK_HZ / 2)
            .filter_map(|_| downsampler.push(0.5, 1.0))
            .collect::<Vec<_>>();
        assert!(samples[0] > 10000);
        assert!(samples.last().unwrap().abs() < 100);
    }
}
