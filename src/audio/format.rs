// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{fmt, time::Duration};

/// Sample format enumeration for audio output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// Integer samples (e.g., 16-bit, 24-bit, 32-bit)
    Int,
    /// Floating point samples (e.g., 32-bit float, 64-bit float)
    Float,
}

impl SampleFormat {
    /// Convert to string representation
    pub fn as_str(self) -> &'static str {
        match self {
            SampleFormat::Float => "float",
            SampleFormat::Int => "int",
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The shape of an output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Interleaved channels per frame
    pub channels: u16,
    /// Sample format (integer or float)
    pub sample_format: SampleFormat,
    /// Bits per sample
    pub bits_per_sample: u16,
    /// Frames handed to the callback per period
    pub period_frames: usize,
}

impl StreamFormat {
    /// The only format the mixer produces: interleaved 16-bit integer stereo.
    pub fn required(sample_rate: u32, period_frames: usize) -> StreamFormat {
        StreamFormat {
            sample_rate,
            channels: 2,
            sample_format: SampleFormat::Int,
            bits_per_sample: 16,
            period_frames,
        }
    }

    /// True if a stream of this format can carry the mixer's output. The period may differ,
    /// the callback splits or joins periods as needed.
    pub fn is_compatible(&self, other: &StreamFormat) -> bool {
        self.sample_rate == other.sample_rate
            && self.channels == other.channels
            && self.sample_format == other.sample_format
            && self.bits_per_sample == other.bits_per_sample
    }

    /// Wall-clock length of one period.
    pub fn period_duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.period_frames as f64 / self.sample_rate as f64)
    }

    /// Interleaved samples per period.
    pub fn period_samples(&self) -> usize {
        self.period_frames * self.channels as usize
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} channels, {}-bit {}, {} frames per period",
            self.sample_rate,
            self.channels,
            self.bits_per_sample,
            self.sample_format,
            self.period_frames
        )
    }
}
