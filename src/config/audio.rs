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
use serde::Deserialize;

const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_PERIOD_FRAMES: usize = crate::engine::SAMPLE_COUNT;

/// A YAML representation of the audio configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct Audio {
    /// The audio device. Names starting with "mock" select the mock device.
    device: String,

    /// Output sample rate in Hz (default: 44100)
    sample_rate: Option<u32>,

    /// Sample pairs mixed per callback (default: 4096)
    period_frames: Option<usize>,
}

impl Audio {
    /// New will create a new Audio configuration.
    pub fn new(device: &str) -> Audio {
        Audio {
            device: device.to_string(),
            sample_rate: None,
            period_frames: None,
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Returns the output sample rate (default: 44100)
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Returns the sample pairs mixed per callback (default: 4096)
    pub fn period_frames(&self) -> usize {
        self.period_frames.unwrap_or(DEFAULT_PERIOD_FRAMES)
    }

    /// Overrides the output sample rate.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Audio {
        self.sample_rate = Some(sample_rate);
        self
    }

    /// Overrides the sample pairs mixed per callback.
    pub fn with_period_frames(mut self, period_frames: usize) -> Audio {
        self.period_frames = Some(period_frames);
        self
    }
}
