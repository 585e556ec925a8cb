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

//! Decoded track storage.
//!
//! Tracks are decoded entirely into memory as interleaved 16-bit stereo so that clips can
//! read them from the audio thread without any I/O.

mod error;
mod loader;
mod store;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub use error::TrackError;
pub use store::TrackStore;

/// Global track ID counter. Zero is reserved for empty tracks.
static NEXT_TRACK_ID: AtomicU64 = AtomicU64::new(1);

/// Describes the file a track was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackFormat {
    /// Sample rate of the decoded audio.
    pub sample_rate: u32,
    /// Channel count of the source file. The decoded data is always stereo.
    pub source_channels: u16,
    /// Bit depth of the source file.
    pub bits_per_sample: u16,
}

impl Default for TrackFormat {
    fn default() -> Self {
        TrackFormat {
            sample_rate: 44100,
            source_channels: 2,
            bits_per_sample: 16,
        }
    }
}

/// An immutable buffer of interleaved 16-bit stereo samples.
///
/// Cloning a track is cheap: the sample data is shared. A track whose load failed has no
/// data at all and every clip built from it is silent.
#[derive(Clone)]
pub struct Track {
    id: u64,
    data: Option<Arc<[i16]>>,
    frames: u32,
    format: TrackFormat,
}

impl Track {
    /// Creates a track with no data.
    pub fn empty() -> Track {
        Track {
            id: 0,
            data: None,
            frames: 0,
            format: TrackFormat::default(),
        }
    }

    /// Wraps interleaved stereo samples. A trailing unpaired sample is dropped.
    pub(crate) fn from_samples(mut samples: Vec<i16>, format: TrackFormat) -> Track {
        let frames = (samples.len() / 2).min(u32::MAX as usize);
        samples.truncate(frames * 2);

        Track {
            id: NEXT_TRACK_ID.fetch_add(1, Ordering::Relaxed),
            data: Some(Arc::from(samples)),
            frames: frames as u32,
            format,
        }
    }

    /// The store-wide identifier of this track.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Number of sample pairs in the track.
    pub fn frames(&self) -> u32 {
        self.frames
    }

    pub fn format(&self) -> TrackFormat {
        self.format
    }

    /// True if the track has nothing to play.
    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    /// The playback length of the track at its own sample rate.
    pub fn duration(&self) -> Duration {
        if self.format.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames as f64 / self.format.sample_rate as f64)
    }

    pub(crate) fn data(&self) -> Option<&Arc<[i16]>> {
        self.data.as_ref()
    }

    /// Memory used by the sample data in bytes.
    pub fn memory_size(&self) -> usize {
        self.data
            .as_ref()
            .map(|data| std::mem::size_of_val(data.as_ref()))
            .unwrap_or(0)
    }
}

impl fmt::Debug for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Track")
            .field("id", &self.id)
            .field("frames", &self.frames)
            .field("format", &self.format)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_track() {
        let track = Track::empty();
        assert!(track.is_empty());
        assert!(track.data().is_none());
        assert_eq!(track.id(), 0);
        assert_eq!(track.memory_size(), 0);
    }

    #[test]
    fn test_from_samples_drops_unpaired_sample() {
        let track = Track::from_samples(vec![1, 2, 3, 4, 5], TrackFormat::default());
        assert_eq!(track.frames(), 2);
        assert_eq!(track.data().map(|d| d.len()), Some(4));
        assert_ne!(track.id(), 0);
    }

    #[test]
    fn test_duration() {
        let track = Track::from_samples(vec![0; 44100 * 2], TrackFormat::default());
        assert_eq!(track.duration(), Duration::from_secs(1));
    }
}
