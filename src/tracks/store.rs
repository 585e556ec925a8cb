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

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::error::TrackError;
use super::loader::decode_file;
use super::{Track, TrackFormat};

/// Owns every loaded track until it is freed or the store is torn down.
///
/// Clips only hold shared references to track data, so a track freed while a clip still
/// plays it stays valid until that clip is gone.
pub struct TrackStore {
    /// Sample rate of the audio output. Tracks at other rates play at the wrong pitch.
    output_sample_rate: u32,
    /// Live tracks by ID.
    live: Mutex<HashMap<u64, Arc<[i16]>>>,
}

impl TrackStore {
    /// Creates an empty store for an output running at the given sample rate.
    pub fn new(output_sample_rate: u32) -> Self {
        Self {
            output_sample_rate,
            live: Mutex::new(HashMap::new()),
        }
    }

    /// Loads a track from a file. Failures are logged and produce an empty track, which
    /// plays as silence.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Track {
        let path = path.as_ref();
        match self.try_load(path) {
            Ok(track) => track,
            Err(e) => {
                warn!(path = ?path, error = %e, "Failed to load track");
                Track::empty()
            }
        }
    }

    /// Loads a track from a file, returning the reason on failure.
    pub fn try_load<P: AsRef<Path>>(&self, path: P) -> Result<Track, TrackError> {
        let path = path.as_ref();
        info!(path = ?path, "Loading track into memory");

        let decoded = decode_file(path)?;
        if decoded.format.sample_rate != self.output_sample_rate {
            warn!(
                path = ?path,
                track_rate = decoded.format.sample_rate,
                output_rate = self.output_sample_rate,
                "Track sample rate differs from output, it will play at the wrong pitch"
            );
        }

        let track = self.insert(decoded.samples, decoded.format);
        info!(
            path = ?path,
            id = track.id(),
            frames = track.frames(),
            sample_rate = track.format().sample_rate,
            duration_ms = track.duration().as_millis(),
            memory_kb = track.memory_size() / 1024,
            "Track loaded"
        );
        Ok(track)
    }

    /// Registers already decoded interleaved stereo samples as a track.
    pub fn insert(&self, samples: Vec<i16>, format: TrackFormat) -> Track {
        let track = Track::from_samples(samples, format);
        if let Some(data) = track.data() {
            self.live.lock().insert(track.id(), data.clone());
        }
        track
    }

    /// Releases the store's reference to the track. Returns false if the track was not live.
    pub fn free(&self, track: &Track) -> bool {
        let freed = self.live.lock().remove(&track.id()).is_some();
        if freed {
            debug!(id = track.id(), "Track freed");
        }
        freed
    }

    /// True if the track has been loaded into this store and not freed.
    pub fn is_live(&self, track: &Track) -> bool {
        self.live.lock().contains_key(&track.id())
    }

    /// Number of live tracks.
    pub fn len(&self) -> usize {
        self.live.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the memory held by live tracks in bytes.
    pub fn total_memory_usage(&self) -> usize {
        self.live
            .lock()
            .values()
            .map(|data| std::mem::size_of_val(data.as_ref()))
            .sum()
    }

    /// Frees every live track.
    pub fn clear(&self) {
        let mut live = self.live.lock();
        if !live.is_empty() {
            debug!(count = live.len(), "Freeing all tracks");
        }
        live.clear();
    }
}

impl Drop for TrackStore {
    fn drop(&mut self) {
        self.clear();
    }
}

impl std::fmt::Debug for TrackStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackStore")
            .field("live_tracks", &self.len())
            .field("output_sample_rate", &self.output_sample_rate)
            .field("total_memory_kb", &(self.total_memory_usage() / 1024))
            .finish()
    }
}
