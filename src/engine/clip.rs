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

//! Per-instance playback state.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;

use crate::tracks::Track;

bitflags! {
    /// Marks which parameters of a clip are at their neutral value, so the mixer can take
    /// a cheaper path.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ClipFlags: u32 {
        /// Unity gain. Samples are copied without a multiply.
        const FIXED_VOLUME = 0x0001;
        /// Unit speed. Samples are copied without resampling.
        const FIXED_SPEED = 0x0002;
    }
}

/// The mutable playback state of one sound instance.
///
/// A clip plays the sample pairs `[start, end)` of a track. `progress` counts the pairs
/// consumed so far and `difference` carries the sub-sample position between callbacks when
/// the clip is pitched.
#[derive(Clone)]
pub struct ClipInfo {
    pub(crate) data: Option<Arc<[i16]>>,
    pub(crate) start: u32,
    pub(crate) end: u32,
    pub(crate) progress: u32,
    pub(crate) flags: ClipFlags,
    pub(crate) volume_left: f32,
    pub(crate) volume_right: f32,
    pub(crate) speed: f32,
    pub(crate) difference: f64,
    pub(crate) active: bool,
}

impl Default for ClipInfo {
    /// A silent clip with no track.
    fn default() -> Self {
        ClipInfo {
            data: None,
            start: 0,
            end: 0,
            progress: 0,
            flags: ClipFlags::FIXED_VOLUME | ClipFlags::FIXED_SPEED,
            volume_left: 1.0,
            volume_right: 1.0,
            speed: 1.0,
            difference: 0.0,
            active: false,
        }
    }
}

impl ClipInfo {
    /// Creates a clip that plays the whole track at unity gain and normal speed.
    pub fn new(track: &Track) -> ClipInfo {
        ClipInfo {
            data: track.data().cloned(),
            end: track.frames(),
            ..ClipInfo::default()
        }
    }

    /// Restricts playback to the sample pairs `[start, end)`, clamped to the track.
    pub fn with_range(mut self, start: u32, end: u32) -> ClipInfo {
        let end = end.min(self.track_frames());
        self.start = start.min(end);
        self.end = end;
        self.progress = self.progress.min(self.len());
        self
    }

    /// Sets the same gain on both channels.
    pub fn with_volume(mut self, volume: f32) -> ClipInfo {
        self.set_volume(volume);
        self
    }

    /// Sets independent left and right gains.
    pub fn with_stereo_volume(mut self, left: f32, right: f32) -> ClipInfo {
        self.set_stereo_volume(left, right);
        self
    }

    /// Pans the clip, -1.0 is hard left and 1.0 is hard right.
    pub fn with_pan(mut self, pan: f32) -> ClipInfo {
        self.set_pan(pan);
        self
    }

    /// Sets the playback speed. 2.0 plays an octave up in half the time. Speeds that are not
    /// finite and positive make the clip silent.
    pub fn with_speed(mut self, speed: f32) -> ClipInfo {
        self.set_speed(speed);
        self
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    /// Length of the playable range in sample pairs.
    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample pairs consumed within the playable range.
    pub fn progress(&self) -> u32 {
        self.progress
    }

    /// Sample pairs not yet consumed.
    pub fn remaining(&self) -> u32 {
        self.len().saturating_sub(self.progress)
    }

    /// The fractional source position carried between callbacks.
    pub fn difference(&self) -> f64 {
        self.difference
    }

    pub fn stereo_volume(&self) -> (f32, f32) {
        (self.volume_left, self.volume_right)
    }

    /// The gain of the louder channel.
    pub fn volume(&self) -> f32 {
        self.volume_left.max(self.volume_right)
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn flags(&self) -> ClipFlags {
        self.flags
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// True if the clip has a track to read from.
    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    fn track_frames(&self) -> u32 {
        self.data
            .as_ref()
            .map(|data| (data.len() / 2).min(u32::MAX as usize) as u32)
            .unwrap_or(0)
    }

    pub(crate) fn set_volume(&mut self, volume: f32) {
        self.set_stereo_volume(volume, volume);
    }

    pub(crate) fn set_stereo_volume(&mut self, left: f32, right: f32) {
        self.volume_left = left;
        self.volume_right = right;
        self.flags.remove(ClipFlags::FIXED_VOLUME);
    }

    /// Linear pan law: the louder channel keeps the current level and the other is
    /// attenuated towards silence.
    pub(crate) fn set_pan(&mut self, pan: f32) {
        let pan = if pan.is_nan() { 0.0 } else { pan.clamp(-1.0, 1.0) };
        let level = self.volume();
        self.set_stereo_volume(level * (1.0 - pan).min(1.0), level * (1.0 + pan).min(1.0));
    }

    pub(crate) fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
        self.flags.remove(ClipFlags::FIXED_SPEED);
    }

    /// Moves the playback position, clamped to the range. Drops any carried sub-sample.
    pub(crate) fn set_progress(&mut self, progress: u32) {
        self.progress = progress.min(self.len());
        self.difference = 0.0;
    }

    /// Arms the clip to play from the beginning of its range.
    pub(crate) fn rewind(&mut self) {
        self.progress = 0;
        self.difference = 0.0;
        self.active = true;
    }
}

impl fmt::Debug for ClipInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClipInfo")
            .field("has_data", &self.data.is_some())
            .field("start", &self.start)
            .field("end", &self.end)
            .field("progress", &self.progress)
            .field("flags", &self.flags)
            .field("volume_left", &self.volume_left)
            .field("volume_right", &self.volume_right)
            .field("speed", &self.speed)
            .field("difference", &self.difference)
            .field("active", &self.active)
            .finish()
    }
}
