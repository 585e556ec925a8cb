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
use std::fmt;
use std::sync::Arc;

use super::Shared;

/// Identifies one occupancy of a persistent slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClipId {
    index: u16,
    generation: u32,
}

impl ClipId {
    pub(crate) fn new(index: u16, generation: u32) -> ClipId {
        ClipId { index, generation }
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

struct HandleSlot {
    shared: Arc<Shared>,
    id: ClipId,
}

/// Controls a clip started with [`crate::Engine::play`].
///
/// Every operation on an invalid or stopped handle does nothing and reads return zero.
/// Dropping a handle lets its clip play to the end, after which the slot is reused.
#[must_use = "dropping a handle detaches the clip"]
pub struct Handle {
    slot: Option<HandleSlot>,
}

impl Handle {
    /// A handle that refers to nothing.
    pub fn invalid() -> Handle {
        Handle { slot: None }
    }

    pub(crate) fn new(shared: Arc<Shared>, id: ClipId) -> Handle {
        Handle {
            slot: Some(HandleSlot { shared, id }),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.slot.is_some()
    }

    pub fn id(&self) -> Option<ClipId> {
        self.slot.as_ref().map(|slot| slot.id)
    }

    fn with_clip<R: Default>(&self, f: impl FnOnce(&mut crate::ClipInfo) -> R) -> R {
        self.slot
            .as_ref()
            .and_then(|slot| slot.shared.registry.with_clip(slot.id, f))
            .unwrap_or_default()
    }

    /// Plays the clip again from the start if it has finished. Does nothing to a clip that
    /// is still playing. Returns false if the handle is invalid.
    pub fn play(&self) -> bool {
        match &self.slot {
            Some(slot) => slot.shared.registry.replay(slot.id),
            None => false,
        }
    }

    pub fn set_volume(&self, volume: f32) {
        self.with_clip(|info| info.set_volume(volume));
    }

    /// The gain of the louder channel.
    pub fn volume(&self) -> f32 {
        self.with_clip(|info| info.volume())
    }

    pub fn set_stereo_volume(&self, left: f32, right: f32) {
        self.with_clip(|info| info.set_stereo_volume(left, right));
    }

    pub fn stereo_volume(&self) -> (f32, f32) {
        self.with_clip(|info| info.stereo_volume())
    }

    /// Pans the clip while keeping the level of its louder channel.
    pub fn set_pan(&self, pan: f32) {
        self.with_clip(|info| info.set_pan(pan));
    }

    /// Changes the playback speed. Speeds that are not finite and positive are ignored.
    pub fn set_speed(&self, speed: f32) {
        if !speed.is_finite() || speed <= 0.0 {
            return;
        }
        self.with_clip(|info| info.set_speed(speed));
    }

    pub fn speed(&self) -> f32 {
        self.with_clip(|info| info.speed())
    }

    /// Seeks within the clip's range. The new position is clamped to the range.
    pub fn set_progress(&self, progress: u32) {
        self.with_clip(|info| info.set_progress(progress));
    }

    pub fn progress(&self) -> u32 {
        self.with_clip(|info| info.progress())
    }

    pub fn is_playing(&self) -> bool {
        self.with_clip(|info| info.is_active())
    }

    /// Stops the clip at once and invalidates the handle.
    pub fn stop(&mut self) {
        if let Some(slot) = self.slot.take() {
            slot.shared.registry.stop(slot.id);
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            slot.shared.registry.detach(slot.id);
        }
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle").field("id", &self.id()).finish()
    }
}
