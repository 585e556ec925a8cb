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

//! The mixing engine: persistent and fire-and-forget clip tables plus the callback that
//! mixes them.
//!
//! Control threads start and adjust clips through [`Engine`] and [`Handle`]. A single
//! audio thread owns a [`Scheduler`] and calls it once per hardware period.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

pub mod clip;
mod dispatch;
pub mod handle;
mod registry;
pub mod scheduler;

use self::clip::ClipInfo;
use self::dispatch::DispatchTable;
use self::handle::Handle;
use self::registry::ClipRegistry;
use self::scheduler::Scheduler;

/// Default number of persistent clip slots and of dispatch entries.
pub const CLIP_COUNT: usize = 128;

/// Default sample pairs mixed per callback.
pub const SAMPLE_COUNT: usize = 4096;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid clip capacity {0}, must be between 1 and 65535")]
    InvalidCapacity(usize),

    #[error("Invalid period of {0} sample pairs, must be at least 1")]
    InvalidPeriod(usize),
}

/// State shared by the engine, its handles and its scheduler.
pub(crate) struct Shared {
    pub(crate) registry: ClipRegistry,
    pub(crate) dispatch: DispatchTable,
    pub(crate) period_frames: usize,
}

/// The mixing engine. Cloning is cheap and every clone drives the same clips.
#[derive(Clone)]
pub struct Engine {
    shared: Arc<Shared>,
}

impl Engine {
    /// Creates an engine with the given table sizes and per-callback budget.
    pub fn new(
        clip_capacity: usize,
        dispatch_capacity: usize,
        period_frames: usize,
    ) -> Result<Engine, EngineError> {
        for capacity in [clip_capacity, dispatch_capacity] {
            if capacity == 0 || capacity > u16::MAX as usize {
                return Err(EngineError::InvalidCapacity(capacity));
            }
        }
        if period_frames == 0 {
            return Err(EngineError::InvalidPeriod(period_frames));
        }

        info!(
            clip_capacity,
            dispatch_capacity, period_frames, "Creating mixing engine"
        );
        Ok(Engine::build(clip_capacity, dispatch_capacity, period_frames))
    }

    /// Creates an engine sized by the given configuration.
    pub fn from_config(config: &crate::config::Engine) -> Result<Engine, EngineError> {
        let mixer = config.mixer();
        Engine::new(
            mixer.clip_capacity(),
            mixer.dispatch_capacity(),
            config.audio().period_frames(),
        )
    }

    fn build(clip_capacity: usize, dispatch_capacity: usize, period_frames: usize) -> Engine {
        Engine {
            shared: Arc::new(Shared {
                registry: ClipRegistry::new(clip_capacity),
                dispatch: DispatchTable::new(dispatch_capacity),
                period_frames,
            }),
        }
    }

    /// Starts a persistent clip from the beginning of its range. Returns an invalid handle if
    /// every slot is taken.
    pub fn play(&self, info: ClipInfo) -> Handle {
        match self.shared.registry.claim(info) {
            Some(id) => Handle::new(self.shared.clone(), id),
            None => {
                debug!(
                    capacity = self.shared.registry.capacity(),
                    "No free clip slot, not playing"
                );
                Handle::invalid()
            }
        }
    }

    /// Starts a fire-and-forget clip exactly as given. Returns false if the dispatch table is
    /// full.
    pub fn dispatch(&self, info: ClipInfo) -> bool {
        let dispatched = self.shared.dispatch.dispatch(info);
        if !dispatched {
            debug!(
                capacity = self.shared.dispatch.capacity(),
                "Dispatch table full, dropping clip"
            );
        }
        dispatched
    }

    /// Builds a callback with its scratch buffers preallocated.
    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(self.shared.clone())
    }

    /// Mixes `frames` sample pairs on the calling thread.
    pub fn render(&self, frames: usize) -> Vec<i16> {
        let mut out = vec![0; frames * 2];
        self.scheduler().render(&mut out);
        out
    }

    /// Persistent clips waiting to be mixed.
    pub fn active_count(&self) -> usize {
        self.shared.registry.active_count()
    }

    pub fn dispatch_count(&self) -> usize {
        self.shared.dispatch.count()
    }

    pub fn period_frames(&self) -> usize {
        self.shared.period_frames
    }

    /// Number of persistent clip slots.
    pub fn capacity(&self) -> usize {
        self.shared.registry.capacity()
    }

    pub fn dispatch_capacity(&self) -> usize {
        self.shared.dispatch.capacity()
    }

    /// True when nothing is left to mix.
    pub fn is_idle(&self) -> bool {
        self.active_count() == 0 && self.dispatch_count() == 0
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::build(CLIP_COUNT, CLIP_COUNT, SAMPLE_COUNT)
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("capacity", &self.capacity())
            .field("dispatch_capacity", &self.dispatch_capacity())
            .field("period_frames", &self.period_frames())
            .field("active", &self.active_count())
            .field("dispatched", &self.dispatch_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::constant_track;

    #[test]
    fn test_new_validates() {
        assert!(matches!(
            Engine::new(0, 4, 64),
            Err(EngineError::InvalidCapacity(0))
        ));
        assert!(matches!(
            Engine::new(4, 70000, 64),
            Err(EngineError::InvalidCapacity(70000))
        ));
        assert!(matches!(
            Engine::new(4, 4, 0),
            Err(EngineError::InvalidPeriod(0))
        ));
        assert!(Engine::new(u16::MAX as usize, 1, 1).is_ok());
    }

    #[test]
    fn test_default() {
        let engine = Engine::default();
        assert_eq!(engine.capacity(), CLIP_COUNT);
        assert_eq!(engine.dispatch_capacity(), CLIP_COUNT);
        assert_eq!(engine.period_frames(), SAMPLE_COUNT);
        assert!(engine.is_idle());
    }

    #[test]
    fn test_from_config() {
        let config = crate::config::Engine::new(
            crate::config::Audio::new("mock").with_period_frames(256),
            Some(crate::config::Mixer::new(8, 16)),
        );
        let engine = Engine::from_config(&config).unwrap();
        assert_eq!(engine.capacity(), 8);
        assert_eq!(engine.dispatch_capacity(), 16);
        assert_eq!(engine.period_frames(), 256);
    }

    #[test]
    fn test_play_when_full_returns_invalid_handle() {
        let engine = Engine::new(2, 1, 16).unwrap();
        let track = constant_track(100, 1);
        let first = engine.play(ClipInfo::new(&track));
        let second = engine.play(ClipInfo::new(&track));
        let third = engine.play(ClipInfo::new(&track));
        assert!(first.is_valid());
        assert!(second.is_valid());
        assert!(!third.is_valid());
        assert_eq!(engine.active_count(), 2);
    }

    #[test]
    fn test_clones_share_clips() {
        let engine = Engine::new(2, 2, 16).unwrap();
        let other = engine.clone();
        let track = constant_track(100, 1);
        let _handle = other.play(ClipInfo::new(&track));
        assert!(other.dispatch(ClipInfo::new(&track)));
        assert_eq!(engine.active_count(), 1);
        assert_eq!(engine.dispatch_count(), 1);
    }
}
