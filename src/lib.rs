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

//! A real-time clip mixing engine.
//!
//! Control threads start, adjust and stop clips through an [`Engine`]; a single audio thread
//! drives a [`Scheduler`] that mixes every active clip into interleaved 16-bit stereo.

pub mod audio;
pub mod config;
pub mod engine;
pub mod tracks;
pub mod util;

#[cfg(test)]
mod testutil;

pub use engine::clip::{ClipFlags, ClipInfo};
pub use engine::handle::{ClipId, Handle};
pub use engine::scheduler::Scheduler;
pub use engine::Engine;
pub use tracks::{Track, TrackFormat, TrackStore};
