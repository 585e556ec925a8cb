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

use crate::engine::CLIP_COUNT;

/// A YAML representation of the mixer configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Mixer {
    /// Persistent, handle controlled clip slots (default: 128)
    clip_capacity: Option<usize>,

    /// Fire-and-forget clip slots (default: 128)
    dispatch_capacity: Option<usize>,
}

impl Mixer {
    pub fn new(clip_capacity: usize, dispatch_capacity: usize) -> Mixer {
        Mixer {
            clip_capacity: Some(clip_capacity),
            dispatch_capacity: Some(dispatch_capacity),
        }
    }

    pub fn clip_capacity(&self) -> usize {
        self.clip_capacity.unwrap_or(CLIP_COUNT)
    }

    pub fn dispatch_capacity(&self) -> usize {
        self.dispatch_capacity.unwrap_or(CLIP_COUNT)
    }
}
