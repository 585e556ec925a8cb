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
use crate::audio::mixer::{process_clip, MixBuffers};

/// The audio callback. Owned by whichever thread drives the output.
///
/// Every buffer the callback needs is allocated when the scheduler is built, so rendering
/// never allocates. Persistent clips are copied out of their slot, mixed without holding
/// any lock and written back. A control thread change made while a clip is being mixed can
/// therefore be lost, and takes one callback period at most to be visible again.
pub struct Scheduler {
    shared: Arc<Shared>,
    buffers: MixBuffers,
    clips: Vec<u16>,
    dispatched: Vec<u16>,
}

impl Scheduler {
    pub(crate) fn new(shared: Arc<Shared>) -> Scheduler {
        Scheduler {
            buffers: MixBuffers::new(shared.period_frames),
            clips: Vec::with_capacity(shared.registry.capacity()),
            dispatched: Vec::with_capacity(shared.dispatch.capacity()),
            shared,
        }
    }

    /// Maximum sample pairs mixed per cycle.
    pub fn period_frames(&self) -> usize {
        self.buffers.period_frames()
    }

    /// Fills `out` with interleaved stereo, one mixing cycle per period of sample pairs.
    /// A trailing unpaired sample is zeroed.
    pub fn render(&mut self, out: &mut [i16]) {
        let period = self.buffers.period_frames() * 2;
        for chunk in out.chunks_mut(period) {
            self.cycle(chunk);
        }
    }

    fn cycle(&mut self, out: &mut [i16]) {
        let shared = &self.shared;
        self.buffers.begin(out.len() / 2);

        shared.registry.snapshot(&mut self.clips);
        shared.dispatch.snapshot(&mut self.dispatched);

        for &index in &self.clips {
            if let Some((generation, mut info)) = shared.registry.checkout(index) {
                process_clip(&mut info, &mut self.buffers);
                shared.registry.checkin(index, generation, info);
            }
        }

        for &index in &self.dispatched {
            shared.dispatch.mix(index, &mut self.buffers);
        }

        self.buffers.write_output(out);

        shared.registry.compact();
        shared.dispatch.compact();
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("period_frames", &self.buffers.period_frames())
            .finish()
    }
}
