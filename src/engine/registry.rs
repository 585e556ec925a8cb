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

//! The fixed table of persistent, handle-addressed clip slots.
//!
//! Membership (which slots are claimed, which are listed for mixing) lives behind one
//! global lock. Each slot's playback state lives behind its own lock. The global lock is
//! always taken first and no slot lock is ever held while waiting for it.

use parking_lot::Mutex;

use super::clip::ClipInfo;
use super::handle::ClipId;

#[derive(Debug, Clone, Copy, Default)]
struct SlotMeta {
    /// Owned by a handle or by a detached clip that is still playing.
    claimed: bool,
    /// The owning handle was dropped. The slot is released once the clip retires.
    detached: bool,
    /// Present in the active list.
    listed: bool,
}

struct Membership {
    /// Slots mixed by the scheduler, in play order. Never holds more than `capacity` entries.
    active: Vec<u16>,
    meta: Vec<SlotMeta>,
    /// Unclaimed slots. Popped from the back, so the lowest index is handed out first.
    free: Vec<u16>,
}

struct SlotState {
    /// Bumped every time the slot is released so stale handles and checkins are detected.
    generation: u32,
    info: ClipInfo,
}

pub(crate) struct ClipRegistry {
    membership: Mutex<Membership>,
    slots: Box<[Mutex<SlotState>]>,
}

impl ClipRegistry {
    /// Creates a registry with `capacity` slots. The capacity must fit in a u16, which the
    /// engine validates.
    pub(crate) fn new(capacity: usize) -> ClipRegistry {
        let capacity = capacity.min(u16::MAX as usize);
        ClipRegistry {
            membership: Mutex::new(Membership {
                active: Vec::with_capacity(capacity),
                meta: vec![SlotMeta::default(); capacity],
                free: (0..capacity as u16).rev().collect(),
            }),
            slots: (0..capacity)
                .map(|_| {
                    Mutex::new(SlotState {
                        generation: 0,
                        info: ClipInfo::default(),
                    })
                })
                .collect(),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of listed slots, including clips that retired since the last compaction.
    pub(crate) fn active_count(&self) -> usize {
        self.membership.lock().active.len()
    }

    /// Number of slots owned by a handle or by a detached clip.
    pub(crate) fn claimed_count(&self) -> usize {
        let membership = self.membership.lock();
        self.capacity() - membership.free.len()
    }

    /// Claims a free slot, arms `info` in it and lists it for mixing.
    pub(crate) fn claim(&self, info: ClipInfo) -> Option<ClipId> {
        let mut membership = self.membership.lock();
        let index = membership.free.pop()?;

        let mut slot = self.slots[index as usize].lock();
        let previous = std::mem::replace(&mut slot.info, info);
        slot.info.rewind();
        let id = ClipId::new(index, slot.generation);
        drop(slot);

        membership.meta[index as usize] = SlotMeta {
            claimed: true,
            detached: false,
            listed: true,
        };
        membership.active.push(index);
        drop(membership);

        // A slot released by compaction still holds its last clip's track reference.
        drop(previous);
        Some(id)
    }

    /// Runs `f` on the clip in the slot if the slot still belongs to `id`.
    pub(crate) fn with_clip<R>(
        &self,
        id: ClipId,
        f: impl FnOnce(&mut ClipInfo) -> R,
    ) -> Option<R> {
        let mut slot = self.slots.get(id.index() as usize)?.lock();
        if slot.generation != id.generation() {
            return None;
        }
        Some(f(&mut slot.info))
    }

    /// Re-arms an idle clip from the beginning of its range. An active clip is left alone.
    pub(crate) fn replay(&self, id: ClipId) -> bool {
        let index = id.index() as usize;
        let mut membership = self.membership.lock();
        let Some(slot) = self.slots.get(index) else {
            return false;
        };
        let mut slot = slot.lock();
        if slot.generation != id.generation() || !membership.meta[index].claimed {
            return false;
        }
        if slot.info.active {
            return true;
        }
        slot.info.rewind();
        drop(slot);

        if !membership.meta[index].listed {
            membership.meta[index].listed = true;
            membership.active.push(id.index());
        }
        true
    }

    /// Removes the clip from the active list at once, preserving the order of the rest, and
    /// releases the slot.
    pub(crate) fn stop(&self, id: ClipId) -> bool {
        let index = id.index() as usize;
        let mut membership = self.membership.lock();
        let Some(slot) = self.slots.get(index) else {
            return false;
        };
        let mut slot = slot.lock();
        if slot.generation != id.generation() || !membership.meta[index].claimed {
            return false;
        }

        let Membership { active, meta, free } = &mut *membership;
        if meta[index].listed {
            if let Some(position) = active.iter().position(|&i| i == id.index()) {
                active.remove(position);
            }
        }
        meta[index] = SlotMeta::default();
        slot.generation = slot.generation.wrapping_add(1);
        let previous = std::mem::take(&mut slot.info);
        free.push(id.index());
        drop(slot);
        drop(membership);

        drop(previous);
        true
    }

    /// Gives up ownership of the slot. A listed clip keeps playing and its slot is released
    /// by the compaction that retires it. An idle slot is released now.
    pub(crate) fn detach(&self, id: ClipId) {
        let index = id.index() as usize;
        let mut membership = self.membership.lock();
        let Some(slot) = self.slots.get(index) else {
            return;
        };
        let mut slot = slot.lock();
        if slot.generation != id.generation() || !membership.meta[index].claimed {
            return;
        }

        if membership.meta[index].listed {
            membership.meta[index].detached = true;
            return;
        }

        membership.meta[index] = SlotMeta::default();
        slot.generation = slot.generation.wrapping_add(1);
        let previous = std::mem::take(&mut slot.info);
        membership.free.push(id.index());
        drop(slot);
        drop(membership);

        drop(previous);
    }

    /// Copies the active list into `into`, which must have room for `capacity` entries.
    pub(crate) fn snapshot(&self, into: &mut Vec<u16>) {
        let membership = self.membership.lock();
        into.clear();
        into.extend_from_slice(&membership.active);
    }

    /// Copies out an active clip along with the slot generation it was read under.
    pub(crate) fn checkout(&self, index: u16) -> Option<(u32, ClipInfo)> {
        let slot = self.slots.get(index as usize)?.lock();
        if !slot.info.active {
            return None;
        }
        Some((slot.generation, slot.info.clone()))
    }

    /// Writes a mixed clip back. Skipped if the slot was released since checkout.
    pub(crate) fn checkin(&self, index: u16, generation: u32, info: ClipInfo) {
        let Some(slot) = self.slots.get(index as usize) else {
            return;
        };
        let mut slot = slot.lock();
        if slot.generation == generation {
            slot.info = info;
        }
    }

    /// Drops retired clips from the active list, keeping the order of the survivors.
    /// Detached slots are released. No clip data is freed here.
    pub(crate) fn compact(&self) {
        let mut membership = self.membership.lock();
        let Membership { active, meta, free } = &mut *membership;
        active.retain(|&index| {
            let mut slot = self.slots[index as usize].lock();
            if slot.info.active {
                return true;
            }

            let meta = &mut meta[index as usize];
            meta.listed = false;
            if meta.detached {
                *meta = SlotMeta::default();
                slot.generation = slot.generation.wrapping_add(1);
                free.push(index);
            }
            false
        });
    }

    #[cfg(test)]
    fn active_indices(&self) -> Vec<u16> {
        self.membership.lock().active.clone()
    }
}
