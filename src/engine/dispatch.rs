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
use parking_lot::Mutex;

use super::clip::ClipInfo;
use crate::audio::mixer::{process_clip, MixBuffers};

struct DispatchList {
    /// Entries being mixed, in dispatch order.
    listed: Vec<u16>,
    free: Vec<u16>,
}

/// Fire-and-forget clips. Nothing outside the engine can reach an entry once dispatched,
/// so the scheduler mixes entries in place.
pub(crate) struct DispatchTable {
    list: Mutex<DispatchList>,
    entries: Box<[Mutex<ClipInfo>]>,
}

impl DispatchTable {
    pub(crate) fn new(capacity: usize) -> DispatchTable {
        let capacity = capacity.min(u16::MAX as usize);
        DispatchTable {
            list: Mutex::new(DispatchList {
                listed: Vec::with_capacity(capacity),
                free: (0..capacity as u16).rev().collect(),
            }),
            entries: (0..capacity)
                .map(|_| Mutex::new(ClipInfo::default()))
                .collect(),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn count(&self) -> usize {
        self.list.lock().listed.len()
    }

    /// Copies `info` into a free entry and marks it active. False when every entry is in use.
    pub(crate) fn dispatch(&self, info: ClipInfo) -> bool {
        let mut list = self.list.lock();
        let Some(index) = list.free.pop() else {
            return false;
        };

        let mut entry = self.entries[index as usize].lock();
        let previous = std::mem::replace(&mut *entry, info);
        entry.active = true;
        drop(entry);

        list.listed.push(index);
        drop(list);

        drop(previous);
        true
    }

    pub(crate) fn snapshot(&self, into: &mut Vec<u16>) {
        let list = self.list.lock();
        into.clear();
        into.extend_from_slice(&list.listed);
    }

    /// Mixes one entry in place.
    pub(crate) fn mix(&self, index: u16, buffers: &mut MixBuffers) {
        if let Some(entry) = self.entries.get(index as usize) {
            let mut info = entry.lock();
            if info.active {
                process_clip(&mut info, buffers);
            }
        }
    }

    /// Returns retired entries to the free list, keeping the order of the survivors.
    pub(crate) fn compact(&self) {
        let mut list = self.list.lock();
        let DispatchList { listed, free } = &mut *list;
        listed.retain(|&index| {
            if self.entries[index as usize].lock().active {
                return true;
            }
            free.push(index);
            false
        });
    }
}
