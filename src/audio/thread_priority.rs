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
use std::sync::atomic::{AtomicU8, Ordering};

use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};
use tracing::{info, warn};

/// Default priority for the audio callback thread when CLIPMIX_THREAD_PRIORITY is unset.
const DEFAULT_CALLBACK_THREAD_PRIORITY: u8 = 70;

/// Reads CLIPMIX_THREAD_PRIORITY (0-99) once; used when building the callback so we don't touch env in the hot path.
pub fn callback_thread_priority() -> Option<ThreadPriorityValue> {
    std::env::var("CLIPMIX_THREAD_PRIORITY")
        .ok()
        .and_then(|v| {
            let n = v.parse::<u8>().ok()?;
            (n < 100).then(|| ThreadPriorityValue::try_from(n).ok())?
        })
        .or_else(|| ThreadPriorityValue::try_from(DEFAULT_CALLBACK_THREAD_PRIORITY).ok())
}

pub(crate) fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| {
            v == "1"
                || v.eq_ignore_ascii_case("true")
                || v.eq_ignore_ascii_case("yes")
                || v.eq_ignore_ascii_case("on")
        })
        .unwrap_or(false)
}

/// Returns whether we should attempt RT (SCHED_FIFO) scheduling for the audio callback thread.
/// Default: enabled. Advanced users can opt out with CLIPMIX_DISABLE_RT_AUDIO=1.
pub fn rt_audio_enabled() -> bool {
    !env_flag("CLIPMIX_DISABLE_RT_AUDIO")
}

/// What happened when the callback thread tried to raise its priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PriorityOutcome {
    Pending = 0,
    Skipped = 1,
    Raised = 2,
    Realtime = 3,
    RealtimeFailed = 4,
}

/// Records the priority outcome from the callback so another thread can log it.
#[derive(Debug, Default)]
pub struct PriorityState {
    outcome: AtomicU8,
}

impl PriorityState {
    pub fn outcome(&self) -> PriorityOutcome {
        match self.outcome.load(Ordering::Acquire) {
            1 => PriorityOutcome::Skipped,
            2 => PriorityOutcome::Raised,
            3 => PriorityOutcome::Realtime,
            4 => PriorityOutcome::RealtimeFailed,
            _ => PriorityOutcome::Pending,
        }
    }

    fn record(&self, outcome: PriorityOutcome) {
        self.outcome.store(outcome as u8, Ordering::Release);
    }
}

/// Raises the calling thread's priority once. Safe to call from the audio callback: it
/// neither allocates nor logs.
pub fn configure_audio_thread_priority(
    priority: Option<ThreadPriorityValue>,
    rt_audio: bool,
    state: &PriorityState,
) {
    if state.outcome() != PriorityOutcome::Pending {
        return;
    }
    let Some(priority) = priority else {
        state.record(PriorityOutcome::Skipped);
        return;
    };

    let tp = ThreadPriority::Crossplatform(priority);
    let mut outcome = match set_current_thread_priority(tp) {
        Ok(()) => PriorityOutcome::Raised,
        Err(_) => PriorityOutcome::Skipped,
    };

    #[cfg(unix)]
    if rt_audio {
        use thread_priority::unix::{
            set_thread_priority_and_policy, thread_native_id, RealtimeThreadSchedulePolicy,
            ThreadSchedulePolicy,
        };
        let tid = thread_native_id();
        outcome = match set_thread_priority_and_policy(
            tid,
            tp,
            ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
        ) {
            Ok(()) => PriorityOutcome::Realtime,
            Err(_) => PriorityOutcome::RealtimeFailed,
        };
    }
    #[cfg(not(unix))]
    let _ = rt_audio;

    state.record(outcome);
}

/// Logs the outcome recorded by the callback. Returns true once something was logged.
pub fn log_priority_outcome(state: &PriorityState) -> bool {
    match state.outcome() {
        PriorityOutcome::Pending => return false,
        PriorityOutcome::Skipped => info!("Audio callback thread priority left unchanged"),
        PriorityOutcome::Raised => info!("Raised audio callback thread priority"),
        PriorityOutcome::Realtime => info!("Enabled RT SCHED_FIFO for audio callback thread"),
        PriorityOutcome::RealtimeFailed => {
            warn!("Failed to set RT SCHED_FIFO for audio callback thread")
        }
    }
    true
}
