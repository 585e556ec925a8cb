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
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread,
};

use crossbeam_channel::{bounded, TryRecvError};
use tracing::{info, span, Level};

use super::{AudioError, Output, StreamFormat};
use crate::engine::scheduler::Scheduler;

/// A mock device. Drives the scheduler from a timed thread and throws the output away.
#[derive(Clone)]
pub struct Device {
    name: String,
    format: StreamFormat,
    is_running: Arc<AtomicBool>,
    callbacks: Arc<AtomicU64>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str, format: StreamFormat) -> Device {
        Device {
            name: name.to_string(),
            format,
            is_running: Arc::new(AtomicBool::new(false)),
            callbacks: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns true while an output started from this device is running.
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }

    /// Number of periods rendered so far.
    pub fn callbacks(&self) -> u64 {
        self.callbacks.load(Ordering::Relaxed)
    }
}

impl super::Device for Device {
    fn start(&self, mut scheduler: Scheduler) -> Result<Output, AudioError> {
        let span = span!(Level::INFO, "start output (mock)");
        let _enter = span.enter();

        info!(device = self.name, format = %self.format, "Starting mock output");

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let period = self.format.period_duration();
        let mut buffer = vec![0i16; self.format.period_samples()];
        let is_running = self.is_running.clone();
        let callbacks = self.callbacks.clone();

        is_running.store(true, Ordering::Relaxed);
        let output_thread = thread::Builder::new()
            .name("clipmix-mock-output".to_string())
            .spawn(move || {
                while let Err(TryRecvError::Empty) = stop_rx.try_recv() {
                    scheduler.render(&mut buffer);
                    callbacks.fetch_add(1, Ordering::Relaxed);
                    spin_sleep::sleep(period);
                }
                is_running.store(false, Ordering::Relaxed);
            })?;

        Ok(Output::new(self.name.clone(), stop_tx, output_thread))
    }

    fn format(&self) -> StreamFormat {
        self.format
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::Device as _;
    use crate::engine::Engine;
    use crate::testutil::{constant_track, eventually};
    use crate::ClipInfo;

    #[test]
    fn test_mock_drives_scheduler() {
        let engine = Engine::new(4, 4, 64).unwrap();
        let device = Device::get("mock-device", StreamFormat::required(64000, 64));
        let track = constant_track(640, 100);
        let handle = engine.play(ClipInfo::new(&track));
        assert!(engine.dispatch(ClipInfo::new(&track)));

        let output = device.start(engine.scheduler()).unwrap();
        assert!(device.is_running());
        eventually(|| engine.is_idle(), "Clips never finished");
        assert!(!handle.is_playing());
        assert_eq!(handle.progress(), 640);
        eventually(|| device.callbacks() >= 10, "Callback count never caught up");

        output.stop();
        assert!(!device.is_running());
    }

    #[test]
    fn test_drop_stops_output() {
        let engine = Engine::new(1, 1, 32).unwrap();
        let device = Device::get("mock", StreamFormat::required(32000, 32));
        let output = device.start(engine.scheduler()).unwrap();
        eventually(|| device.callbacks() > 0, "Mock never rendered");

        drop(output);
        assert!(!device.is_running());
        let callbacks = device.callbacks();
        thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(device.callbacks(), callbacks);
    }

    #[test]
    fn test_display() {
        let device = Device::get("mock-device", StreamFormat::required(44100, 64));
        assert_eq!(device.to_string(), "mock-device (Mock)");
    }
}
