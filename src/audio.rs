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
use std::{fmt, sync::Arc, thread};

use crossbeam_channel::Sender;
use tracing::{info, warn};

use crate::config;
use crate::engine::scheduler::Scheduler;

pub mod cpal;
mod error;
pub mod format;
pub mod mixer;
pub mod mock;
pub mod thread_priority;

pub use error::AudioError;
pub use format::{SampleFormat, StreamFormat};

pub trait Device: fmt::Display + std::marker::Send + std::marker::Sync {
    /// Starts pulling mixed audio from the scheduler. The stream runs until the returned
    /// output is stopped or dropped.
    fn start(&self, scheduler: Scheduler) -> Result<Output, AudioError>;

    /// The format this device is driven at.
    fn format(&self) -> StreamFormat;
}

/// A running output stream. The thread that owns the stream exits when this is stopped or
/// dropped.
pub struct Output {
    name: String,
    stop_tx: Option<Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl Output {
    pub(crate) fn new(name: String, stop_tx: Sender<()>, thread: thread::JoinHandle<()>) -> Output {
        Output {
            name,
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        }
    }

    /// True until the output thread exits.
    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|thread| !thread.is_finished())
    }

    /// Stops the stream and waits for its thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!(device = self.name, "Output thread panicked");
            } else {
                info!(device = self.name, "Output stopped");
            }
        }
    }
}

impl Drop for Output {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Output")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, AudioError> {
    cpal::Device::list()
}

/// Gets a device with the given name.
pub fn get_device(config: &config::Audio) -> Result<Arc<dyn Device>, AudioError> {
    let device = config.device();
    if device.starts_with("mock") {
        let format = StreamFormat::required(config.sample_rate(), config.period_frames());
        return Ok(Arc::new(mock::Device::get(device, format)));
    };

    Ok(Arc::new(cpal::Device::get(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_mock_device() {
        let config = config::Audio::new("mock-device")
            .with_sample_rate(48000)
            .with_period_frames(128);
        let device = get_device(&config).unwrap();
        assert_eq!(device.to_string(), "mock-device (Mock)");
        assert_eq!(device.format(), StreamFormat::required(48000, 128));
    }

    #[test]
    fn test_output_stop_is_idempotent() {
        let engine = crate::Engine::new(1, 1, 16).unwrap();
        let config = config::Audio::new("mock").with_period_frames(16);
        let device = get_device(&config).unwrap();

        let mut output = device.start(engine.scheduler()).unwrap();
        assert!(output.is_running());
        output.shutdown();
        assert!(!output.is_running());
        output.shutdown();
    }
}
