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
use std::{fmt, thread, time::Duration};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use tracing::{error, info, span, warn, Level};

use super::thread_priority::{
    callback_thread_priority, configure_audio_thread_priority, log_priority_outcome,
    rt_audio_enabled, PriorityState,
};
use super::{AudioError, Device as AudioDevice, Output, SampleFormat, StreamFormat};
use crate::config;
use crate::engine::scheduler::Scheduler;

/// How often the output thread wakes up to check for shutdown.
const OUTPUT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A small wrapper around a cpal::Device along with the format it will be driven at.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
    /// The format the mixer needs from this device.
    format: StreamFormat,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn AudioDevice>>, AudioError> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn AudioDevice> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal devices.
    fn list_cpal_devices() -> Result<Vec<Device>, AudioError> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let Ok(output_configs) = device.supported_output_configs() else {
                    continue;
                };
                let max_channels = output_configs
                    .map(|output_config| output_config.channels())
                    .max()
                    .unwrap_or(0);

                if max_channels > 0 {
                    devices.push(Device {
                        name: device.name()?,
                        max_channels,
                        host_id,
                        device,
                        format: StreamFormat::required(44100, crate::engine::SAMPLE_COUNT),
                    })
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the given cpal device.
    pub fn get(config: &config::Audio) -> Result<Device, AudioError> {
        let name = config.device();
        match Device::list_cpal_devices()?
            .into_iter()
            .find(|device| device.name.trim() == name)
        {
            Some(mut device) => {
                device.format =
                    StreamFormat::required(config.sample_rate(), config.period_frames());
                Ok(device)
            }
            None => Err(AudioError::DeviceNotFound(name.to_string())),
        }
    }

    /// Finds a supported output config matching the required format. Fails if the device
    /// cannot play 16-bit stereo at the configured rate.
    fn negotiate(&self) -> Result<cpal::StreamConfig, AudioError> {
        let format = self.format;
        let rate = cpal::SampleRate(format.sample_rate);

        let supported = self
            .device
            .supported_output_configs()?
            .filter(|range| {
                range.channels() == format.channels
                    && range.sample_format() == cpal::SampleFormat::I16
                    && range.min_sample_rate() <= rate
                    && rate <= range.max_sample_rate()
            })
            .map(|range| range.with_sample_rate(rate))
            .next()
            .ok_or_else(|| AudioError::FormatMismatch {
                device: self.name.clone(),
                required: format,
            })?;

        let period = format.period_frames as u32;
        let buffer_size = match supported.buffer_size() {
            cpal::SupportedBufferSize::Range { min, max } if (*min..=*max).contains(&period) => {
                cpal::BufferSize::Fixed(period)
            }
            cpal::SupportedBufferSize::Range { min, max } => {
                warn!(
                    device = self.name,
                    period,
                    min,
                    max,
                    "Period not supported by device, using the default buffer size"
                );
                cpal::BufferSize::Default
            }
            cpal::SupportedBufferSize::Unknown => cpal::BufferSize::Default,
        };

        Ok(cpal::StreamConfig {
            channels: supported.channels(),
            sample_rate: supported.sample_rate(),
            buffer_size,
        })
    }
}

impl AudioDevice for Device {
    fn start(&self, scheduler: Scheduler) -> Result<Output, AudioError> {
        let span = span!(Level::INFO, "start output (cpal)");
        let _enter = span.enter();

        let stream_config = self.negotiate()?;
        let obtained = StreamFormat {
            sample_rate: stream_config.sample_rate.0,
            channels: stream_config.channels,
            sample_format: SampleFormat::Int,
            bits_per_sample: 16,
            period_frames: match stream_config.buffer_size {
                cpal::BufferSize::Fixed(frames) => frames as usize,
                cpal::BufferSize::Default => self.format.period_frames,
            },
        };
        if !self.format.is_compatible(&obtained) {
            return Err(AudioError::FormatMismatch {
                device: self.name.clone(),
                required: self.format,
            });
        }
        info!(device = self.name, format = %obtained, "Negotiated output format");

        let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let device = self.device.clone();
        let name = self.name.clone();

        // The stream is created and dropped on the output thread, which owns it for its
        // whole life.
        let output_thread = thread::Builder::new()
            .name("clipmix-output".to_string())
            .spawn(move || run_output(device, stream_config, scheduler, ready_tx, stop_rx))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Output::new(name, stop_tx, output_thread)),
            Ok(Err(e)) => {
                let _ = output_thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = output_thread.join();
                Err(AudioError::OutputThread)
            }
        }
    }

    fn format(&self) -> StreamFormat {
        self.format
    }
}

/// Builds and plays the stream, then keeps it alive until told to stop.
fn run_output(
    device: cpal::Device,
    stream_config: cpal::StreamConfig,
    mut scheduler: Scheduler,
    ready_tx: Sender<Result<(), AudioError>>,
    stop_rx: Receiver<()>,
) {
    let priority = callback_thread_priority();
    let rt_audio = rt_audio_enabled();
    let priority_state = std::sync::Arc::new(PriorityState::default());

    let callback_priority_state = priority_state.clone();
    let stream = device.build_output_stream(
        &stream_config,
        move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
            configure_audio_thread_priority(priority, rt_audio, &callback_priority_state);
            scheduler.render(data);
        },
        |err| error!("CPAL output stream error: {}", err),
        None,
    );

    let stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e.into()));
            return;
        }
    };
    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(e.into()));
        return;
    }
    info!("CPAL output stream started successfully");
    let _ = ready_tx.send(Ok(()));

    let mut priority_logged = false;
    loop {
        match stop_rx.recv_timeout(OUTPUT_POLL_INTERVAL) {
            Err(RecvTimeoutError::Timeout) => {
                if !priority_logged {
                    priority_logged = log_priority_outcome(&priority_state);
                }
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    drop(stream);
    info!("CPAL output stream stopped");
}
