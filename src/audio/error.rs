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
use super::format::StreamFormat;

/// Error types for audio output
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("No device found with name {0}")]
    DeviceNotFound(String),

    #[error("Device {device} does not support {required}")]
    FormatMismatch {
        device: String,
        required: StreamFormat,
    },

    #[error("Unable to reach audio host: {0}")]
    HostUnavailable(#[from] cpal::HostUnavailable),

    #[error("Unable to list devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("Unable to read device name: {0}")]
    DeviceName(#[from] cpal::DeviceNameError),

    #[error("Unable to read supported stream configs: {0}")]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("Unable to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("Unable to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("Output thread exited before the stream started")]
    OutputThread,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
