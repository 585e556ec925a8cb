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

//! Decodes audio files into interleaved 16-bit stereo.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::debug;

use super::error::TrackError;
use super::TrackFormat;

/// The fully decoded contents of a file.
pub(super) struct DecodedTrack {
    /// Interleaved stereo samples.
    pub samples: Vec<i16>,
    pub format: TrackFormat,
}

/// Decodes the first audio track of the given file. Supports WAV, FLAC, MP3, Ogg and the
/// other formats symphonia knows about. Mono files are duplicated onto both channels.
pub(super) fn decode_file(path: &Path) -> Result<DecodedTrack, TrackError> {
    // Include the path in the error so the user sees which file failed.
    let file = File::open(path).map_err(|e| {
        TrackError::IoError(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let probed = get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| TrackError::NoAudioTrack(path.display().to_string()))?;
    let track_id = track.id;
    let params = track.codec_params.clone();

    let sample_rate = params
        .sample_rate
        .ok_or_else(|| TrackError::UnknownSampleRate(path.display().to_string()))?;
    let bits_per_sample = params.bits_per_sample.unwrap_or(16) as u16;
    let mut source_channels = params.channels.map(|c| c.count());

    let mut decoder = get_codecs().make(&params, &DecoderOptions::default())?;

    let mut samples = Vec::new();
    if let Some(n_frames) = params.n_frames {
        samples.reserve(n_frames as usize * 2);
    }

    while let Some(packet) = read_next_packet(format_reader.as_mut(), decoder.as_mut())? {
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                // A corrupt packet is skipped rather than failing the whole track.
                debug!(path = ?path, error = e, "Skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count();
        if channels == 0 || channels > 2 {
            return Err(TrackError::UnsupportedChannels(channels));
        }
        source_channels.get_or_insert(channels);

        let mut buffer = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);

        if channels == 1 {
            for &sample in buffer.samples() {
                samples.push(sample);
                samples.push(sample);
            }
        } else {
            samples.extend_from_slice(buffer.samples());
        }
    }

    Ok(DecodedTrack {
        samples,
        format: TrackFormat {
            sample_rate,
            source_channels: source_channels.unwrap_or(2) as u16,
            bits_per_sample,
        },
    })
}

/// Reads the next packet. Returns `Ok(None)` at the end of the stream.
fn read_next_packet(
    format_reader: &mut dyn FormatReader,
    decoder: &mut dyn symphonia::core::codecs::Decoder,
) -> Result<Option<Packet>, TrackError> {
    loop {
        match format_reader.next_packet() {
            Ok(packet) => return Ok(Some(packet)),
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(None);
            }
            // Some formats report a decode error at the end of the stream instead of EOF.
            Err(SymphoniaError::DecodeError(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        }
    }
}
