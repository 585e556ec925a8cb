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
    error::Error,
    fs::File,
    path::Path,
    thread,
    time::{Duration, Instant},
};

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::tracks::{Track, TrackFormat};

/// Writes interleaved 16-bit samples to a wav file.
pub fn write_wav(
    path: &Path,
    samples: &[i16],
    channels: u16,
    sample_rate: u32,
) -> Result<(), Box<dyn Error>> {
    let mut writer = WavWriter::new(
        File::create(path)?,
        WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        },
    )?;

    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

/// A track whose left channel counts up from zero and whose right channel counts down, so
/// every sample pair is distinguishable.
pub fn ramp_track(frames: u32) -> Track {
    let mut samples = Vec::with_capacity(frames as usize * 2);
    for i in 0..frames {
        let value = (i % 32768) as i16;
        samples.push(value);
        samples.push(-value);
    }
    Track::from_samples(samples, TrackFormat::default())
}

/// A track where every sample holds the same value.
pub fn constant_track(frames: u32, value: i16) -> Track {
    Track::from_samples(vec![value; frames as usize * 2], TrackFormat::default())
}

/// Returns the sample pair at the given frame of a track.
pub fn sample_pair(track: &Track, frame: usize) -> (i16, i16) {
    match track.data() {
        Some(data) => (data[frame * 2], data[frame * 2 + 1]),
        None => (0, 0),
    }
}

/// Wait for the given predicate to return true or fail.
#[inline]
pub fn eventually<F>(predicate: F, error_msg: &str)
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    let mut tick = Duration::from_millis(5);
    let timeout = Duration::from_secs(10);
    let max_tick = Duration::from_millis(100);

    loop {
        if start.elapsed() > timeout {
            panic!("{}", error_msg);
        }
        if predicate() {
            return;
        }
        thread::sleep(tick);
        tick = (tick * 2).min(max_tick);
    }
}
