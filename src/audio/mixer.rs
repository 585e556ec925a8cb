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
// Core per-clip mixing logic shared by every output backend and the offline renderer.
use crate::engine::clip::{ClipFlags, ClipInfo};

/// A pitched clip is retired once no more than this many sample pairs remain ahead of its
/// projected position.
pub const LOOKAHEAD_FRAMES: f64 = 3.0;

/// Wide accumulators used to sum clips before saturating to 16 bits. Nothing in here
/// survives from one callback to the next.
pub struct MixBuffers {
    /// Sum of every clip mixed this cycle.
    master: Vec<i32>,
    /// Scratch for the clip currently being mixed.
    channel: Vec<i32>,
    /// Sample pairs requested this cycle, at most `period_frames`.
    frames: usize,
    /// Maximum sample pairs per cycle.
    period_frames: usize,
}

impl MixBuffers {
    /// Allocates accumulators for up to `period_frames` sample pairs per cycle.
    pub fn new(period_frames: usize) -> Self {
        Self {
            master: vec![0; period_frames * 2],
            channel: vec![0; period_frames * 2],
            frames: period_frames,
            period_frames,
        }
    }

    /// Zeroes the master accumulator and sets this cycle's budget, capped at the period.
    pub fn begin(&mut self, frames: usize) {
        self.frames = frames.min(self.period_frames);
        self.master[..self.frames * 2].fill(0);
    }

    /// The sample pair budget of the current cycle.
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn period_frames(&self) -> usize {
        self.period_frames
    }

    /// The summed interleaved samples of the current cycle.
    pub fn master(&self) -> &[i32] {
        &self.master[..self.frames * 2]
    }

    /// Saturates the current cycle into `out`. Any part of `out` beyond the cycle is zeroed.
    pub fn write_output(&self, out: &mut [i16]) {
        let (mixed, rest) = out.split_at_mut((self.frames * 2).min(out.len()));
        for (dst, &src) in mixed.iter_mut().zip(self.master.iter()) {
            *dst = saturate(src);
        }
        rest.fill(0);
    }

    /// Adds the first `len` channel samples into the master accumulator.
    fn accumulate(&mut self, len: usize) {
        for (dst, &src) in self.master[..len].iter_mut().zip(self.channel[..len].iter()) {
            *dst = dst.saturating_add(src);
        }
    }
}

/// Clamps a summed sample to the 16-bit range.
#[inline]
pub fn saturate(sample: i32) -> i16 {
    sample.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

#[inline]
fn apply_gain(sample: i16, gain: f32) -> i32 {
    (sample as f32 * gain).round() as i32
}

/// Advances one clip by up to one cycle and adds its output into the master accumulator.
///
/// Unit-speed clips are copied directly. Pitched clips pick the source pair at
/// `floor(difference + j * speed)` for output pair `j`, a truncating resample, and carry the
/// fractional remainder into the next cycle. Gain is applied per sample unless the clip is
/// flagged as fixed volume. The clip is marked inactive once it cannot produce another
/// cycle's worth (unit speed) or another whole sample pair beyond the lookahead margin
/// (pitched).
pub fn process_clip(info: &mut ClipInfo, buffers: &mut MixBuffers) {
    let Some(data) = info.data.as_deref() else {
        info.active = false;
        return;
    };

    // Builders keep the range inside the track, but a clip must never read past it.
    if info.end as usize * 2 > data.len() || info.start > info.end {
        info.active = false;
        return;
    }

    let budget = buffers.frames;
    let remaining = info.remaining() as usize;
    let offset = (info.start as usize + info.progress as usize) * 2;
    let fixed_volume = info.flags.contains(ClipFlags::FIXED_VOLUME);
    let (volume_left, volume_right) = (info.volume_left, info.volume_right);

    if info.flags.contains(ClipFlags::FIXED_SPEED) {
        let length = remaining.min(budget);
        let source = &data[offset..offset + length * 2];
        let channel = &mut buffers.channel[..length * 2];

        if fixed_volume {
            for (dst, &src) in channel.iter_mut().zip(source) {
                *dst = src as i32;
            }
        } else {
            for (dst, src) in channel.chunks_exact_mut(2).zip(source.chunks_exact(2)) {
                dst[0] = apply_gain(src[0], volume_left);
                dst[1] = apply_gain(src[1], volume_right);
            }
        }
        buffers.accumulate(length * 2);

        info.active = remaining > budget;
        info.progress += length as u32;
        return;
    }

    let speed = info.speed as f64;
    if !speed.is_finite() || speed <= 0.0 {
        info.active = false;
        return;
    }

    // Only emit pairs whose source index is still inside the range.
    let available = remaining as f64 - info.difference;
    let count = if available > 0.0 {
        ((available / speed).floor() as usize).min(budget)
    } else {
        0
    };
    let last = remaining.saturating_sub(1);
    let channel = &mut buffers.channel[..count * 2];

    for (j, dst) in channel.chunks_exact_mut(2).enumerate() {
        let position = ((info.difference + j as f64 * speed).floor() as usize).min(last);
        let index = offset + position * 2;
        if fixed_volume {
            dst[0] = data[index] as i32;
            dst[1] = data[index + 1] as i32;
        } else {
            dst[0] = apply_gain(data[index], volume_left);
            dst[1] = apply_gain(data[index + 1], volume_right);
        }
    }
    buffers.accumulate(count * 2);

    let advanced = info.difference + count as f64 * speed;
    let whole = (advanced.floor() as usize).min(remaining);
    info.progress += whole as u32;
    info.difference = (advanced - whole as f64).max(0.0);

    let ahead = (remaining - whole) as f64 - info.difference;
    info.active = ahead >= speed && ahead > LOOKAHEAD_FRAMES;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{ramp_track, sample_pair};

    fn mix_once(info: &mut ClipInfo, frames: usize) -> Vec<i32> {
        let mut buffers = MixBuffers::new(frames);
        buffers.begin(frames);
        process_clip(info, &mut buffers);
        buffers.master().to_vec()
    }

    #[test]
    fn test_fixed_path_is_identity() {
        let track = ramp_track(64);
        let mut info = ClipInfo::new(&track).with_range(8, 40);
        info.active = true;

        let mixed = mix_once(&mut info, 16);
        for j in 0..16 {
            let (left, right) = sample_pair(&track, 8 + j);
            assert_eq!(mixed[j * 2], left as i32);
            assert_eq!(mixed[j * 2 + 1], right as i32);
        }
        assert_eq!(info.progress(), 16);
        assert!(info.is_active());
    }

    #[test]
    fn test_gain_is_rounded_per_channel() {
        let track = ramp_track(32);
        let mut info = ClipInfo::new(&track).with_stereo_volume(0.5, 0.25);
        info.active = true;

        let mixed = mix_once(&mut info, 32);
        for j in 0..32 {
            let (left, right) = sample_pair(&track, j);
            assert_eq!(mixed[j * 2], (left as f32 * 0.5).round() as i32);
            assert_eq!(mixed[j * 2 + 1], (right as f32 * 0.25).round() as i32);
        }
    }

    #[test]
    fn test_gain_without_cross_channel_leakage() {
        for speed in [None, Some(1.0f32)] {
            let track = ramp_track(32);
            let mut info = ClipInfo::new(&track).with_stereo_volume(1.0, 0.0);
            if let Some(speed) = speed {
                info = info.with_speed(speed);
            }
            info.active = true;

            let mixed = mix_once(&mut info, 16);
            for j in 0..16 {
                let (left, _) = sample_pair(&track, j);
                assert_eq!(mixed[j * 2], left as i32);
                assert_eq!(mixed[j * 2 + 1], 0);
            }
        }
    }

    #[test]
    fn test_full_length_at_unit_speed() {
        let period = 64;
        let length = 1000u32;
        let track = ramp_track(length);
        let mut info = ClipInfo::new(&track);
        info.active = true;

        let mut buffers = MixBuffers::new(period);
        let mut emitted = 0;
        let mut cycles = 0;
        while info.is_active() {
            buffers.begin(period);
            let before = info.progress();
            process_clip(&mut info, &mut buffers);
            emitted += info.progress() - before;
            cycles += 1;
            if info.is_active() {
                assert!(info.progress() < length);
            }
        }

        assert_eq!(info.progress(), length);
        assert_eq!(emitted, length);
        assert_eq!(cycles, length.div_ceil(period as u32));
    }

    #[test]
    fn test_exact_multiple_of_period_retires_on_last_cycle() {
        let track = ramp_track(128);
        let mut info = ClipInfo::new(&track);
        info.active = true;

        let mut buffers = MixBuffers::new(64);
        buffers.begin(64);
        process_clip(&mut info, &mut buffers);
        assert!(info.is_active());

        buffers.begin(64);
        process_clip(&mut info, &mut buffers);
        assert!(!info.is_active());
        assert_eq!(info.progress(), 128);
    }

    #[test]
    fn test_double_speed_picks_every_other_pair() {
        let track = ramp_track(64);
        let mut info = ClipInfo::new(&track).with_speed(2.0);
        info.active = true;

        let mixed = mix_once(&mut info, 8);
        for j in 0..8 {
            let (left, right) = sample_pair(&track, j * 2);
            assert_eq!(mixed[j * 2], left as i32);
            assert_eq!(mixed[j * 2 + 1], right as i32);
        }
        assert_eq!(info.progress(), 16);
        assert_eq!(info.difference(), 0.0);
    }

    #[test]
    fn test_half_speed_repeats_pairs_and_stays_in_range() {
        let track = ramp_track(10);
        let mut info = ClipInfo::new(&track).with_speed(0.5);
        info.active = true;
        info.difference = 0.9;

        let mut buffers = MixBuffers::new(64);
        buffers.begin(64);
        process_clip(&mut info, &mut buffers);

        // (10 - 0.9) / 0.5 = 18.2, so 18 pairs come out and none read past the range.
        let mixed = buffers.master();
        assert_eq!(mixed[0], sample_pair(&track, 0).0 as i32);
        assert_eq!(mixed[2], sample_pair(&track, 1).0 as i32);
        assert_eq!(mixed[17 * 2], sample_pair(&track, 9).0 as i32);
        assert_eq!(mixed[18 * 2], 0);
        assert!(info.progress() <= 10);
        assert!(!info.is_active());
    }

    #[test]
    fn test_pitch_position_does_not_drift() {
        let period = 64;
        for speed in [2.0f32, 1.5, 0.75] {
            let cycles = 1000usize;
            let frames = (period as f64 * speed as f64 * cycles as f64) as u32 + 1024;
            let track = ramp_track(frames);
            let mut info = ClipInfo::new(&track).with_speed(speed);
            info.active = true;

            let mut buffers = MixBuffers::new(period);
            for cycle in 1..=cycles {
                buffers.begin(period);
                process_clip(&mut info, &mut buffers);

                let expected = cycle as f64 * period as f64 * speed as f64;
                let tracked = info.progress() as f64 + info.difference();
                assert!(
                    (expected - tracked).abs() < 1.0,
                    "speed {} drifted to {} at cycle {}",
                    speed,
                    tracked - expected,
                    cycle
                );
            }
            assert!(info.is_active());
        }
    }

    #[test]
    fn test_pitched_clip_always_retires() {
        // A high speed leaves a tail shorter than one step; the clip must not stay active.
        let track = ramp_track(100);
        let mut info = ClipInfo::new(&track).with_speed(8.0);
        info.active = true;

        let mut buffers = MixBuffers::new(4);
        let mut cycles = 0;
        while info.is_active() {
            buffers.begin(4);
            process_clip(&mut info, &mut buffers);
            cycles += 1;
            assert!(cycles < 100, "clip never retired");
        }
        assert!(info.progress() <= 100);
    }

    #[test]
    fn test_null_buffer_is_silent_and_retired() {
        let mut info = ClipInfo::default();
        info.active = true;

        let mixed = mix_once(&mut info, 16);
        assert!(mixed.iter().all(|&s| s == 0));
        assert!(!info.is_active());
    }

    #[test]
    fn test_invalid_speed_is_retired() {
        for speed in [0.0f32, -1.0, f32::NAN, f32::INFINITY] {
            let track = ramp_track(64);
            let mut info = ClipInfo::new(&track).with_speed(speed);
            info.active = true;

            let mixed = mix_once(&mut info, 16);
            assert!(mixed.iter().all(|&s| s == 0));
            assert!(!info.is_active());
        }
    }

    #[test]
    fn test_mixing_is_additive() {
        let track = ramp_track(16);
        let mut first = ClipInfo::new(&track);
        let mut second = ClipInfo::new(&track).with_volume(2.0);

        let mut buffers = MixBuffers::new(16);
        buffers.begin(16);
        process_clip(&mut first, &mut buffers);
        process_clip(&mut second, &mut buffers);

        for j in 0..16 {
            let (left, right) = sample_pair(&track, j);
            assert_eq!(buffers.master()[j * 2], left as i32 * 3);
            assert_eq!(buffers.master()[j * 2 + 1], right as i32 * 3);
        }
    }

    #[test]
    fn test_saturation() {
        assert_eq!(saturate(40000), i16::MAX);
        assert_eq!(saturate(-40000), i16::MIN);
        assert_eq!(saturate(i32::MAX), i16::MAX);
        assert_eq!(saturate(i32::MIN), i16::MIN);
        assert_eq!(saturate(1234), 1234);
    }

    #[test]
    fn test_write_output_clamps_and_zero_fills() {
        let loud = crate::tracks::Track::from_samples(
            vec![30000, -30000, 30000, -30000],
            crate::tracks::TrackFormat::default(),
        );
        let mut buffers = MixBuffers::new(4);
        buffers.begin(2);
        for _ in 0..3 {
            let mut info = ClipInfo::new(&loud);
            process_clip(&mut info, &mut buffers);
        }

        let mut out = [1i16; 6];
        buffers.write_output(&mut out);
        assert_eq!(out, [i16::MAX, i16::MIN, i16::MAX, i16::MIN, 0, 0]);
    }
}
