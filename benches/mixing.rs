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
use clipmix::{ClipInfo, Engine, Handle, Track, TrackFormat, TrackStore};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

const PERIOD_FRAMES: usize = 4096;

fn generate_test_track(store: &TrackStore, duration_seconds: f32) -> Track {
    let sample_rate = 44100;
    let frames = (duration_seconds * sample_rate as f32) as usize;
    let mut samples = Vec::with_capacity(frames * 2);

    for i in 0..frames {
        let t = i as f32 / sample_rate as f32;
        let left = 0.3 * (2.0 * std::f32::consts::PI * 440.0 * t).sin();
        let right = 0.3 * (2.0 * std::f32::consts::PI * 660.0 * t).sin();
        samples.push((left * i16::MAX as f32) as i16);
        samples.push((right * i16::MAX as f32) as i16);
    }

    store.insert(samples, TrackFormat::default())
}

fn unity(track: &Track) -> ClipInfo {
    ClipInfo::new(track)
}

fn gain(track: &Track) -> ClipInfo {
    ClipInfo::new(track).with_volume(0.5)
}

fn panned(track: &Track) -> ClipInfo {
    ClipInfo::new(track).with_volume(0.8).with_pan(-0.3)
}

fn pitched(track: &Track) -> ClipInfo {
    ClipInfo::new(track).with_speed(1.5)
}

/// Starts `count` clips and returns their handles so they can be rewound between iterations.
fn start_clips(
    engine: &Engine,
    track: &Track,
    count: usize,
    build: fn(&Track) -> ClipInfo,
) -> Vec<Handle> {
    (0..count).map(|_| engine.play(build(track))).collect()
}

fn rewind(handles: &[Handle]) {
    for handle in handles {
        handle.set_progress(0);
        handle.play();
    }
}

fn benchmark_clip_paths(c: &mut Criterion) {
    let mut group = c.benchmark_group("clip_paths");
    let store = TrackStore::new(44100);
    let track = generate_test_track(&store, 10.0);

    let cases: [(&str, fn(&Track) -> ClipInfo); 4] = [
        ("unity", unity),
        ("gain", gain),
        ("panned", panned),
        ("pitched", pitched),
    ];

    for (name, build) in cases {
        let engine = Engine::new(16, 16, PERIOD_FRAMES).unwrap();
        let handles = start_clips(&engine, &track, 8, build);
        let mut scheduler = engine.scheduler();
        let mut out = vec![0i16; PERIOD_FRAMES * 2];

        group.bench_function(name, |b| {
            b.iter(|| {
                rewind(&handles);
                scheduler.render(black_box(&mut out));
                black_box(out[0])
            })
        });
    }

    group.finish();
}

fn benchmark_clip_counts(c: &mut Criterion) {
    let mut group = c.benchmark_group("clip_counts");
    let store = TrackStore::new(44100);
    let track = generate_test_track(&store, 10.0);

    for count in [1, 16, 64, 128] {
        let engine = Engine::new(128, 128, PERIOD_FRAMES).unwrap();
        let handles = start_clips(&engine, &track, count, gain);
        let mut scheduler = engine.scheduler();
        let mut out = vec![0i16; PERIOD_FRAMES * 2];

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                rewind(&handles);
                scheduler.render(black_box(&mut out));
                black_box(out[0])
            })
        });
    }

    group.finish();
}

fn benchmark_dispatch(c: &mut Criterion) {
    let store = TrackStore::new(44100);
    let track = generate_test_track(&store, 0.05);
    let engine = Engine::new(1, 128, 256).unwrap();
    let mut scheduler = engine.scheduler();
    let mut out = vec![0i16; 256 * 2];

    c.bench_function("dispatch_and_drain", |b| {
        b.iter(|| {
            for _ in 0..32 {
                engine.dispatch(ClipInfo::new(&track));
            }
            while !engine.is_idle() {
                scheduler.render(&mut out);
            }
        })
    });
}

criterion_group!(
    benches,
    benchmark_clip_paths,
    benchmark_clip_counts,
    benchmark_dispatch
);
criterion_main!(benches);
