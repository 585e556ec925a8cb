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
use std::error::Error;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use clap::{crate_version, Args, Parser, Subcommand};
use clipmix::util::{duration_minutes_seconds, filename_display, write_stereo_wav};
use clipmix::{audio, config, ClipInfo, Engine, Handle, Track, TrackStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// How often the play command checks whether every clip has finished.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A real-time clip mixer."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

/// Per-clip playback parameters.
#[derive(Args, Clone, Copy)]
struct ClipArgs {
    /// Playback speed. 2.0 plays an octave up.
    #[arg(short, long)]
    speed: Option<f32>,
    /// Gain applied to both channels.
    #[arg(short, long)]
    volume: Option<f32>,
    /// Stereo position from -1.0 (left) to 1.0 (right).
    #[arg(short, long, allow_hyphen_values = true)]
    pan: Option<f32>,
}

impl ClipArgs {
    fn clip(&self, track: &Track) -> ClipInfo {
        let mut info = ClipInfo::new(track);
        if let Some(volume) = self.volume {
            info = info.with_volume(volume);
        }
        if let Some(pan) = self.pan {
            info = info.with_pan(pan);
        }
        if let Some(speed) = self.speed {
            info = info.with_speed(speed);
        }
        info
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Plays one or more files through the configured audio device.
    Play {
        /// The path to the engine config.
        config_path: PathBuf,
        /// The files to play. They are started together and mixed.
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[command(flatten)]
        clip: ClipArgs,
        /// Play as fire-and-forget clips instead of through handles.
        #[arg(short, long)]
        dispatch: bool,
    },
    /// Mixes a file offline and writes the result to a wav file.
    Render {
        /// The file to render.
        file: PathBuf,
        /// Where to write the 16-bit stereo result.
        output: PathBuf,
        #[command(flatten)]
        clip: ClipArgs,
        /// Sample rate of the written file.
        #[arg(long, default_value_t = 44100)]
        sample_rate: u32,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Play {
            config_path,
            files,
            clip,
            dispatch,
        } => play(&config_path, &files, clip, dispatch)?,
        Commands::Render {
            file,
            output,
            clip,
            sample_rate,
        } => render(&file, &output, clip, sample_rate)?,
    }

    Ok(())
}

fn play(
    config_path: &Path,
    files: &[PathBuf],
    clip: ClipArgs,
    dispatch: bool,
) -> Result<(), Box<dyn Error>> {
    let config = config::load(config_path)?;
    let engine = Engine::from_config(&config)?;
    let device = audio::get_device(config.audio())?;
    let store = TrackStore::new(config.audio().sample_rate());

    let tracks: Vec<Track> = files.iter().map(|file| store.load(file)).collect();
    for (file, track) in files.iter().zip(&tracks) {
        println!(
            "- {} ({})",
            filename_display(file),
            duration_minutes_seconds(track.duration())
        );
    }

    let output = device.start(engine.scheduler())?;

    let mut handles: Vec<Handle> = Vec::new();
    for track in &tracks {
        if dispatch {
            if !engine.dispatch(clip.clip(track)) {
                warn!(id = track.id(), "Unable to dispatch clip");
            }
        } else {
            let handle = engine.play(clip.clip(track));
            if !handle.is_valid() {
                warn!(id = track.id(), "Unable to play clip");
            }
            handles.push(handle);
        }
    }

    while !engine.is_idle() {
        thread::sleep(IDLE_POLL_INTERVAL);
    }
    info!(device = %device, "All clips finished");

    drop(handles);
    output.stop();
    for track in &tracks {
        store.free(track);
    }
    Ok(())
}

fn render(
    file: &Path,
    output: &Path,
    clip: ClipArgs,
    sample_rate: u32,
) -> Result<(), Box<dyn Error>> {
    let store = TrackStore::new(sample_rate);
    let track = store.try_load(file)?;

    let engine = Engine::default();
    let info = clip.clip(&track);
    let speed = if info.flags().contains(clipmix::ClipFlags::FIXED_SPEED) {
        1.0
    } else {
        info.speed() as f64
    };
    if !(speed.is_finite() && speed > 0.0) {
        return Err(format!("invalid speed {}", speed).into());
    }
    let expected_frames = (info.len() as f64 / speed).ceil() as usize;

    let handle = engine.play(info);
    let mut scheduler = engine.scheduler();
    let mut period = vec![0i16; scheduler.period_frames() * 2];
    let mut mixed = Vec::with_capacity(expected_frames * 2 + period.len());
    while handle.is_playing() {
        scheduler.render(&mut period);
        mixed.extend_from_slice(&period);
    }
    mixed.truncate(expected_frames * 2);

    write_stereo_wav(output, &mixed, sample_rate)?;
    info!(
        file = filename_display(file),
        output = filename_display(output),
        frames = mixed.len() / 2,
        "Rendered clip"
    );
    store.free(&track);
    Ok(())
}
