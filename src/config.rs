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
use std::path::Path;

use config::{Config, File, FileFormat};
use serde::Deserialize;

mod audio;
mod error;
mod mixer;

pub use audio::Audio;
pub use error::ConfigError;
pub use mixer::Mixer;

/// A YAML representation of the engine configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct Engine {
    /// The output device and stream format.
    audio: Audio,

    /// Registry sizes. Defaults are used when omitted.
    mixer: Option<Mixer>,
}

impl Engine {
    /// New will create a new Engine configuration.
    pub fn new(audio: Audio, mixer: Option<Mixer>) -> Engine {
        Engine { audio, mixer }
    }

    /// Returns the audio configuration.
    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    /// Returns the mixer configuration, or the defaults if none was given.
    pub fn mixer(&self) -> Mixer {
        self.mixer.clone().unwrap_or_default()
    }

    /// Checks that every size fits what the engine can allocate.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mixer = self.mixer();
        let max_rate = u32::MAX as usize;
        let max_slots = u16::MAX as usize;
        check_range("audio.sample_rate", self.audio.sample_rate() as usize, 1, max_rate)?;
        check_range("audio.period_frames", self.audio.period_frames(), 1, MAX_PERIOD_FRAMES)?;
        check_range("mixer.clip_capacity", mixer.clip_capacity(), 1, max_slots)?;
        check_range("mixer.dispatch_capacity", mixer.dispatch_capacity(), 1, max_slots)?;
        Ok(())
    }
}

/// Largest period accepted from a config file.
const MAX_PERIOD_FRAMES: usize = 1 << 16;

fn check_range(
    field: &'static str,
    value: usize,
    min: usize,
    max: usize,
) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::Invalid {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// Loads and validates the engine configuration from a YAML file.
pub fn load(path: &Path) -> Result<Engine, ConfigError> {
    let engine: Engine = Config::builder()
        .add_source(File::from(path).format(FileFormat::Yaml))
        .build()?
        .try_deserialize()?;
    engine.validate()?;
    Ok(engine)
}

/// Parses and validates the engine configuration from a YAML string.
pub fn parse(yaml: &str) -> Result<Engine, ConfigError> {
    let engine: Engine = Config::builder()
        .add_source(File::from_str(yaml, FileFormat::Yaml))
        .build()?
        .try_deserialize()?;
    engine.validate()?;
    Ok(engine)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_parse_full() {
        let yaml = r#"
            audio:
              device: mock-device
              sample_rate: 48000
              period_frames: 512
            mixer:
              clip_capacity: 32
              dispatch_capacity: 64
        "#;

        let engine = parse(yaml).unwrap();
        assert_eq!(engine.audio().device(), "mock-device");
        assert_eq!(engine.audio().sample_rate(), 48000);
        assert_eq!(engine.audio().period_frames(), 512);
        assert_eq!(engine.mixer().clip_capacity(), 32);
        assert_eq!(engine.mixer().dispatch_capacity(), 64);
    }

    #[test]
    fn test_parse_defaults() {
        let yaml = r#"
            audio:
              device: mock-device
        "#;

        let engine = parse(yaml).unwrap();
        assert_eq!(engine.audio().sample_rate(), 44100);
        assert_eq!(engine.audio().period_frames(), 4096);
        assert_eq!(engine.mixer().clip_capacity(), 128);
        assert_eq!(engine.mixer().dispatch_capacity(), 128);
    }

    #[test]
    fn test_parse_missing_device() {
        let yaml = r#"
            mixer:
              clip_capacity: 4
        "#;

        assert!(matches!(parse(yaml), Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_parse_rejects_bad_sizes() {
        let yaml = r#"
            audio:
              device: mock-device
              period_frames: 0
        "#;
        assert!(matches!(
            parse(yaml),
            Err(ConfigError::Invalid {
                field: "audio.period_frames",
                value: 0,
                ..
            })
        ));

        let yaml = r#"
            audio:
              device: mock-device
            mixer:
              clip_capacity: 70000
        "#;
        assert!(matches!(
            parse(yaml),
            Err(ConfigError::Invalid {
                field: "mixer.clip_capacity",
                ..
            })
        ));
    }

    #[test]
    fn test_load_file() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("clipmix.yaml");
        fs::write(&path, "audio:\n  device: mock\n  period_frames: 256\n").unwrap();

        let engine = load(&path).unwrap();
        assert_eq!(engine.audio().device(), "mock");
        assert_eq!(engine.audio().period_frames(), 256);

        assert!(load(&tempdir.path().join("missing.yaml")).is_err());
    }
}
