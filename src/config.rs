use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::logging::LogLevel;
use crate::video::player::PlayerConfig;

/// Player options that can be set via CLI or config file
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    // Commandline-only options
    pub log_file: Option<PathBuf>,
    pub dump_dir: Option<PathBuf>,

    // Commandline and config file options
    pub log_level: LogLevel,
    pub volume: f32,
    pub suppress_final_frame: bool,
    pub poll_interval_ms: u64,
    pub audio_buffer_ms: u32,
    pub headless: bool,
    pub scale: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            log_file: None,
            dump_dir: None,
            log_level: LogLevel::default(),
            volume: 1.0,
            suppress_final_frame: false,
            poll_interval_ms: 20,
            audio_buffer_ms: 250,
            headless: false,
            scale: 2,
        }
    }
}

impl Options {
    /// Session tunables derived from these options.
    pub fn player_config(&self) -> PlayerConfig {
        PlayerConfig {
            volume: self.volume,
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            audio_buffer_ms: self.audio_buffer_ms,
        }
    }

    /// Applies one `key = value` entry.
    fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        match key.to_ascii_lowercase().as_str() {
            "volume" => self.volume = parse_volume(parse_int(key, value)?),
            "loglevel" => self.log_level = LogLevel::from_i32(parse_int(key, value)?),
            "suppressfinalframe" => self.suppress_final_frame = parse_bool(value)?,
            "pollinterval" => {
                self.poll_interval_ms = value
                    .parse()
                    .with_context(|| format!("Invalid value for {}: {}", key, value))?
            }
            "audiobuffer" => {
                self.audio_buffer_ms = value
                    .parse()
                    .with_context(|| format!("Invalid value for {}: {}", key, value))?
            }
            "headless" => self.headless = parse_bool(value)?,
            "scale" => self.scale = parse_scale(value)?,
            _ => log::warn!("Unknown config key '{}' ignored", key),
        }
        Ok(())
    }
}

/// Load options from a `key = value` config file.
///
/// A missing file yields the defaults. `#` starts a comment.
pub fn load_config(path: Option<&Path>) -> Result<Options> {
    let mut options = Options::default();
    let Some(path) = path else {
        return Ok(options);
    };

    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::debug!("no config file at {}", path.display());
            return Ok(options);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };

    for (n, line) in data.lines().enumerate() {
        let line = match line.find('#') {
            Some(at) => &line[..at],
            None => line,
        }
        .trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            log::warn!("{}:{}: key without value", path.display(), n + 1);
            continue;
        };
        options
            .apply(key.trim(), value.trim())
            .with_context(|| format!("{}:{}", path.display(), n + 1))?;
    }

    Ok(options)
}

fn parse_int(key: &str, value: &str) -> Result<i32> {
    value
        .parse()
        .with_context(|| format!("Invalid value for {}: {}", key, value))
}

/// Parse a boolean option value
pub fn parse_bool(s: &str) -> Result<bool> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("Invalid boolean value: {}", s),
    }
}

/// Parse a volume value (0-100) to a float (0.0-1.0)
pub fn parse_volume(vol: i32) -> f32 {
    if vol < 0 {
        return 0.0;
    }
    if vol > 100 {
        return 1.0;
    }
    vol as f32 / 100.0
}

/// Parse a window scale factor (1-8)
pub fn parse_scale(s: &str) -> Result<u32> {
    let scale: u32 = s.parse().context("Invalid scale value")?;
    if !(1..=8).contains(&scale) {
        anyhow::bail!("Scale must be between 1 and 8");
    }
    Ok(scale)
}
