use std::path::PathBuf;

use crate::config::{parse_scale, parse_volume, Options};
use crate::logging::LogLevel;
use anyhow::{Context, Result};
use clap::Parser;

/// flicplay - play FLI/FLC animations with synchronized audio
#[derive(Parser, Debug, Default)]
#[command(name = "flicplay")]
#[command(version)]
#[command(about = "Play FLI/FLC animations", long_about = None)]
pub struct Cli {
    /// Animation file to play
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Config file (key = value lines)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Volume (0-100)
    #[arg(long, value_name = "VOLUME")]
    pub volume: Option<String>,

    /// Log level (0-6 or nothing, user, error, warning, info, debug, all)
    #[arg(long = "loglevel", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Log file path
    #[arg(short, long, value_name = "FILE")]
    pub logfile: Option<PathBuf>,

    /// Write every presented frame as PNG into this directory
    #[arg(long = "dump-frames", value_name = "DIR")]
    pub dump_frames: Option<PathBuf>,

    /// Do not present the last frame
    #[arg(long = "suppress-final-frame")]
    pub suppress_final_frame: bool,

    /// Run without a window or audio device
    #[arg(long)]
    pub headless: bool,

    /// Window scale factor (1-8)
    #[arg(short, long, value_name = "N")]
    pub scale: Option<String>,

    /// Pacing poll interval in milliseconds
    #[arg(long = "poll-interval", value_name = "MS")]
    pub poll_interval: Option<u64>,

    /// Audio buffer length in milliseconds
    #[arg(long = "audio-buffer", value_name = "MS")]
    pub audio_buffer: Option<u32>,
}

impl Cli {
    /// Merge CLI arguments into the options struct
    pub fn merge_into_options(&self, mut opts: Options) -> Result<Options> {
        if let Some(ref vol) = self.volume {
            let int_vol: i32 = vol.parse().context("Invalid volume")?;
            opts.volume = parse_volume(int_vol);
        }

        if let Some(ref level) = self.log_level {
            opts.log_level = Self::parse_log_level(level)?;
        }

        if let Some(ref log_file) = self.logfile {
            opts.log_file = Some(log_file.clone());
        }

        if let Some(ref dir) = self.dump_frames {
            opts.dump_dir = Some(dir.clone());
        }

        if self.suppress_final_frame {
            opts.suppress_final_frame = true;
        }

        if self.headless {
            opts.headless = true;
        }

        if let Some(ref scale) = self.scale {
            opts.scale = parse_scale(scale)?;
        }

        if let Some(ms) = self.poll_interval {
            if ms == 0 {
                anyhow::bail!("Poll interval must be at least 1 ms");
            }
            opts.poll_interval_ms = ms;
        }

        if let Some(ms) = self.audio_buffer {
            opts.audio_buffer_ms = ms;
        }

        Ok(opts)
    }

    fn parse_log_level(s: &str) -> Result<LogLevel> {
        if let Ok(n) = s.parse::<i32>() {
            if !(0..=6).contains(&n) {
                anyhow::bail!("Log level must be between 0 and 6");
            }
            return Ok(LogLevel::from_i32(n));
        }
        match s.to_lowercase().as_str() {
            "nothing" | "off" => Ok(LogLevel::Nothing),
            "user" => Ok(LogLevel::User),
            "error" => Ok(LogLevel::Error),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "all" => Ok(LogLevel::All),
            _ => anyhow::bail!(
                "Invalid log level: {}. Valid options: nothing, user, error, warning, info, debug, all",
                s
            ),
        }
    }
}
