//! narrate configuration management.

use crate::audio::AudioSettings;
use crate::extract::ExtractionPatterns;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const DEFAULT_BITRATE: &str = "32k";
const DEFAULT_SAMPLE_RATE: u32 = 22050;
const DEFAULT_CHANNELS: u8 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarratorConfig {
    /// Directory holding cached chapter text, one subdirectory per book
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Where chapter MP3s go. None means a directory named after the book
    /// in the current directory.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// MP3 bitrate passed to ffmpeg
    #[serde(default = "default_bitrate")]
    pub bitrate: String,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_channels")]
    pub channels: u8,

    /// Longest title, in characters, used in file and directory names
    #[serde(default = "default_max_filename_length")]
    pub max_filename_length: usize,

    /// Seconds before a single ffmpeg call is abandoned
    #[serde(default = "default_ffmpeg_timeout_secs")]
    pub ffmpeg_timeout_secs: u64,

    /// ffmpeg binary to run instead of the one on PATH
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ffmpeg_path: Option<PathBuf>,

    /// Attempts per chunk before a chapter is given up
    #[serde(default = "default_synthesis_retries")]
    pub synthesis_retries: u32,

    /// Replacement chapter heading patterns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_patterns: Option<Vec<String>>,

    /// Replacement subtitle patterns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle_patterns: Option<Vec<String>>,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".cache")
}

fn default_bitrate() -> String {
    DEFAULT_BITRATE.to_string()
}

fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}

fn default_channels() -> u8 {
    DEFAULT_CHANNELS
}

fn default_max_filename_length() -> usize {
    120
}

fn default_ffmpeg_timeout_secs() -> u64 {
    120
}

fn default_synthesis_retries() -> u32 {
    3
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            output_dir: None,
            bitrate: default_bitrate(),
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            max_filename_length: default_max_filename_length(),
            ffmpeg_timeout_secs: default_ffmpeg_timeout_secs(),
            ffmpeg_path: None,
            synthesis_retries: default_synthesis_retries(),
            chapter_patterns: None,
            subtitle_patterns: None,
        }
    }
}

impl NarratorConfig {
    /// Get the config file path: ~/.config/cli-programs/narrator.toml
    pub fn config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("cli-programs")
            .join("narrator.toml"))
    }

    /// Load config from file, returning default if file doesn't exist
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let config: NarratorConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    pub fn audio_settings(&self) -> AudioSettings {
        AudioSettings {
            bitrate: self.bitrate.clone(),
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }

    /// Pattern tables with any configured overrides applied.
    pub fn patterns(&self) -> Result<ExtractionPatterns> {
        Ok(ExtractionPatterns::with_overrides(
            self.chapter_patterns.as_deref(),
            self.subtitle_patterns.as_deref(),
        )?)
    }
}
