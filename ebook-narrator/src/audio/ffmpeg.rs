//! Thin wrappers over the `ffmpeg` command line.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;

/// Encoding parameters for chapter MP3s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSettings {
    /// e.g. "32k"
    pub bitrate: String,
    pub sample_rate: u32,
    pub channels: u8,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            bitrate: "32k".to_string(),
            sample_rate: 22050,
            channels: 1,
        }
    }
}

/// An `ffmpeg` executable with a per-invocation timeout.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    program: PathBuf,
    timeout: Duration,
}

impl Ffmpeg {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            timeout,
        }
    }

    /// Use a specific binary instead of the one on `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Check if FFmpeg can be run.
    pub async fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Encode any audio file to MP3 with the given settings.
    pub async fn transcode_to_mp3(&self, input: &Path, output: &Path, settings: &AudioSettings) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-y", "-i"])
            .arg(input)
            .args(transcode_args(settings))
            .arg(output);

        self.run(cmd, "transcode").await
    }

    /// Concatenate same-format audio files, in order, into one file.
    ///
    /// Uses FFmpeg's concat demuxer, so no re-encoding takes place.
    pub async fn concatenate(&self, inputs: &[PathBuf], output: &Path) -> Result<()> {
        if inputs.is_empty() {
            anyhow::bail!("No audio files provided");
        }

        if inputs.len() == 1 {
            tokio::fs::copy(&inputs[0], output)
                .await
                .with_context(|| format!("Failed to copy {}", inputs[0].display()))?;
            return Ok(());
        }

        let temp_dir = TempDir::new()?;
        let list_file = temp_dir.path().join("concat_list.txt");
        tokio::fs::write(&list_file, concat_list(inputs)).await?;

        let mut cmd = Command::new(&self.program);
        cmd.args(["-y", "-f", "concat", "-safe", "0", "-i"])
            .arg(&list_file)
            .args(["-c", "copy", "-loglevel", "error"])
            .arg(output);

        self.run(cmd, "concat").await
    }

    async fn run(&self, mut cmd: Command, what: &str) -> Result<()> {
        cmd.stdin(Stdio::null()).kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .with_context(|| format!("ffmpeg {} timed out after {}s", what, self.timeout.as_secs()))?
            .with_context(|| format!("Failed to run ffmpeg {}", what))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("ffmpeg {} failed: {}", what, stderr.trim());
        }

        Ok(())
    }
}

fn transcode_args(settings: &AudioSettings) -> Vec<String> {
    vec![
        "-ar".to_string(),
        settings.sample_rate.to_string(),
        "-ac".to_string(),
        settings.channels.to_string(),
        "-b:a".to_string(),
        settings.bitrate.clone(),
        "-loglevel".to_string(),
        "error".to_string(),
    ]
}

/// Input list for the concat demuxer.
fn concat_list(inputs: &[PathBuf]) -> String {
    let mut list = String::new();
    for path in inputs {
        // Escape single quotes in path
        let path_str = path.to_string_lossy().replace('\'', "'\\''");
        list.push_str(&format!("file '{}'\n", path_str));
    }
    list
}
