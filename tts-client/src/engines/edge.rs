//! Edge TTS engine
//!
//! Uses the `edge-tts` CLI as a subprocess. Audio comes back as MP3.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;

use super::{ChunkBudget, locate_cli, run_to_file};
use crate::backend::{AudioFormat, SynthesizedAudio, TtsBackend};
use crate::config::EngineConfig;
use crate::error::Result;

const DEFAULT_VOICE: &str = "pt-BR-FranciscaNeural";

/// Engine backed by Microsoft Edge's online voices
pub struct EdgeEngine {
    voice: String,
    cli_path: PathBuf,
    budget: ChunkBudget,
    timeout: Duration,
}

impl EdgeEngine {
    /// Create a new Edge engine
    ///
    /// Returns an error if the `edge-tts` CLI is not found.
    pub fn new(config: &EngineConfig, budget: ChunkBudget) -> Result<Self> {
        let cli_path = locate_cli(config.cli_path.as_ref(), "edge-tts", "Edge TTS")?;

        Ok(Self {
            voice: config
                .voice
                .clone()
                .unwrap_or_else(|| DEFAULT_VOICE.to_string()),
            cli_path,
            budget,
            timeout: config.timeout(),
        })
    }
}

#[async_trait]
impl TtsBackend for EdgeEngine {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio> {
        let temp_dir = tempfile::TempDir::new()?;
        let output_path = temp_dir.path().join("chunk.mp3");

        let mut cmd = Command::new(&self.cli_path);
        cmd.args(["--voice", &self.voice])
            .args(["--text", text])
            .arg("--write-media")
            .arg(&output_path);

        let bytes = run_to_file(cmd, None, &output_path, self.name(), self.timeout).await?;

        Ok(SynthesizedAudio {
            bytes,
            format: AudioFormat::Mp3,
        })
    }

    fn name(&self) -> &'static str {
        "Edge TTS"
    }

    fn budget(&self) -> ChunkBudget {
        self.budget
    }

    fn is_available(&self) -> Result<()> {
        // Availability was checked in constructor
        Ok(())
    }
}
