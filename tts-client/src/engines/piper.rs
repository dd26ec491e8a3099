//! Piper engine
//!
//! Runs the `piper` CLI with a local `.onnx` voice. Text is fed on stdin and
//! the engine writes a WAV file.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;

use super::{ChunkBudget, locate_cli, run_to_file};
use crate::backend::{AudioFormat, SynthesizedAudio, TtsBackend};
use crate::config::EngineConfig;
use crate::error::{Result, TtsError};

const DEFAULT_MODEL: &str = "./models/pt_BR-faber-medium.onnx";

pub struct PiperEngine {
    model_path: PathBuf,
    cli_path: PathBuf,
    budget: ChunkBudget,
    timeout: Duration,
}

impl PiperEngine {
    pub fn new(config: &EngineConfig, budget: ChunkBudget) -> Result<Self> {
        let cli_path = locate_cli(config.cli_path.as_ref(), "piper", "Piper")?;
        let model_path = PathBuf::from(config.model.as_deref().unwrap_or(DEFAULT_MODEL));

        let engine = Self {
            model_path,
            cli_path,
            budget,
            timeout: config.timeout(),
        };
        engine.is_available()?;
        Ok(engine)
    }
}

#[async_trait]
impl TtsBackend for PiperEngine {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio> {
        let temp_dir = tempfile::TempDir::new()?;
        let output_path = temp_dir.path().join("chunk.wav");

        let mut cmd = Command::new(&self.cli_path);
        cmd.arg("--model")
            .arg(&self.model_path)
            .arg("--output_file")
            .arg(&output_path);

        let bytes = run_to_file(cmd, Some(text), &output_path, self.name(), self.timeout).await?;

        Ok(SynthesizedAudio {
            bytes,
            format: AudioFormat::Wav,
        })
    }

    fn name(&self) -> &'static str {
        "Piper"
    }

    fn budget(&self) -> ChunkBudget {
        self.budget
    }

    fn is_available(&self) -> Result<()> {
        if !self.model_path.exists() {
            return Err(TtsError::EngineUnavailable(format!(
                "Piper model not found: {}",
                self.model_path.display()
            )));
        }
        Ok(())
    }
}
