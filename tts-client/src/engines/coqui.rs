//! Coqui TTS engine
//!
//! Runs the `tts` CLI shipped with Coqui TTS. The same engine serves plain
//! single-speaker models and XTTS voice cloning; cloning models only accept
//! short inputs, which is reflected in their [`ChunkBudget`].

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;

use super::{ChunkBudget, locate_cli, run_to_file};
use crate::backend::{AudioFormat, SynthesizedAudio, TtsBackend};
use crate::config::EngineConfig;
use crate::error::{Result, TtsError};

const DEFAULT_MODEL: &str = "tts_models/pt/cv/vits";
const DEFAULT_CLONING_MODEL: &str = "tts_models/multilingual/multi-dataset/xtts_v2";
/// Built-in XTTS v2 speaker used when no reference voice is configured
const DEFAULT_CLONING_SPEAKER: &str = "Ana Florence";
const CLONING_LANGUAGE: &str = "pt";

pub struct CoquiEngine {
    model: String,
    voice: Option<String>,
    cloning: bool,
    cli_path: PathBuf,
    budget: ChunkBudget,
    timeout: Duration,
}

impl CoquiEngine {
    pub fn new(config: &EngineConfig, budget: ChunkBudget, cloning: bool) -> Result<Self> {
        let cli_path = locate_cli(config.cli_path.as_ref(), "tts", "Coqui TTS")?;
        let default_model = if cloning {
            DEFAULT_CLONING_MODEL
        } else {
            DEFAULT_MODEL
        };

        let engine = Self {
            model: config
                .model
                .clone()
                .unwrap_or_else(|| default_model.to_string()),
            voice: config.voice.clone(),
            cloning,
            cli_path,
            budget,
            timeout: config.timeout(),
        };
        engine.is_available()?;
        Ok(engine)
    }

    /// Speaker arguments for cloning models: a reference wav or a named speaker
    fn speaker_args(&self) -> Vec<String> {
        if !self.cloning {
            return Vec::new();
        }

        let mut args = vec!["--language_idx".to_string(), CLONING_LANGUAGE.to_string()];
        match self.voice.as_deref() {
            Some(voice) if voice.ends_with(".wav") => {
                args.push("--speaker_wav".to_string());
                args.push(voice.to_string());
            }
            Some(name) => {
                args.push("--speaker_idx".to_string());
                args.push(name.to_string());
            }
            None => {
                args.push("--speaker_idx".to_string());
                args.push(DEFAULT_CLONING_SPEAKER.to_string());
            }
        }
        args
    }
}

#[async_trait]
impl TtsBackend for CoquiEngine {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio> {
        let temp_dir = tempfile::TempDir::new()?;
        let output_path = temp_dir.path().join("chunk.wav");

        let mut cmd = Command::new(&self.cli_path);
        cmd.args(["--text", text])
            .args(["--model_name", &self.model])
            .args(self.speaker_args())
            .arg("--out_path")
            .arg(&output_path);

        let bytes = run_to_file(cmd, None, &output_path, self.name(), self.timeout).await?;

        Ok(SynthesizedAudio {
            bytes,
            format: AudioFormat::Wav,
        })
    }

    fn name(&self) -> &'static str {
        if self.cloning { "XTTS" } else { "Coqui TTS" }
    }

    fn budget(&self) -> ChunkBudget {
        self.budget
    }

    fn is_available(&self) -> Result<()> {
        if let Some(voice) = self.voice.as_deref() {
            if self.cloning && voice.ends_with(".wav") && !PathBuf::from(voice).exists() {
                return Err(TtsError::EngineUnavailable(format!(
                    "Reference voice not found: {}",
                    voice
                )));
            }
        }
        Ok(())
    }
}
