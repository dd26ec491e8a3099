use async_trait::async_trait;
use std::time::Duration;

use crate::engines::ChunkBudget;
use crate::error::{Result, TtsError};

/// Container format of the bytes an engine returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Mp3,
}

impl AudioFormat {
    /// File extension used when the audio is written to disk
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
        }
    }
}

/// Raw audio produced for one chunk of text
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
}

/// Trait for TTS engines
#[async_trait]
pub trait TtsBackend: Send + Sync {
    /// Synthesize a single chunk of text into raw audio bytes.
    ///
    /// Callers are expected to keep `text` within [`TtsBackend::budget`].
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio>;

    /// Get the engine name for display
    fn name(&self) -> &'static str;

    /// Chunk size limits this engine accepts
    fn budget(&self) -> ChunkBudget;

    /// Check if the engine is available (CLI installed, model present, etc.)
    fn is_available(&self) -> Result<()>;

    /// Synthesize with retries and exponential backoff (1s, 2s, 4s, ...).
    async fn synthesize_with_retry(&self, text: &str, max_retries: u32) -> Result<SynthesizedAudio> {
        let attempts = max_retries.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            match self.synthesize(text).await {
                Ok(audio) if audio.bytes.is_empty() => {
                    last_error = Some(TtsError::EmptyAudio(self.name().to_string()));
                }
                Ok(audio) => return Ok(audio),
                Err(e) => {
                    log::warn!(
                        "{}: attempt {}/{} failed: {}",
                        self.name(),
                        attempt + 1,
                        attempts,
                        e
                    );
                    last_error = Some(e);
                }
            }

            if attempt + 1 < attempts {
                tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
            }
        }

        Err(last_error.unwrap_or_else(|| TtsError::EmptyAudio(self.name().to_string())))
    }
}
