//! TTS engine implementations

mod coqui;
mod edge;
pub mod mock;
mod piper;

pub use coqui::CoquiEngine;
pub use edge::EdgeEngine;
pub use mock::MockEngine;
pub use piper::PiperEngine;

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::backend::TtsBackend;
use crate::config::TtsConfig;
use crate::error::{Result, TtsError};

/// Character budget for a cloud streaming engine
pub const EDGE_MAX_CHARS: usize = 8000;
/// Character budget for local engines
pub const LOCAL_MAX_CHARS: usize = 1500;
/// Character budget for voice-cloning models, whose input length is capped sharply
pub const CLONING_MAX_CHARS: usize = 180;

/// Default limit on one engine invocation, in seconds
pub const DEFAULT_SYNTHESIS_TIMEOUT_SECS: u64 = 300;

/// How large the chunks handed to an engine may be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkBudget {
    /// Maximum characters per chunk
    pub max_chars: usize,
    /// Split straight into sentences, skipping pause and paragraph grouping
    pub sentence_first: bool,
}

impl ChunkBudget {
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
            sentence_first: false,
        }
    }

    pub fn sentence_first(mut self) -> Self {
        self.sentence_first = true;
        self
    }
}

/// Supported engine types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Edge,
    Piper,
    Coqui,
    Xtts,
}

impl EngineKind {
    /// Parse engine kind from string
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "edge" | "edge-tts" | "edge_tts" => Ok(Self::Edge),
            "piper" => Ok(Self::Piper),
            "coqui" => Ok(Self::Coqui),
            "xtts" | "coqui-xtts" | "xtts_v2" => Ok(Self::Xtts),
            _ => Err(TtsError::UnknownEngine(s.to_string())),
        }
    }

    /// Identifier used in config files
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Edge => "edge",
            Self::Piper => "piper",
            Self::Coqui => "coqui",
            Self::Xtts => "xtts",
        }
    }

    /// Built-in chunk budget for this engine
    pub fn budget(&self) -> ChunkBudget {
        match self {
            Self::Edge => ChunkBudget::new(EDGE_MAX_CHARS),
            Self::Piper | Self::Coqui => ChunkBudget::new(LOCAL_MAX_CHARS),
            Self::Xtts => ChunkBudget::new(CLONING_MAX_CHARS).sentence_first(),
        }
    }

    pub fn all() -> [EngineKind; 4] {
        [Self::Edge, Self::Piper, Self::Coqui, Self::Xtts]
    }
}

/// Create an engine instance from its kind and the loaded configuration
pub fn create_backend(kind: EngineKind, config: &TtsConfig) -> Result<Box<dyn TtsBackend>> {
    let section = config.engine_config(kind.as_str()).cloned().unwrap_or_default();
    let budget = config.budget_for(kind);

    match kind {
        EngineKind::Edge => Ok(Box::new(EdgeEngine::new(&section, budget)?)),
        EngineKind::Piper => Ok(Box::new(PiperEngine::new(&section, budget)?)),
        EngineKind::Coqui => Ok(Box::new(CoquiEngine::new(&section, budget, false)?)),
        EngineKind::Xtts => Ok(Box::new(CoquiEngine::new(&section, budget, true)?)),
    }
}

/// Resolve a CLI binary from an explicit path or from PATH
fn locate_cli(explicit: Option<&PathBuf>, binary: &str, engine: &str) -> Result<PathBuf> {
    match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(TtsError::EngineUnavailable(format!(
                    "{} CLI not found at specified path: {}",
                    engine,
                    path.display()
                )));
            }
            Ok(path.clone())
        }
        None => which::which(binary).map_err(|_| {
            TtsError::EngineUnavailable(format!("{} CLI '{}' not found in PATH", engine, binary))
        }),
    }
}

/// Run an engine command, optionally feeding `stdin`, and read back the file it wrote
///
/// The process is killed if it outlives `timeout`.
async fn run_to_file(
    mut cmd: Command,
    stdin: Option<&str>,
    output_path: &Path,
    engine: &str,
    timeout: Duration,
) -> Result<Vec<u8>> {
    cmd.stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if stdin.is_some() {
        cmd.stdin(Stdio::piped());
    }

    let mut child = cmd.spawn().map_err(|e| TtsError::Synthesis {
        engine: engine.to_string(),
        message: format!("Failed to execute: {}", e),
    })?;

    let run = async {
        if let Some(input) = stdin {
            if let Some(mut pipe) = child.stdin.take() {
                pipe.write_all(input.as_bytes()).await?;
                // stdin closes when `pipe` drops
            }
        }
        Ok::<_, std::io::Error>(child.wait_with_output().await?)
    };

    let output = tokio::time::timeout(timeout, run)
        .await
        .map_err(|_| TtsError::Synthesis {
            engine: engine.to_string(),
            message: format!("Timed out after {}s", timeout.as_secs_f32()),
        })??;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(TtsError::Synthesis {
            engine: engine.to_string(),
            message: format!("Command failed: {}", stderr.trim()),
        });
    }

    let bytes = tokio::fs::read(output_path).await.map_err(|e| TtsError::Synthesis {
        engine: engine.to_string(),
        message: format!("No output file written: {}", e),
    })?;

    if bytes.is_empty() {
        return Err(TtsError::EmptyAudio(engine.to_string()));
    }

    Ok(bytes)
}
