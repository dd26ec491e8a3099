use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::engines::{ChunkBudget, DEFAULT_SYNTHESIS_TIMEOUT_SECS, EngineKind};
use crate::error::{Result, TtsError};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    /// Engine used when none is given on the command line
    #[serde(default = "default_engine")]
    pub default_engine: String,

    /// Engine-specific configuration (engine identifier -> settings)
    #[serde(default)]
    pub engines: HashMap<String, EngineConfig>,
}

fn default_engine() -> String {
    "edge".to_string()
}

/// Engine-specific configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Voice identifier (edge voice name, XTTS speaker name or reference wav)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    /// Model identifier (coqui model name) or path (piper .onnx file)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Path to the engine's CLI binary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cli_path: Option<PathBuf>,

    /// Override of the engine's maximum characters per chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_chars: Option<usize>,

    /// Override of whether chunking starts at sentence level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentence_first: Option<bool>,

    /// Seconds one synthesis call may run before it is killed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl EngineConfig {
    /// Time limit for a single engine invocation
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_SYNTHESIS_TIMEOUT_SECS).max(1))
    }

    /// Apply this section's overrides to an engine's built-in budget
    pub fn apply_to(&self, budget: ChunkBudget) -> ChunkBudget {
        ChunkBudget {
            max_chars: self.max_chars.unwrap_or(budget.max_chars).max(1),
            sentence_first: self.sentence_first.unwrap_or(budget.sentence_first),
        }
    }
}

impl TtsConfig {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: TtsConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME").map_err(|_| TtsError::Config("HOME not set".into()))?;
        Ok(PathBuf::from(home).join(".config/cli-programs/tts.toml"))
    }

    /// Get engine config by engine identifier
    pub fn engine_config(&self, engine: &str) -> Option<&EngineConfig> {
        self.engines.get(engine)
    }

    /// Resolve the chunk budget for an engine, honoring config overrides
    pub fn budget_for(&self, kind: EngineKind) -> ChunkBudget {
        match self.engine_config(kind.as_str()) {
            Some(section) => section.apply_to(kind.budget()),
            None => kind.budget(),
        }
    }
}

impl Default for TtsConfig {
    fn default() -> Self {
        let mut engines = HashMap::new();

        engines.insert(
            "edge".to_string(),
            EngineConfig {
                voice: Some("pt-BR-FranciscaNeural".to_string()),
                ..Default::default()
            },
        );
        engines.insert(
            "piper".to_string(),
            EngineConfig {
                model: Some("./models/pt_BR-faber-medium.onnx".to_string()),
                ..Default::default()
            },
        );

        Self {
            default_engine: default_engine(),
            engines,
        }
    }
}
