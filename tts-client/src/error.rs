use thiserror::Error;

#[derive(Error, Debug)]
pub enum TtsError {
    #[error("Unknown engine: {0}. Supported engines: edge, piper, coqui, xtts")]
    UnknownEngine(String),

    #[error("Engine not available: {0}")]
    EngineUnavailable(String),

    #[error("Synthesis failed ({engine}): {message}")]
    Synthesis { engine: String, message: String },

    #[error("Engine {0} produced no audio")]
    EmptyAudio(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, TtsError>;
