//! Shared text-to-speech client library for the ebook-narrator workspace
//!
//! Provides a unified interface over interchangeable TTS engines:
//! - Edge TTS (cloud streaming, via the `edge-tts` CLI)
//! - Piper (local ONNX voices)
//! - Coqui TTS (local models)
//! - XTTS (Coqui voice cloning, small input budget)
//!
//! Each engine declares a [`ChunkBudget`] so callers can size text chunks
//! before handing them to [`TtsBackend::synthesize`].

pub mod backend;
pub mod config;
pub mod engines;
pub mod error;

pub use backend::{AudioFormat, SynthesizedAudio, TtsBackend};
pub use config::{EngineConfig, TtsConfig};
pub use engines::{ChunkBudget, EngineKind, MockEngine, create_backend};
pub use error::{Result, TtsError};
