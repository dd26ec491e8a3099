//! Mock TTS engine for testing
//!
//! Provides a configurable engine that can simulate failures, retries and
//! successful syntheses, and records every text it was asked to speak.

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::ChunkBudget;
use crate::backend::{AudioFormat, SynthesizedAudio, TtsBackend};
use crate::error::{Result, TtsError};

/// A mock engine for testing chunk routing and retry behavior
pub struct MockEngine {
    /// Number of times to fail before succeeding (0 = always succeed)
    fail_count: AtomicUsize,
    /// Current call count
    call_count: AtomicUsize,
    /// Message of the synthesis error returned on failure
    fail_message: Option<String>,
    /// Texts received, in call order
    received: Mutex<Vec<String>>,
    budget: ChunkBudget,
}

impl MockEngine {
    /// Create an engine that always succeeds
    pub fn always_succeeds(budget: ChunkBudget) -> Self {
        Self {
            fail_count: AtomicUsize::new(0),
            call_count: AtomicUsize::new(0),
            fail_message: None,
            received: Mutex::new(Vec::new()),
            budget,
        }
    }

    /// Create an engine that fails `n` times with the given message, then succeeds
    pub fn fails_then_succeeds(n: usize, message: &str, budget: ChunkBudget) -> Self {
        Self {
            fail_count: AtomicUsize::new(n),
            fail_message: Some(message.to_string()),
            ..Self::always_succeeds(budget)
        }
    }

    /// Create an engine that always fails with the given message
    pub fn always_fails(message: &str, budget: ChunkBudget) -> Self {
        Self::fails_then_succeeds(usize::MAX, message, budget)
    }

    /// Get the number of times synthesize() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Texts passed to synthesize(), in call order
    pub fn received(&self) -> Vec<String> {
        self.received.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TtsBackend for MockEngine {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio> {
        let call_num = self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut received) = self.received.lock() {
            received.push(text.to_string());
        }

        if call_num < self.fail_count.load(Ordering::SeqCst) {
            if let Some(message) = &self.fail_message {
                return Err(TtsError::Synthesis {
                    engine: self.name().to_string(),
                    message: message.clone(),
                });
            }
        }

        // One byte per character keeps audio length proportional to the text
        Ok(SynthesizedAudio {
            bytes: text.bytes().collect(),
            format: AudioFormat::Wav,
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }

    fn budget(&self) -> ChunkBudget {
        self.budget
    }

    fn is_available(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_always_succeeds() {
        let engine = MockEngine::always_succeeds(ChunkBudget::new(100));

        let result = engine.synthesize("hello").await;
        assert!(result.is_ok());
        assert_eq!(result.unwrap().bytes, b"hello".to_vec());
        assert_eq!(engine.call_count(), 1);
        assert_eq!(engine.received(), vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn test_always_fails() {
        let engine = MockEngine::always_fails("model crashed", ChunkBudget::new(100));

        for _ in 0..3 {
            let result = engine.synthesize("text").await;
            assert!(matches!(result, Err(TtsError::Synthesis { .. })));
        }
        assert_eq!(engine.call_count(), 3);
    }

    #[tokio::test]
    async fn test_retry_recovers_after_failure() {
        let engine = MockEngine::fails_then_succeeds(1, "timeout", ChunkBudget::new(100));

        let result = engine.synthesize_with_retry("again", 3).await;
        assert!(result.is_ok());
        assert_eq!(engine.call_count(), 2);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let engine = MockEngine::always_fails("offline", ChunkBudget::new(100));

        let result = engine.synthesize_with_retry("never", 1).await;
        assert!(result.is_err());
        assert_eq!(engine.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_text_counts_as_empty_audio() {
        let engine = MockEngine::always_succeeds(ChunkBudget::new(100));

        let result = engine.synthesize_with_retry("", 1).await;
        assert!(matches!(result, Err(TtsError::EmptyAudio(_))));
    }
}
