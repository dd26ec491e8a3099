//! The chapter conversion loop: chunk, synthesize, transcode, concatenate.

use crate::audio::{AudioSettings, Ffmpeg};
use crate::book::Chapter;
use crate::text::normalizer::chapter_file_name;
use crate::text::{TextChunk, process_chapter};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tts_client::{ChunkBudget, TtsBackend};

/// Existing outputs at or below this size are treated as broken.
const MIN_VALID_OUTPUT_BYTES: u64 = 1024;

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub output_dir: PathBuf,
    /// Re-synthesize chapters whose MP3 already exists
    pub force: bool,
    pub budget: ChunkBudget,
    pub retries: u32,
    pub audio: AudioSettings,
    pub max_filename_length: usize,
}

/// What happened to each chapter of a run.
#[derive(Debug, Default)]
pub struct ConversionReport {
    pub converted: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    /// Chapters with nothing to synthesize
    pub empty: Vec<usize>,
    /// (chapter index, error message)
    pub failed: Vec<(usize, String)>,
    pub elapsed: Duration,
}

impl ConversionReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

enum ChapterOutcome {
    Converted,
    Empty,
}

pub struct Converter<'a> {
    backend: &'a dyn TtsBackend,
    ffmpeg: Ffmpeg,
    options: ConvertOptions,
}

impl<'a> Converter<'a> {
    pub fn new(backend: &'a dyn TtsBackend, ffmpeg: Ffmpeg, options: ConvertOptions) -> Self {
        Self {
            backend,
            ffmpeg,
            options,
        }
    }

    /// Path of the MP3 for a chapter.
    pub fn output_path(&self, chapter: &Chapter, total: usize) -> PathBuf {
        self.options.output_dir.join(chapter_file_name(
            chapter.index,
            total,
            &chapter.title,
            "mp3",
            self.options.max_filename_length,
        ))
    }

    /// Convert every chapter, continuing past failures.
    pub async fn convert_all(&self, chapters: &[Chapter]) -> Result<ConversionReport> {
        std::fs::create_dir_all(&self.options.output_dir).with_context(|| {
            format!("Failed to create output directory {}", self.options.output_dir.display())
        })?;

        let started = Instant::now();
        let total_chars: usize = chapters.iter().map(Chapter::char_count).sum();
        let pb = ProgressBar::new(total_chars as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} chars ({eta}) {msg}")?
                .progress_chars("#>-"),
        );

        let mut report = ConversionReport::default();
        let total = chapters.len();

        for chapter in chapters {
            let output = self.output_path(chapter, total);
            pb.set_message(format!("{}/{} {}", chapter.index, total, chapter.title));

            if !self.options.force && is_valid_output(&output) {
                log::info!("Skipping existing {}", output.display());
                pb.inc(chapter.char_count() as u64);
                report.skipped.push(output);
                continue;
            }

            match self.convert_chapter(chapter, &output, &pb).await {
                Ok(ChapterOutcome::Converted) => report.converted.push(output),
                Ok(ChapterOutcome::Empty) => {
                    log::warn!("Chapter {} has no text to synthesize", chapter.index);
                    report.empty.push(chapter.index);
                }
                Err(e) => {
                    log::error!("Chapter {} ({}) failed: {:#}", chapter.index, chapter.title, e);
                    report.failed.push((chapter.index, format!("{:#}", e)));
                }
            }

            pb.set_position(chapters_done_chars(chapters, chapter.index));
        }

        pb.finish_with_message("done");
        report.elapsed = started.elapsed();
        Ok(report)
    }

    async fn convert_chapter(&self, chapter: &Chapter, output: &Path, pb: &ProgressBar) -> Result<ChapterOutcome> {
        let chunks: Vec<TextChunk> = process_chapter(chapter.index, &chapter.text, self.options.budget)
            .into_iter()
            .filter(|chunk| {
                if !chunk.is_speakable() {
                    log::debug!("Chapter {}: skipping silent chunk {}", chapter.index, chunk.sequence_index);
                }
                chunk.is_speakable()
            })
            .collect();
        if chunks.is_empty() {
            return Ok(ChapterOutcome::Empty);
        }

        log::debug!(
            "Chapter {}: {} chunks for {}",
            chapter.index,
            chunks.len(),
            self.backend.name()
        );

        let temp_dir = TempDir::new()?;
        let mut parts = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            parts.push(self.render_chunk(chunk, temp_dir.path()).await?);
            pb.inc(chunk.char_len() as u64);
        }

        let assembled = temp_dir.path().join("chapter.mp3");
        self.ffmpeg
            .concatenate(&parts, &assembled)
            .await
            .with_context(|| format!("Failed to assemble {}", output.display()))?;
        move_into_place(&assembled, output)
            .await
            .with_context(|| format!("Failed to write {}", output.display()))?;

        Ok(ChapterOutcome::Converted)
    }

    /// Synthesize one chunk and encode it as MP3 in `work_dir`.
    async fn render_chunk(&self, chunk: &TextChunk, work_dir: &Path) -> Result<PathBuf> {
        let audio = self
            .backend
            .synthesize_with_retry(&chunk.text, self.options.retries)
            .await
            .with_context(|| format!("Synthesis failed for chunk {}", chunk.sequence_index))?;

        let raw = work_dir.join(format!(
            "raw_{:04}.{}",
            chunk.sequence_index,
            audio.format.extension()
        ));
        tokio::fs::write(&raw, &audio.bytes).await?;

        let mp3 = work_dir.join(format!("chunk_{:04}.mp3", chunk.sequence_index));
        self.ffmpeg
            .transcode_to_mp3(&raw, &mp3, &self.options.audio)
            .await?;

        Ok(mp3)
    }
}

/// Move a finished file to `dest` so a partial file never sits there.
///
/// Falls back to copy-then-rename when the two paths are on different
/// filesystems.
async fn move_into_place(src: &Path, dest: &Path) -> std::io::Result<()> {
    if tokio::fs::rename(src, dest).await.is_ok() {
        return Ok(());
    }

    let partial = dest.with_extension("mp3.part");
    tokio::fs::copy(src, &partial).await?;
    if let Err(e) = tokio::fs::rename(&partial, dest).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(e);
    }
    Ok(())
}

fn is_valid_output(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.len() > MIN_VALID_OUTPUT_BYTES)
        .unwrap_or(false)
}

/// Characters in chapters up to and including `index`.
fn chapters_done_chars(chapters: &[Chapter], index: usize) -> u64 {
    chapters
        .iter()
        .filter(|c| c.index <= index)
        .map(|c| c.char_count() as u64)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tts_client::MockEngine;

    fn chapter(index: usize, title: &str, text: &str) -> Chapter {
        Chapter {
            index,
            title: title.to_string(),
            text: text.to_string(),
        }
    }

    fn options(dir: &Path, force: bool) -> ConvertOptions {
        ConvertOptions {
            output_dir: dir.to_path_buf(),
            force,
            budget: ChunkBudget::new(40),
            retries: 1,
            audio: AudioSettings::default(),
            max_filename_length: 120,
        }
    }

    fn ffmpeg() -> Ffmpeg {
        Ffmpeg::new(Duration::from_secs(5)).with_program("/nonexistent/ffmpeg")
    }

    #[test]
    fn test_output_path() {
        let temp = TempDir::new().unwrap();
        let engine = MockEngine::always_succeeds(ChunkBudget::new(40));
        let converter = Converter::new(&engine, ffmpeg(), options(temp.path(), false));
        let path = converter.output_path(&chapter(3, "The Storm?", "text"), 12);
        assert_eq!(path, temp.path().join("03 - The Storm-.mp3"));
    }

    #[tokio::test]
    async fn test_existing_output_is_skipped() {
        let temp = TempDir::new().unwrap();
        let engine = MockEngine::always_succeeds(ChunkBudget::new(40));
        let converter = Converter::new(&engine, ffmpeg(), options(temp.path(), false));
        let chapters = vec![chapter(1, "One", "Some text to speak.")];

        std::fs::write(temp.path().join("01 - One.mp3"), vec![0u8; 2048]).unwrap();

        let report = converter.convert_all(&chapters).await.unwrap();
        assert_eq!(report.skipped.len(), 1);
        assert!(report.converted.is_empty());
        assert_eq!(engine.call_count(), 0);
    }

    #[tokio::test]
    async fn test_tiny_existing_output_is_redone() {
        let temp = TempDir::new().unwrap();
        let engine = MockEngine::always_fails("offline", ChunkBudget::new(40));
        let converter = Converter::new(&engine, ffmpeg(), options(temp.path(), false));
        let chapters = vec![chapter(1, "One", "Some text to speak.")];

        std::fs::write(temp.path().join("01 - One.mp3"), vec![0u8; 100]).unwrap();

        let report = converter.convert_all(&chapters).await.unwrap();
        assert!(report.skipped.is_empty());
        assert_eq!(engine.call_count(), 1);
    }

    #[tokio::test]
    async fn test_force_ignores_existing_output() {
        let temp = TempDir::new().unwrap();
        let engine = MockEngine::always_fails("offline", ChunkBudget::new(40));
        let converter = Converter::new(&engine, ffmpeg(), options(temp.path(), true));
        let chapters = vec![chapter(1, "One", "Some text to speak.")];

        std::fs::write(temp.path().join("01 - One.mp3"), vec![0u8; 2048]).unwrap();

        let report = converter.convert_all(&chapters).await.unwrap();
        assert!(report.skipped.is_empty());
        assert_eq!(report.failed.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_chapter_does_not_stop_run() {
        let temp = TempDir::new().unwrap();
        let engine = MockEngine::always_fails("model crashed", ChunkBudget::new(40));
        let converter = Converter::new(&engine, ffmpeg(), options(temp.path(), false));
        let chapters = vec![
            chapter(1, "One", "First chapter text."),
            chapter(2, "Two", "   "),
            chapter(3, "Three", "Third chapter text."),
        ];

        let report = converter.convert_all(&chapters).await.unwrap();
        let failed: Vec<usize> = report.failed.iter().map(|(i, _)| *i).collect();
        assert_eq!(failed, vec![1, 3]);
        assert_eq!(report.empty, vec![2]);
        assert!(report.failed[0].1.contains("model crashed"));
        assert!(!report.is_complete());
        assert_eq!(engine.received(), vec!["First chapter text.", "Third chapter text."]);
    }

    #[tokio::test]
    async fn test_first_chunk_stops_at_sentence_boundary() {
        let temp = TempDir::new().unwrap();
        let engine = MockEngine::always_succeeds(ChunkBudget::new(40));
        let converter = Converter::new(&engine, ffmpeg(), options(temp.path(), false));
        let text = "First sentence is here. Second sentence follows. ... ... Third after a pause.";

        // Transcoding fails on the missing ffmpeg binary after the first chunk
        let report = converter.convert_all(&[chapter(1, "One", text)]).await.unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(engine.received(), vec!["First sentence is here."]);
    }

    #[tokio::test]
    async fn test_pause_only_chapter_is_empty() {
        let temp = TempDir::new().unwrap();
        let engine = MockEngine::always_succeeds(ChunkBudget::new(40));
        let converter = Converter::new(&engine, ffmpeg(), options(temp.path(), false));

        let report = converter
            .convert_all(&[chapter(1, "Interlude", "... ... ... ...")])
            .await
            .unwrap();
        assert_eq!(report.empty, vec![1]);
        assert!(report.failed.is_empty());
        assert_eq!(engine.call_count(), 0);
    }

    /// Stand-in for ffmpeg: transcoding copies the input, concatenation
    /// writes 4 KiB to its output and exits with `concat_status`.
    #[cfg(unix)]
    fn fake_ffmpeg(dir: &Path, concat_status: i32) -> Ffmpeg {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("ffmpeg");
        let body = format!(
            "#!/bin/sh\nfor last; do :; done\nif [ \"$2\" = \"-f\" ]; then\n  head -c 4096 /dev/zero > \"$last\"\n  exit {}\nfi\ncp \"$3\" \"$last\"\n",
            concat_status
        );
        std::fs::write(&script, body).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        Ffmpeg::new(Duration::from_secs(5)).with_program(script)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_assembly_leaves_no_output() {
        let bin = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let engine = MockEngine::always_succeeds(ChunkBudget::new(40));
        let converter = Converter::new(&engine, fake_ffmpeg(bin.path(), 1), options(out.path(), false));
        let text = "First sentence is here. Second sentence follows.";

        let report = converter.convert_all(&[chapter(1, "One", text)]).await.unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(engine.call_count(), 2);
        assert!(!out.path().join("01 - One.mp3").exists());
        assert!(!out.path().join("01 - One.mp3.part").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_assembled_chapter_lands_in_output_dir() {
        let bin = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let engine = MockEngine::always_succeeds(ChunkBudget::new(40));
        let converter = Converter::new(&engine, fake_ffmpeg(bin.path(), 0), options(out.path(), false));
        let text = "First sentence is here. Second sentence follows.";

        let report = converter.convert_all(&[chapter(1, "One", text)]).await.unwrap();
        let output = out.path().join("01 - One.mp3");
        assert_eq!(report.converted, vec![output.clone()]);
        assert!(is_valid_output(&output));
    }

    #[tokio::test]
    async fn test_move_into_place() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("chapter.mp3");
        let dest = temp.path().join("01 - One.mp3");
        std::fs::write(&src, b"audio").unwrap();

        move_into_place(&src, &dest).await.unwrap();
        assert!(!src.exists());
        assert_eq!(std::fs::read(&dest).unwrap(), b"audio");
    }

    #[test]
    fn test_chapters_done_chars() {
        let chapters = vec![chapter(1, "a", "12345"), chapter(2, "b", "123")];
        assert_eq!(chapters_done_chars(&chapters, 1), 5);
        assert_eq!(chapters_done_chars(&chapters, 2), 8);
    }
}
