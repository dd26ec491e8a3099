//! narrate - Convert EPUB and PDF ebooks into per-chapter MP3 audiobooks

mod audio;
mod book;
mod cache;
mod config;
mod convert;
mod error;
mod extract;
mod text;

use anyhow::{Context, Result};
use audio::Ffmpeg;
use book::{Book, format_duration, load_book};
use cache::{CacheManager, SourceFingerprint};
use clap::{Parser, Subcommand};
use config::NarratorConfig;
use convert::{ConvertOptions, Converter};
use std::path::{Path, PathBuf};
use std::time::Duration;
use text::normalizer::sanitize_filename;
use tts_client::{ChunkBudget, EngineKind, TtsConfig, create_backend};

#[derive(Parser, Debug)]
#[command(name = "narrate")]
#[command(about = "Convert EPUB and PDF ebooks into per-chapter MP3 audiobooks", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the EPUB or PDF file
    file: Option<PathBuf>,

    /// TTS engine to use (edge, piper, coqui, xtts)
    #[arg(short, long)]
    engine: Option<String>,

    /// Voice for the selected engine
    #[arg(long)]
    voice: Option<String>,

    /// Model for the selected engine
    #[arg(long)]
    model: Option<String>,

    /// Ignore the text cache and re-synthesize existing chapters
    #[arg(long)]
    force: bool,

    /// Directory for chapter MP3s (default: <book title>/)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Directory for cached chapter text
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, default_value_t = false)]
    debug: bool,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract a book and print its chapters without synthesizing anything
    Inspect {
        /// Path to the EPUB or PDF file
        file: PathBuf,
    },
    /// Manage cached chapter text
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// List cached books
    List,
    /// Remove one cached book
    Clear {
        /// Cache entry name, as shown by `cache list`
        title: String,
    },
    /// Remove cache entries older than a number of days
    Cleanup {
        /// Age in days
        days: i64,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Set the default TTS engine
    SetEngine {
        /// Engine identifier (edge, piper, coqui, xtts)
        engine: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let config = NarratorConfig::load().context("Failed to load configuration")?;
    let cache_dir = args.cache_dir.clone().unwrap_or_else(|| config.cache_dir.clone());
    let cache = CacheManager::new(cache_dir).with_max_filename_length(config.max_filename_length);

    // Handle subcommands
    match &args.command {
        Some(Commands::Inspect { file }) => {
            return handle_inspect(file, &args, &config, &cache);
        }
        Some(Commands::Cache { action }) => {
            return handle_cache_command(action, &cache);
        }
        Some(Commands::Config { action }) => {
            return handle_config_command(action);
        }
        None => {}
    }

    let path = args
        .file
        .clone()
        .ok_or_else(|| anyhow::anyhow!("Ebook file path is required. Run 'narrate --help' for usage."))?;

    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }

    // Resolve the engine before any extraction work
    let mut tts_config = TtsConfig::load().context("Failed to load TTS configuration")?;
    let kind = resolve_engine(args.engine.as_deref(), &tts_config)?;
    apply_engine_overrides(&mut tts_config, kind, args.voice.clone(), args.model.clone());

    let backend = create_backend(kind, &tts_config)
        .with_context(|| format!("Failed to set up {} engine", kind.as_str()))?;
    backend.is_available()?;

    let mut ffmpeg = Ffmpeg::new(Duration::from_secs(config.ffmpeg_timeout_secs));
    if let Some(program) = &config.ffmpeg_path {
        ffmpeg = ffmpeg.with_program(program);
    }
    if !ffmpeg.is_available().await {
        anyhow::bail!("ffmpeg not found in PATH. Install ffmpeg to build chapter MP3s.");
    }

    let book = load_or_extract(&path, &config, &cache, args.force)?;

    eprintln!(
        "Book: \"{}\" by {}",
        book.title,
        book.author.as_deref().unwrap_or("Unknown")
    );
    eprintln!(
        "Chapters: {}, Characters: {}, Words: ~{}",
        book.total_chapter_count(),
        book.total_char_count(),
        book.total_words()
    );
    eprintln!(
        "Estimated narration: {}",
        format_duration((book.estimated_minutes() * 60.0) as u64)
    );

    let output_dir = output_dir_for(&book, &args, &config);
    eprintln!("Engine: {}", backend.name());
    eprintln!("Output: {}", output_dir.display());

    let options = ConvertOptions {
        output_dir,
        force: args.force,
        budget: backend.budget(),
        retries: config.synthesis_retries,
        audio: config.audio_settings(),
        max_filename_length: config.max_filename_length,
    };

    let converter = Converter::new(backend.as_ref(), ffmpeg, options);
    let report = converter.convert_all(&book.chapters).await?;

    eprintln!();
    eprintln!(
        "Converted: {}, Skipped: {}, Empty: {}, Failed: {}",
        report.converted.len(),
        report.skipped.len(),
        report.empty.len(),
        report.failed.len()
    );
    for (index, message) in &report.failed {
        eprintln!("  Chapter {}: {}", index, message);
    }
    eprintln!("Elapsed: {}", format_duration(report.elapsed.as_secs()));
    if !report.is_complete() {
        log::warn!("Some chapters failed; run again to retry them");
    }

    Ok(())
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

/// Cache entries are keyed by the source file name, extension included, so
/// they can be found before the book is opened.
fn cache_key(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Untitled".to_string())
}

/// Load chapters from the cache, or extract them and refresh the cache.
fn load_or_extract(path: &Path, config: &NarratorConfig, cache: &CacheManager, force: bool) -> Result<Book> {
    let key = cache_key(path);
    let source = match SourceFingerprint::of(path) {
        Ok(fingerprint) => Some(fingerprint),
        Err(e) => {
            log::debug!("Cannot stat {}: {}", path.display(), e);
            None
        }
    };

    if !force {
        if let Some(dir) = cache.find(&key) {
            match cache.load_book(&dir, source.as_ref()) {
                Ok(book) => {
                    log::info!("Loaded {} chapters from cache {}", book.chapters.len(), dir.display());
                    return Ok(book);
                }
                Err(e) => {
                    log::warn!("Cache for \"{}\" is unusable ({}), re-extracting", key, e);
                    cache.delete(&key)?;
                }
            }
        } else {
            log::debug!("No cache entry for \"{}\"", key);
        }
    }

    eprintln!("Extracting: {}", path.display());
    let book = load_book(path, config.patterns()?)
        .with_context(|| format!("Failed to extract {}", path.display()))?;

    cache.save(&key, &book, source).context("Failed to write text cache")?;
    Ok(book)
}

fn resolve_engine(requested: Option<&str>, tts_config: &TtsConfig) -> Result<EngineKind> {
    let name = requested.unwrap_or(&tts_config.default_engine);
    Ok(EngineKind::from_str(name)?)
}

/// Fold `--voice` and `--model` into the engine's config section.
fn apply_engine_overrides(
    tts_config: &mut TtsConfig,
    kind: EngineKind,
    voice: Option<String>,
    model: Option<String>,
) {
    if voice.is_none() && model.is_none() {
        return;
    }

    let section = tts_config.engines.entry(kind.as_str().to_string()).or_default();
    if voice.is_some() {
        section.voice = voice;
    }
    if model.is_some() {
        section.model = model;
    }
}

fn output_dir_for(book: &Book, args: &Args, config: &NarratorConfig) -> PathBuf {
    let base = args
        .output_dir
        .clone()
        .or_else(|| config.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    base.join(sanitize_filename(&book.title, config.max_filename_length))
}

fn handle_inspect(file: &Path, args: &Args, config: &NarratorConfig, cache: &CacheManager) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File not found: {}", file.display());
    }

    let tts_config = TtsConfig::load().context("Failed to load TTS configuration")?;
    let kind = resolve_engine(args.engine.as_deref(), &tts_config)?;
    let budget = tts_config.budget_for(kind);

    let book = load_or_extract(file, config, cache, args.force)?;

    println!("Title: {}", book.title);
    println!("Author: {}", book.author.as_deref().unwrap_or("Unknown"));
    println!(
        "Engine: {} (chunks up to {} chars{})",
        kind.as_str(),
        budget.max_chars,
        if budget.sentence_first { ", sentence-first" } else { "" }
    );
    println!();

    let width = text::normalizer::zero_pad(book.chapters.len(), book.chapters.len()).len();
    for chapter in &book.chapters {
        let chunks = chunk_count(&chapter.text, budget);
        println!(
            "{:>width$}. {} ({} chars, {} chunks, ~{})",
            chapter.index,
            chapter.title,
            chapter.char_count(),
            chunks,
            format_duration((book::estimate_minutes(chapter.char_count()) * 60.0) as u64),
            width = width
        );
    }

    println!();
    println!(
        "Total: {} chapters, {} chars, ~{}",
        book.total_chapter_count(),
        book.total_char_count(),
        format_duration((book.estimated_minutes() * 60.0) as u64)
    );
    Ok(())
}

fn chunk_count(text: &str, budget: ChunkBudget) -> usize {
    text::chunk_text(text, budget).len()
}

fn handle_cache_command(action: &CacheAction, cache: &CacheManager) -> Result<()> {
    match action {
        CacheAction::List => {
            let entries = cache.list()?;
            if entries.is_empty() {
                println!("No cached books in {}", cache.base_dir().display());
                return Ok(());
            }
            for entry in entries {
                let name = entry
                    .dir
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                println!(
                    "{} [{}]: {} chapters, {} chars, {:.2} MB, cached {}",
                    entry.title,
                    name,
                    entry.chapters,
                    entry.chars,
                    entry.size_mb,
                    entry.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        CacheAction::Clear { title } => {
            if cache.delete(title)? {
                println!("Removed cache for \"{}\"", title);
            } else {
                println!("No cache found for \"{}\"", title);
            }
        }
        CacheAction::Cleanup { days } => {
            let removed = cache.cleanup_older_than(*days)?;
            println!("Removed {} cache entries older than {} days", removed, days);
        }
    }
    Ok(())
}

fn handle_config_command(action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = NarratorConfig::load()?;
            let tts_config = TtsConfig::load()?;
            println!("Configuration file: {:?}", NarratorConfig::config_path()?);
            println!();
            println!("cache_dir = \"{}\"", config.cache_dir.display());
            match &config.output_dir {
                Some(dir) => println!("output_dir = \"{}\"", dir.display()),
                None => println!("output_dir = (book title in current directory)"),
            }
            println!("bitrate = \"{}\"", config.bitrate);
            println!("sample_rate = {}", config.sample_rate);
            println!("channels = {}", config.channels);
            println!("max_filename_length = {}", config.max_filename_length);
            println!("ffmpeg_timeout_secs = {}", config.ffmpeg_timeout_secs);
            match &config.ffmpeg_path {
                Some(path) => println!("ffmpeg_path = \"{}\"", path.display()),
                None => println!("ffmpeg_path = (ffmpeg in PATH)"),
            }
            println!("synthesis_retries = {}", config.synthesis_retries);
            let patterns = config.patterns()?;
            println!(
                "chapter_patterns = {} ({})",
                patterns.chapter.len(),
                if config.chapter_patterns.is_some() { "custom" } else { "built-in" }
            );
            println!(
                "subtitle_patterns = {} ({})",
                patterns.subtitle.len(),
                if config.subtitle_patterns.is_some() { "custom" } else { "built-in" }
            );
            println!();
            println!("TTS configuration file: {:?}", TtsConfig::config_path()?);
            println!("default_engine = \"{}\"", tts_config.default_engine);
            for kind in EngineKind::all() {
                let budget = tts_config.budget_for(kind);
                let voice = tts_config
                    .engine_config(kind.as_str())
                    .and_then(|s| s.voice.as_deref())
                    .unwrap_or("(default)");
                println!(
                    "  {}: voice = {}, max_chars = {}",
                    kind.as_str(),
                    voice,
                    budget.max_chars
                );
            }
        }
        ConfigAction::SetEngine { engine } => {
            let kind = EngineKind::from_str(engine)?;
            let mut tts_config = TtsConfig::load()?;
            tts_config.default_engine = kind.as_str().to_string();
            tts_config.save()?;
            println!("Default engine set to: {}", kind.as_str());
        }
    }
    Ok(())
}
