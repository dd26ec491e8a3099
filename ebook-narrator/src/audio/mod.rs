//! Audio transcoding and chapter assembly using FFmpeg.

pub mod ffmpeg;

pub use ffmpeg::{AudioSettings, Ffmpeg};
