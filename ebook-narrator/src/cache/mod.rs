//! On-disk chapter cache: one directory per book holding a metadata record
//! and one text blob per chapter.

mod persistence;
mod types;

pub use persistence::CacheManager;
pub use types::SourceFingerprint;
