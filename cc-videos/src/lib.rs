//! Synthetic test videos with the properties of three Creative Commons films.
//!
//! Each asset is rendered by ffmpeg from one of its built-in test patterns, so the fixtures
//! can be regenerated anywhere instead of being downloaded.

pub mod catalog;
mod error;
mod generate;
mod verify;

use std::path::{Path, PathBuf};

pub use catalog::{AssetRecord, Attribution, Clip, CodecParams, Pattern, Resolution, CATALOG};
pub use error::{summarize, GenError, GenResult};
pub use generate::Generator;
pub use verify::{Mismatch, Verifier};

/// Directory the fixtures are generated into by default
pub fn media_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir.parent().unwrap_or(manifest_dir).join("tests").join("test_data").join("cc_videos")
}

/// Path of a fixture by asset key or file name
pub fn fixture(name: &str) -> GenResult<PathBuf> {
    Ok(catalog::lookup(name)?.output_path(media_root()))
}

pub fn bbb_video() -> PathBuf {
    catalog::BBB.output_path(media_root())
}

pub fn sintel_video() -> PathBuf {
    catalog::SINTEL.output_path(media_root())
}

pub fn tos_video() -> PathBuf {
    catalog::TOS.output_path(media_root())
}
