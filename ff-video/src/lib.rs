mod decoder;
mod encoder;
mod error;
mod info;
mod parse;

use std::{env, path::PathBuf};

pub use crate::error::{InfoResult, VideoProcError, VideoResult};
pub use decoder::{FFMpegDecoder, FFMpegDecoderBuilder};
pub use encoder::{EncodeReport, FFMpegEncoderBuilder, LavfiSource};
pub use image::RgbImage;
pub use parse::{FrameUpdate, InfoParser, ParseError, Stream, StreamInfo, VideoInfo};

/// Locate an executable like a shell would, paths with a directory are taken as they are.
pub fn find_program(program: impl Into<PathBuf>) -> Option<PathBuf> {
    let program = program.into();
    if program.components().count() > 1 {
        return program.is_file().then_some(program);
    }
    let path_var = env::var_os("PATH")?;
    env::split_paths(&path_var).find_map(|dir| {
        let full = dir.join(&program);
        if full.is_file() {
            return Some(full);
        }
        #[cfg(windows)]
        {
            let exe = full.with_extension("exe");
            if exe.is_file() {
                return Some(exe);
            }
        }
        None
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_program_is_not_found() {
        assert_eq!(find_program("surely-not-an-installed-program-4711"), None);
    }

    #[test]
    fn explicit_path_is_checked() {
        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("tool");
        assert_eq!(find_program(&tool), None);
        std::fs::write(&tool, b"").unwrap();
        assert_eq!(find_program(&tool), Some(tool));
    }
}
