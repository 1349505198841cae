use crate::parse::ParseError;
pub use thiserror::Error;

/// Results from running a video process.
pub type VideoResult<T> = std::result::Result<T, VideoProcError>;
/// Results from parsing video info while processing it.
pub type InfoResult<T> = std::result::Result<T, ParseError>;

#[derive(Error, Debug)]
pub enum VideoProcError {
    #[error("couldn't start {program}, do you have it in PATH?")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("video IO failed with {msg}")]
    IO {
        msg: String,
        #[source]
        source: std::io::Error,
    },
    #[error("video process didn't announce its streams ({reason}): {last_line}")]
    Start { reason: String, last_line: String },
    #[error("couldn't obtain {0}")]
    MissingValue(String),
    #[error("video process exit code {code}: {last_line}")]
    ExitCode { code: i32, last_line: String },
    #[error("other error: {0}")]
    Other(String),
}

impl VideoProcError {
    pub(crate) fn is_missing(msg: impl ToString) -> Self {
        Self::MissingValue(msg.to_string())
    }
    pub(crate) fn explain_io(msg: impl ToString, e: std::io::Error) -> Self {
        Self::IO { msg: msg.to_string(), source: e }
    }
    pub(crate) fn spawning(program: impl AsRef<std::ffi::OsStr>, e: std::io::Error) -> Self {
        Self::Spawn { program: program.as_ref().to_string_lossy().into_owned(), source: e }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem;

    #[allow(dead_code)]
    // This will fail to compile if the size of this type is large.
    const ASSERT_SMALLISH: usize = [0][(mem::size_of::<VideoProcError>() >= 200) as usize];

    #[test]
    fn send_sync_stability() {
        fn assert_send_sync<T: Send + Sync>() {}

        assert_send_sync::<VideoProcError>();
    }

    #[test]
    fn spawn_error_names_program() {
        let e = VideoProcError::spawning(
            "ffmpeg-missing",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert_eq!(e.to_string(), "couldn't start ffmpeg-missing, do you have it in PATH?");
    }
}
