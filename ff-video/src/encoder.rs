use std::{
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use tempfile::{NamedTempFile, TempPath};
use tracing::{info, warn};

use crate::{
    error::{VideoProcError, VideoResult},
    info::spawn_info_thread,
    parse::{Stream, StreamInfo},
};

/// Synthetic source of libavfilter's virtual input device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LavfiSource {
    pub filter: String,
    pub width: u32,
    pub height: u32,
    pub rate: u32,
    pub duration: u32,
}

impl LavfiSource {
    /// Filter graph description, e.g. `testsrc=duration=5:size=640x360:rate=24`
    pub fn graph(&self) -> String {
        let LavfiSource { filter, width, height, rate, duration } = self;
        format!("{filter}=duration={duration}:size={width}x{height}:rate={rate}")
    }
}

/// Outcome of a finished encoding
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeReport {
    pub output: PathBuf,
    /// Output stream as announced by the encoder
    pub stream: Option<Stream>,
    /// Frames written according to the final progress update
    pub frames: Option<u64>,
}

/// Assembles an ffmpeg invocation that overwrites its output, which always comes last
pub struct FFMpegEncoderBuilder {
    cmd: Command,
    output: Option<PathBuf>,
}

impl Default for FFMpegEncoderBuilder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

/// Quote arguments for pasting into a POSIX shell
fn shell_quote(arg: &OsStr) -> String {
    let arg = arg.to_string_lossy();
    let plain = |c: char| c.is_ascii_alphanumeric() || "-_./:,+@%".contains(c);
    if !arg.is_empty() && arg.chars().all(plain) {
        arg.into_owned()
    } else {
        format!("\"{}\"", arg.replace('\\', "\\\\").replace('"', "\\\"").replace('$', "\\$"))
    }
}

impl FFMpegEncoderBuilder {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        let mut cmd = Command::new(program);
        cmd.arg("-y");
        Self { cmd, output: None }
    }

    /// Read from a synthetic source instead of a file
    pub fn lavfi(mut self, source: &LavfiSource) -> Self {
        self.cmd.args(["-f", "lavfi", "-i"]).arg(source.graph());
        self
    }

    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.cmd.args(args);
        self
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    pub fn program(&self) -> &OsStr {
        self.cmd.get_program()
    }

    /// Arguments after the program, in order
    pub fn args(&self) -> Vec<OsString> {
        self.all_args().map(OsStr::to_os_string).collect()
    }

    fn all_args(&self) -> impl Iterator<Item = &OsStr> {
        self.cmd.get_args().chain(self.output.as_deref().map(Path::as_os_str))
    }

    /// Invocation as it would be typed into a shell
    pub fn command_line(&self) -> String {
        std::iter::once(self.program())
            .chain(self.all_args())
            .map(shell_quote)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run to completion
    ///
    /// Fails on a missing program or a non-zero exit. ffmpeg writes into a staging file next
    /// to the output, which replaces the output only after a successful exit. A failed run
    /// leaves an earlier output untouched.
    pub fn run(self) -> VideoResult<EncodeReport> {
        let output =
            self.output.clone().ok_or_else(|| VideoProcError::is_missing("output path"))?;
        info!("{}", self.command_line());
        let staging = staging_path(&output)?;

        let mut cmd = self.cmd;
        cmd.arg(&*staging);
        cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::piped());
        let mut child =
            cmd.spawn().map_err(|e| VideoProcError::spawning(cmd.get_program(), e))?;
        let stderr =
            child.stderr.take().ok_or_else(|| VideoProcError::is_missing("stderr pipe"))?;
        let (stream_info_rx, info_thread) = spawn_info_thread(stderr, "Encoder")?;

        // drain until the process hangs up stderr
        let mut stream = None;
        for msg in stream_info_rx {
            if let Ok(StreamInfo::Output { stream: s, .. }) = msg {
                stream = Some(s);
            }
        }

        let status = child
            .wait()
            .map_err(|e| VideoProcError::explain_io("waiting on video process", e))?;
        let summary = info_thread
            .join()
            .map_err(|_| VideoProcError::Other("error joining meta data thread".to_string()))?;

        match status.code() {
            Some(0) => {
                staging.persist(&output).map_err(|e| {
                    let msg = format!("couldn't move video to {:?}", output);
                    VideoProcError::explain_io(msg, e.error)
                })?;
                let frames = summary.last_frame.map(|f| f.frame);
                Ok(EncodeReport { output, stream, frames })
            }
            Some(code) => {
                warn!("discarding incomplete {:?}", output);
                Err(VideoProcError::ExitCode { code, last_line: summary.last_line })
            }
            None => {
                warn!("discarding incomplete {:?}", output);
                Err(VideoProcError::Other("video child process killed by signal".to_string()))
            }
        }
    }
}

/// Hidden file in the output's directory, with the output's extension so ffmpeg picks the
/// same muxer. It is removed when dropped unless persisted.
fn staging_path(output: &Path) -> VideoResult<TempPath> {
    let dir = output.parent().filter(|d| !d.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let mut suffix = OsString::new();
    if let Some(ext) = output.extension() {
        suffix.push(".");
        suffix.push(ext);
    }
    tempfile::Builder::new()
        .prefix(".encoding-")
        .suffix(&suffix)
        .tempfile_in(dir)
        .map(NamedTempFile::into_temp_path)
        .map_err(|e| VideoProcError::explain_io(format!("couldn't create a file in {:?}", dir), e))
}
