use std::{
    ffi::OsStr,
    io::{ErrorKind, Read},
    process::{Child, ChildStdout, Command, Stdio},
    sync::mpsc::{Receiver, RecvTimeoutError},
    thread::JoinHandle,
    time::Duration,
};

use image::RgbImage;
use tracing::debug;

use crate::{
    error::{InfoResult, VideoProcError, VideoResult},
    info::{spawn_info_thread, InfoSummary},
    parse::{Stream, StreamInfo},
};

pub struct FFMpegDecoderBuilder {
    cmd: Command,
}

/// Decodes a video into RGB frames, one at a time
pub struct FFMpegDecoder {
    child: Child,
    stdout: ChildStdout,
    info_thread: JoinHandle<InfoSummary>,
    pub frame_counter: u64,
    pub video_input: Stream,
    pub video_output: Stream,
}

impl Default for FFMpegDecoderBuilder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FFMpegDecoderBuilder {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        let mut cmd = Command::new(program);
        cmd.arg("-hide_banner");
        // escape input
        cmd.arg("-i");
        Self { cmd }
    }

    pub fn input<I, S>(mut self, input: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.cmd.args(input);
        self
    }

    fn cmd(mut self) -> Command {
        self.cmd.args([
            "-an",
            "-f",
            "image2pipe",
            "-pix_fmt",
            "rgb24",
            "-c:v",
            "rawvideo",
            "pipe:1",
        ]);
        self.cmd.stderr(Stdio::piped()).stdout(Stdio::piped()).stdin(Stdio::null());
        self.cmd
    }
}

/// Await input and output video stream descriptions, in this order
fn await_streams(rx: &Receiver<InfoResult<StreamInfo>>) -> VideoResult<(Stream, Stream)> {
    let mut input = None;
    loop {
        let msg = rx.recv_timeout(Duration::from_secs(10)).map_err(|e| {
            let why = match e {
                RecvTimeoutError::Timeout => "timeout",
                RecvTimeoutError::Disconnected => "disconnected",
            };
            VideoProcError::Start { reason: why.to_string(), last_line: String::new() }
        })?;
        match msg {
            Ok(StreamInfo::Input { stream, .. }) if input.is_none() => input = Some(stream),
            Ok(StreamInfo::Output { stream, .. }) => {
                let input = input.ok_or_else(|| VideoProcError::is_missing("input stream"))?;
                return Ok((input, stream));
            }
            _ => {}
        }
    }
}

impl FFMpegDecoder {
    pub fn try_new(builder: FFMpegDecoderBuilder) -> VideoResult<Self> {
        let mut cmd = builder.cmd();
        debug!(
            "ffmpeg {}",
            cmd.get_args().map(|s| s.to_string_lossy()).collect::<Vec<_>>().join(" ")
        );
        let mut child =
            cmd.spawn().map_err(|e| VideoProcError::spawning(cmd.get_program(), e))?;
        let stderr =
            child.stderr.take().ok_or_else(|| VideoProcError::is_missing("stderr pipe"))?;
        let (stream_info_rx, info_thread) = spawn_info_thread(stderr, "Decoder")?;

        let (video_input, video_output) = match await_streams(&stream_info_rx) {
            Ok(streams) => streams,
            Err(e) => {
                _ = child.kill();
                _ = child.wait();
                let last_line = info_thread.join().map(|s| s.last_line).unwrap_or_default();
                return Err(match e {
                    VideoProcError::Start { reason, .. } => {
                        VideoProcError::Start { reason, last_line }
                    }
                    e => e,
                });
            }
        };

        let stdout =
            child.stdout.take().ok_or_else(|| VideoProcError::is_missing("stdout pipe"))?;
        Ok(Self { child, stdout, info_thread, video_input, video_output, frame_counter: 0 })
    }

    pub fn empty_image(&self) -> RgbImage {
        RgbImage::new(self.video_output.width, self.video_output.height)
    }

    /// Write the next frame into image and return its frame id, or None after the last one.
    pub fn read_frame(&mut self, image: &mut RgbImage) -> VideoResult<Option<u64>> {
        let buf: &mut [u8] = image;
        let mut filled = 0;
        while filled < buf.len() {
            match self.stdout.read(&mut buf[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => {
                    return Err(VideoProcError::explain_io(
                        format!("frame ended after {filled} of {} bytes", buf.len()),
                        ErrorKind::UnexpectedEof.into(),
                    ))
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    return Err(VideoProcError::explain_io(
                        "error reading full frame from video process",
                        e,
                    ))
                }
            }
        }
        self.frame_counter += 1;
        Ok(Some(self.frame_counter))
    }

    /// Drain remaining frames and await exit code
    pub fn close(mut self) -> VideoResult<()> {
        self.stdout.bytes().for_each(|_| {});

        let exit_code = self
            .child
            .wait()
            .map_err(|e| VideoProcError::explain_io("waiting on video process", e))?;
        let summary = self
            .info_thread
            .join()
            .map_err(|_| VideoProcError::Other("error joining meta data thread".to_string()))?;
        match exit_code.code() {
            Some(code) if code > 0 => {
                Err(VideoProcError::ExitCode { code, last_line: summary.last_line })
            }
            None => Err(VideoProcError::Other("video child process killed by signal".to_string())),
            _ => Ok(()),
        }
    }
}
