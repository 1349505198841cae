use std::io;

/// Describes one video stream
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    pub num: u32,
    pub width: u32,
    pub height: u32,
    pub fps: Option<f32>,
    pub codec: Option<String>,
    pub pix_fmt: Option<String>,
}

/// Describe in- or output video stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamInfo {
    Input { from: String, stream: Stream },
    Output { to: String, stream: Stream },
}

/// Describes a stream's update
#[derive(Debug, Clone, PartialEq)]
pub struct FrameUpdate {
    pub frame: u64,
    pub fps: Option<f32>,
    pub dup: Option<u32>,
    pub drop: Option<u32>,
}

/// Describes a video's stream updates
#[derive(Debug, Clone, PartialEq)]
pub enum VideoInfo {
    Stream(StreamInfo),
    Frame(FrameUpdate),
    Codec(String),
}

#[derive(Debug, Clone, PartialEq)]
enum ParseContext {
    Stateless,
    Output(u32, String),
    Input(u32, String),
}

/// Parses ffmpeg's stderr into VideoInfo
#[derive(Debug, Clone)]
pub struct InfoParser {
    mode: ParseContext,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    context: ParseContext,
    line: String,
    reason: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} in {:?} (line: {:?})", self.reason, self.context, self.line)
    }
}

impl std::error::Error for ParseError {}

impl ParseError {
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

pub type Result = std::result::Result<VideoInfo, ParseError>;
type PushResult = std::result::Result<Option<VideoInfo>, ParseError>;

impl Default for InfoParser {
    fn default() -> Self {
        InfoParser { mode: ParseContext::Stateless }
    }
}

/// Codec and pixel format lead the video description, e.g.
/// `h264 (High) (avc1 / 0x31637661), yuv420p(tv, progressive), 640x360 ...`
fn codec_and_pix_fmt(description: &str) -> (Option<String>, Option<String>) {
    let mut entries = description.split(',');
    let codec = entries.next().and_then(|c| c.split_whitespace().next()).map(str::to_string);
    let pix_fmt = entries
        .next()
        .map(|p| p.trim())
        .and_then(|p| p.split('(').next())
        .filter(|p| !p.is_empty())
        .map(str::to_string);
    (codec, pix_fmt)
}

impl InfoParser {
    fn error_on(&self, reason: impl Into<String>, line: &str) -> ParseError {
        ParseError { context: self.mode.clone(), line: line.to_string(), reason: reason.into() }
    }

    pub fn push(&mut self, line: &str) -> PushResult {
        let error_on = |reason| self.error_on(reason, line);
        let error_on_ = |reason| self.error_on(reason, line); // no generic closures

        // Begin Stream
        let output = line.strip_prefix("Output #").unwrap_or(line);
        let input = line.strip_prefix("Input #").unwrap_or(line);
        let in_out = match (input.len(), output.len()) {
            (i, _) if i < line.len() => Some((true, input)),
            (_, o) if o < line.len() => Some((false, output)),
            _ => None,
        };
        if let Some((is_input, remaining)) = in_out {
            let mut parts = remaining.split(',');
            let num_stream = parts
                .next()
                .ok_or_else(|| error_on("no delimiter after stream number"))?
                .trim()
                .parse::<u32>()
                .map_err(|e| error_on_(format!("# not a number but {:?}", e)))?;
            let to_from =
                parts.last().ok_or_else(|| error_on("no last stream element (from or to)"))?.trim();

            let to_from =
                to_from.strip_prefix(if is_input { "from '" } else { "to '" }).unwrap_or(to_from);
            let to_from = to_from.strip_suffix("':").unwrap_or(to_from);

            self.mode = if is_input {
                ParseContext::Input(num_stream, to_from.to_string())
            } else {
                ParseContext::Output(num_stream, to_from.to_string())
            };
            return Ok(None);
        }

        // Codec and muxer logs
        if line.starts_with('[') && line.contains(']') {
            return Ok(Some(VideoInfo::Codec(line.into())));
        }

        let line_trimmed = line.trim();
        let frame_str = line_trimmed.strip_prefix("frame=").unwrap_or(line_trimmed);

        // any other unindented header ends the in- or output block
        if line_trimmed.len() == line.len() && frame_str.len() == line.len() {
            self.mode = ParseContext::Stateless;
            return Ok(None);
        }

        let stream_str = line_trimmed.strip_prefix("Stream #").unwrap_or(line_trimmed);
        if !matches!(self.mode, ParseContext::Stateless) && stream_str.len() < line_trimmed.len() {
            let (is_input, num_stream, to_from) = match self.mode {
                ParseContext::Input(num_stream, ref from) => (true, num_stream, from),
                ParseContext::Output(num_stream, ref to) => (false, num_stream, to),
                _ => return Err(error_on("found Stream while not looking for it")),
            };
            let Some((stream_num_str, description)) = stream_str.split_once(" Video: ") else {
                return Ok(None);
            };
            let parse_num_stream = stream_num_str
                .split(':')
                .next()
                .ok_or_else(|| error_on("no delimiter after stream number"))?
                .parse::<u32>()
                .map_err(|e| error_on_(format!("Stream # not a number {:?}", e)))?;

            if num_stream != parse_num_stream {
                return Err(error_on_(format!(
                    "Stream {} didn't match {}",
                    parse_num_stream,
                    if is_input { "Input" } else { "Output" }
                )));
            };

            let (codec, pix_fmt) = codec_and_pix_fmt(description);
            let mut width_height = None;
            let mut fps = None;
            for key_vals in description.split(',') {
                let key_vals = key_vals.trim();
                let fps_vals = key_vals.trim_end_matches(" fps");
                if fps_vals.len() < key_vals.len() {
                    fps = fps_vals.parse::<f32>().map_err(|_| error_on("fps not a number"))?.into();
                } else if width_height.is_none() {
                    let mut dim_vals = key_vals.splitn(2, 'x');
                    if let (Some(width_str), Some(height_str)) = (dim_vals.next(), dim_vals.next())
                    {
                        // trailing aspect ratio, e.g. "360 [SAR 1:1 DAR 16:9]"
                        let height_str =
                            height_str.split_once(' ').map_or_else(|| height_str, |v| v.0);
                        if let (Ok(w), Ok(h)) =
                            (width_str.parse::<u32>(), height_str.parse::<u32>())
                        {
                            width_height = Some((w, h))
                        };
                    }
                }
            }
            return if let Some((width, height)) = width_height {
                let stream = Stream { num: num_stream, width, height, fps, codec, pix_fmt };
                let info = if is_input {
                    VideoInfo::Stream(StreamInfo::Input { from: to_from.clone(), stream })
                } else {
                    VideoInfo::Stream(StreamInfo::Output { to: to_from.clone(), stream })
                };
                self.mode = ParseContext::Stateless;
                Ok(Some(info))
            } else {
                Err(error_on("didn't find <width>x<height> in video stream"))
            };
        }

        // Frame message
        if frame_str.len() < line_trimmed.len() {
            if let Some((frame_num_str, mut frame_rest)) = frame_str.trim().split_once(' ') {
                let frame = frame_num_str
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| error_on("frame is no number"))?;

                let (mut fps, mut dup, mut drop) = (None, None, None);
                while let Some((key, rest)) = frame_rest.split_once('=') {
                    let rest = rest.trim_start();
                    let (value, rest) = rest.split_once(' ').unwrap_or((rest, ""));
                    match key.trim() {
                        "fps" => fps = value.parse().ok(),
                        "dup" => dup = value.parse().ok(),
                        "drop" => drop = value.parse().ok(),
                        _ => {}
                    }
                    frame_rest = rest;
                }
                Ok(Some(VideoInfo::Frame(FrameUpdate { frame, fps, dup, drop })))
            } else {
                Ok(None)
            }
        } else {
            Ok(None)
        }
    }

    pub fn iter_on<'a, I, T: AsRef<str>>(
        &'a mut self,
        lines: I,
    ) -> impl Iterator<Item = Result> + 'a
    where
        I: IntoIterator<Item = T> + 'a,
    {
        lines.into_iter().map(|l| self.push(l.as_ref())).filter_map(|info| info.transpose())
    }
}

/// Split ffmpeg's stderr bytes into lines
///
/// Progress updates are terminated by `\r` rather than `\n`, so both end a line.
/// Empty lines are skipped.
pub struct FFMpegLineIter<I> {
    bytes: I,
    line: Vec<u8>,
}

impl<I> FFMpegLineIter<I> {
    /// Bytes of an unterminated line read so far
    pub fn state(&self) -> &[u8] {
        &self.line
    }
}

impl<I: Iterator<Item = io::Result<u8>>> Iterator for FFMpegLineIter<I> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.bytes.next() {
                Some(Ok(b'\n' | b'\r')) if self.line.is_empty() => continue,
                Some(Ok(b'\n' | b'\r')) => {
                    let line = String::from_utf8_lossy(&self.line).into_owned();
                    self.line.clear();
                    return Some(Ok(line));
                }
                Some(Ok(b)) => self.line.push(b),
                Some(Err(e)) => return Some(Err(e)),
                None if self.line.is_empty() => return None,
                None => {
                    let line = String::from_utf8_lossy(&self.line).into_owned();
                    self.line.clear();
                    return Some(Ok(line));
                }
            }
        }
    }
}

pub trait FFMpegLines: Sized {
    fn ffmpeg_lines(self) -> FFMpegLineIter<Self>;
}

impl<I: Iterator<Item = io::Result<u8>>> FFMpegLines for I {
    fn ffmpeg_lines(self) -> FFMpegLineIter<Self> {
        FFMpegLineIter { bytes: self, line: Vec::new() }
    }
}

#[cfg(test)]
mod test {
    use super::{FFMpegLines, FrameUpdate, InfoParser, Stream, StreamInfo, VideoInfo};
    use std::io::Read;

    static SYNTH_INFO: &str = r#"Input #0, lavfi, from 'testsrc2=duration=5:size=640x360:rate=24':
  Duration: N/A, start: 0.000000, bitrate: N/A
  Stream #0:0: Video: wrapped_avframe, yuv420p, 640x360 [SAR 1:1 DAR 16:9], 24 fps, 24 tbr, 24 tbn
Stream mapping:
  Stream #0:0 -> #0:0 (wrapped_avframe (native) -> h264 (libx264))
[libx264 @ 0x5581c1a0b2c0] using SAR=1/1
Output #0, mp4, to 'media/bbb_style_640x360_24fps.mp4':
  Metadata:
    encoder         : Lavf60.16.100
  Stream #0:0: Video: h264 (avc1 / 0x31637661), yuv420p(progressive), 640x360 [SAR 1:1 DAR 16:9], q=2-31, 24 fps, 12288 tbn
    Metadata:
      encoder         : Lavc60.31.102 libx264
frame=   61 fps=0.0 q=28.0 size=       0kB time=00:00:02.41 bitrate=   0.2kbits/s speed=4.79x
frame=  120 fps=0.0 q=-1.0 Lsize=      92kB time=00:00:04.91 bitrate= 153.5kbits/s dup=0 drop=2 speed=5.92x"#;

    #[test]
    fn synth_info() {
        let mut parser = InfoParser::default();
        let mut infos = parser.iter_on(SYNTH_INFO.lines());

        assert_eq!(
            infos.next().unwrap(),
            Ok(VideoInfo::Stream(StreamInfo::Input {
                stream: Stream {
                    num: 0,
                    width: 640,
                    height: 360,
                    fps: Some(24f32),
                    codec: Some("wrapped_avframe".to_string()),
                    pix_fmt: Some("yuv420p".to_string()),
                },
                from: "testsrc2=duration=5:size=640x360:rate=24".to_string(),
            }))
        );
        assert_eq!(
            infos.next().unwrap(),
            Ok(VideoInfo::Codec("[libx264 @ 0x5581c1a0b2c0] using SAR=1/1".into()))
        );
        assert_eq!(
            infos.next().unwrap(),
            Ok(VideoInfo::Stream(StreamInfo::Output {
                stream: Stream {
                    num: 0,
                    width: 640,
                    height: 360,
                    fps: Some(24f32),
                    codec: Some("h264".to_string()),
                    pix_fmt: Some("yuv420p".to_string()),
                },
                to: "media/bbb_style_640x360_24fps.mp4".to_string(),
            }))
        );
        assert_eq!(
            infos.next().unwrap(),
            Ok(VideoInfo::Frame(FrameUpdate { frame: 61, fps: Some(0f32), dup: None, drop: None }))
        );
        assert_eq!(
            infos.next().unwrap(),
            Ok(VideoInfo::Frame(FrameUpdate {
                frame: 120,
                fps: Some(0f32),
                dup: Some(0),
                drop: Some(2),
            }))
        );
        assert!(infos.next().is_none());
    }

    static DECODE_INFO: &str = r#"Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'media/sintel_style_320x240_30fps.mp4':
  Metadata:
    major_brand     : isom
    encoder         : Lavf60.16.100
  Duration: 00:00:03.00, start: 0.000000, bitrate: 183 kb/s
  Stream #0:0[0x1](und): Video: h264 (High 4:4:4 Predictive) (avc1 / 0x31637661), yuv420p(progressive), 320x240 [SAR 1:1 DAR 4:3], 180 kb/s, 30 fps, 30 tbr, 15360 tbn (default)
    Metadata:
      handler_name    : VideoHandler"#;

    #[test]
    fn decode_input_with_stream_id() {
        let info = InfoParser::default().iter_on(DECODE_INFO.lines()).next().unwrap().unwrap();
        let stream = match info {
            VideoInfo::Stream(StreamInfo::Input { stream, .. }) => stream,
            other => panic!("expected input stream, got {other:?}"),
        };
        assert_eq!((stream.width, stream.height), (320, 240));
        assert_eq!(stream.fps, Some(30f32));
        assert_eq!(stream.codec.as_deref(), Some("h264"));
        assert_eq!(stream.pix_fmt.as_deref(), Some("yuv420p"));
    }

    #[test]
    fn illegal_input() {
        assert!(InfoParser::default()
            .iter_on(["Input #1, from 'x':", "  Stream #1: Video: abc, 1X01x42 , 20 fps"])
            .next()
            .unwrap()
            .is_err());
    }

    #[test]
    fn mismatched_output_stream() {
        let err = InfoParser::default()
            .iter_on(["Output #2, to 'x':", "  Stream #1: Video: abc, 100x100 , 20 fps"])
            .next()
            .unwrap()
            .unwrap_err();
        assert_eq!(err.reason(), "Stream 1 didn't match Output");
    }

    #[test]
    fn illegal_frame() {
        assert_eq!(
            InfoParser::default()
                .push("frame= ---- fps=978 q=-0.0 size=10600200kB time=00:02:10.86 speed=32.6x")
                .unwrap_err()
                .reason(),
            "frame is no number"
        );
    }

    #[test]
    fn header_resets_context() {
        let mut parser = InfoParser::default();
        parser.push("Input #0, lavfi, from 'testsrc':").unwrap();
        parser.push("Stream mapping:").unwrap();
        // a stream line outside of an in- or output block is not a stream description
        assert_eq!(parser.push("  Stream #0:0 -> #0:0 (wrapped_avframe -> h264)"), Ok(None));
    }

    #[test]
    fn audio_streams_are_skipped() {
        let lines = [
            "Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'x.mp4':",
            "  Stream #0:0(und): Audio: aac (LC) (mp4a / 0x6134706D), 44100 Hz, stereo, fltp, 125 kb/s (default)",
        ];
        assert!(InfoParser::default().iter_on(lines).next().is_none());
    }

    #[test]
    fn carriage_return_progress() {
        let stderr = b"Output #0, mp4, to 'o.mp4':\nframe=   10 fps=0.0\rframe=   20 fps=0.0\r\nlast";
        let mut lines = (&stderr[..]).bytes().ffmpeg_lines();
        let collected = lines.by_ref().take(3).map(|l| l.unwrap()).collect::<Vec<_>>();
        assert_eq!(
            collected,
            ["Output #0, mp4, to 'o.mp4':", "frame=   10 fps=0.0", "frame=   20 fps=0.0"]
        );
        assert_eq!(lines.next().unwrap().unwrap(), "last");
        assert!(lines.next().is_none());
        assert!(lines.state().is_empty());
    }
}
