use std::{
    ffi::OsString,
    fmt::{self, Display},
    path::PathBuf,
};

use ff_video::{FFMpegDecoder, FFMpegDecoderBuilder, RgbImage, Stream};
use tracing::{debug, info};

use crate::{
    catalog::{AssetRecord, Clip, Resolution},
    error::{GenError, GenResult},
};

/// How a file on disk differs from its record
#[derive(Debug, Clone, PartialEq)]
pub enum Mismatch {
    Missing,
    Resolution { expected: Resolution, actual: Resolution },
    FrameRate { expected: u32, actual: Option<f32> },
    Codec { expected: &'static str, actual: Option<String> },
    PixelFormat { expected: &'static str, actual: Option<String> },
    FrameCount { expected: u64, actual: u64 },
    BlackFrame(u64),
}

impl Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let or_unknown = |v: &Option<String>| v.clone().unwrap_or_else(|| "unknown".to_string());
        match self {
            Mismatch::Missing => write!(f, "file is missing"),
            Mismatch::Resolution { expected, actual } => {
                write!(f, "resolution {actual} instead of {expected}")
            }
            Mismatch::FrameRate { expected, actual: Some(fps) } => {
                write!(f, "{fps} fps instead of {expected}")
            }
            Mismatch::FrameRate { expected, actual: None } => {
                write!(f, "unknown fps instead of {expected}")
            }
            Mismatch::Codec { expected, actual } => {
                write!(f, "codec {} instead of {expected}", or_unknown(actual))
            }
            Mismatch::PixelFormat { expected, actual } => {
                write!(f, "pixel format {} instead of {expected}", or_unknown(actual))
            }
            Mismatch::FrameCount { expected, actual } => {
                write!(f, "{actual} frames instead of {expected}")
            }
            Mismatch::BlackFrame(id) => write!(f, "frame {id} is all black"),
        }
    }
}

/// Compare stream properties against what the clip was generated with
fn stream_mismatches(clip: &Clip, stream: &Stream) -> Vec<Mismatch> {
    let mut mismatches = vec![];
    let actual = Resolution { width: stream.width, height: stream.height };
    if actual != clip.resolution {
        mismatches.push(Mismatch::Resolution { expected: clip.resolution, actual });
    }
    match stream.fps {
        Some(fps) if (fps - clip.rate as f32).abs() < 0.01 => {}
        actual => mismatches.push(Mismatch::FrameRate { expected: clip.rate, actual }),
    }
    if stream.codec.as_deref() != Some(clip.codec.format) {
        mismatches
            .push(Mismatch::Codec { expected: clip.codec.format, actual: stream.codec.clone() });
    }
    if stream.pix_fmt.as_deref() != Some(clip.codec.pix_fmt) {
        mismatches.push(Mismatch::PixelFormat {
            expected: clip.codec.pix_fmt,
            actual: stream.pix_fmt.clone(),
        });
    }
    mismatches
}

fn is_black(img: &RgbImage) -> bool {
    img.as_raw().iter().all(|&v| v == 0)
}

/// Decodes generated files and checks them against their records
#[derive(Debug, Clone)]
pub struct Verifier {
    program: OsString,
    out_dir: PathBuf,
}

impl Verifier {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self { program: "ffmpeg".into(), out_dir: out_dir.into() }
    }

    /// Decoder executable, `ffmpeg` from PATH by default
    pub fn program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    /// Check every property of one file, reporting all mismatches at once
    pub fn verify_one(&self, record: &AssetRecord) -> GenResult<()> {
        let path = record.output_path(&self.out_dir);
        let mismatch =
            |mismatches| GenError::Mismatch { asset: record.key.to_string(), mismatches };
        if !path.is_file() {
            return Err(mismatch(vec![Mismatch::Missing]));
        }

        let builder = FFMpegDecoderBuilder::new(&self.program).input([&path]);
        let video_err = |e| GenError::video(record.key, e);
        let mut vid = FFMpegDecoder::try_new(builder).map_err(video_err)?;
        let clip = &record.clip;
        let mut mismatches = stream_mismatches(clip, &vid.video_input);

        // first and middle frame
        let probes = [1, u64::from(clip.frame_count() / 2) + 1];
        let mut img = vid.empty_image();
        let mut frames = 0;
        while let Some(id) = vid.read_frame(&mut img).map_err(video_err)? {
            if probes.contains(&id) && is_black(&img) {
                mismatches.push(Mismatch::BlackFrame(id));
            }
            frames = id;
        }
        vid.close().map_err(video_err)?;
        debug!("decoded {} frames of {:?}", frames, path);

        let expected = u64::from(clip.frame_count());
        if frames != expected {
            mismatches.push(Mismatch::FrameCount { expected, actual: frames });
        }

        if mismatches.is_empty() {
            info!("verified {:?}", path);
            Ok(())
        } else {
            Err(mismatch(mismatches))
        }
    }

    pub fn verify_all<'r>(
        &self,
        records: &[&'r AssetRecord],
    ) -> Vec<(&'r AssetRecord, GenResult<()>)> {
        records.iter().map(|&r| (r, self.verify_one(r))).collect()
    }
}
