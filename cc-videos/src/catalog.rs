use std::{
    ffi::OsStr,
    fmt::{self, Display, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

use ff_video::{FFMpegEncoderBuilder, LavfiSource};

use crate::error::{GenError, GenResult};

/// Synthetic test pattern generators of libavfilter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pattern {
    TestSrc2,
    TestSrc,
    SmpteBars,
}

impl Pattern {
    pub const ALL: [Pattern; 3] = [Pattern::TestSrc2, Pattern::TestSrc, Pattern::SmpteBars];

    pub fn name(self) -> &'static str {
        match self {
            Pattern::TestSrc2 => "testsrc2",
            Pattern::TestSrc => "testsrc",
            Pattern::SmpteBars => "smptebars",
        }
    }
}

impl Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Pattern {
    type Err = GenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pattern::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| GenError::UnknownPattern(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = GenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad_size = || GenError::BadSize(s.to_string());
        let (width, height) = s.split_once('x').ok_or_else(bad_size)?;
        let width = width.parse::<u32>().map_err(|_| bad_size())?;
        let height = height.parse::<u32>().map_err(|_| bad_size())?;
        if width == 0 || height == 0 {
            return Err(bad_size());
        }
        Ok(Resolution { width, height })
    }
}

/// Fixed encoding of every asset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecParams {
    /// ffmpeg encoder
    pub encoder: &'static str,
    /// codec the encoder writes, as reported when decoding
    pub format: &'static str,
    pub pix_fmt: &'static str,
    pub preset: &'static str,
    /// lower is better quality and larger output
    pub crf: u8,
}

impl CodecParams {
    pub const fn h264(crf: u8) -> Self {
        CodecParams {
            encoder: "libx264",
            format: "h264",
            pix_fmt: "yuv420p",
            preset: "medium",
            crf,
        }
    }

    pub fn output_args(&self) -> [String; 8] {
        [
            "-pix_fmt".to_string(),
            self.pix_fmt.to_string(),
            "-c:v".to_string(),
            self.encoder.to_string(),
            "-preset".to_string(),
            self.preset.to_string(),
            "-crf".to_string(),
            self.crf.to_string(),
        ]
    }
}

/// Everything that determines the encoded properties of a clip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clip {
    pub pattern: Pattern,
    pub resolution: Resolution,
    /// frames per second
    pub rate: u32,
    /// seconds
    pub duration: u32,
    pub codec: CodecParams,
}

impl Clip {
    pub const fn frame_count(&self) -> u32 {
        self.duration * self.rate
    }

    pub fn source(&self) -> LavfiSource {
        LavfiSource {
            filter: self.pattern.name().to_string(),
            width: self.resolution.width,
            height: self.resolution.height,
            rate: self.rate,
            duration: self.duration,
        }
    }

    pub fn encoder(&self, program: &OsStr, output: impl Into<PathBuf>) -> FFMpegEncoderBuilder {
        FFMpegEncoderBuilder::new(program)
            .lavfi(&self.source())
            .output_args(self.codec.output_args())
            .output(output)
    }
}

/// Film whose look an asset imitates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribution {
    pub film: &'static str,
    pub author: &'static str,
    pub license: &'static str,
    pub url: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetRecord {
    pub key: &'static str,
    pub filename: &'static str,
    pub clip: Clip,
    pub inspired_by: Attribution,
}

impl AssetRecord {
    pub fn output_path(&self, out_dir: impl AsRef<Path>) -> PathBuf {
        out_dir.as_ref().join(self.filename)
    }
}

const BLENDER: &str = "Blender Foundation";
const CC_BY_3: &str = "CC-BY-3.0";

pub const BBB: AssetRecord = AssetRecord {
    key: "bbb",
    filename: "bbb_style_640x360_24fps.mp4",
    clip: Clip {
        pattern: Pattern::TestSrc2,
        resolution: Resolution { width: 640, height: 360 },
        rate: 24,
        duration: 5,
        codec: CodecParams::h264(23),
    },
    inspired_by: Attribution {
        film: "Big Buck Bunny",
        author: BLENDER,
        license: CC_BY_3,
        url: "https://peach.blender.org/",
    },
};

pub const SINTEL: AssetRecord = AssetRecord {
    key: "sintel",
    filename: "sintel_style_320x240_30fps.mp4",
    clip: Clip {
        pattern: Pattern::TestSrc,
        resolution: Resolution { width: 320, height: 240 },
        rate: 30,
        duration: 3,
        codec: CodecParams::h264(28),
    },
    inspired_by: Attribution {
        film: "Sintel",
        author: BLENDER,
        license: CC_BY_3,
        url: "https://durian.blender.org/",
    },
};

pub const TOS: AssetRecord = AssetRecord {
    key: "tos",
    filename: "tos_style_480x270_25fps.mp4",
    clip: Clip {
        pattern: Pattern::SmpteBars,
        resolution: Resolution { width: 480, height: 270 },
        rate: 25,
        duration: 8,
        codec: CodecParams::h264(23),
    },
    inspired_by: Attribution {
        film: "Tears of Steel",
        author: BLENDER,
        license: CC_BY_3,
        url: "https://mango.blender.org/",
    },
};

pub static CATALOG: [AssetRecord; 3] = [BBB, SINTEL, TOS];

/// Find an asset by key or file name
pub fn lookup(name: &str) -> GenResult<&'static AssetRecord> {
    CATALOG
        .iter()
        .find(|r| r.key == name || r.filename == name)
        .ok_or_else(|| GenError::UnknownAsset(name.to_string()))
}

/// Pick assets by name, all of them if none are named
pub fn select<S: AsRef<str>>(names: &[S]) -> GenResult<Vec<&'static AssetRecord>> {
    if names.is_empty() {
        return Ok(CATALOG.iter().collect());
    }
    names.iter().map(|n| lookup(n.as_ref())).collect()
}

/// Markdown table of the assets and the films they are styled after
pub fn markdown_table() -> String {
    let mut table = String::from(
        "| File | Resolution | FPS | Duration | Frames | Pattern | CRF | Inspired by | License |\n\
         |------|------------|-----|----------|--------|---------|-----|-------------|---------|\n",
    );
    for r in CATALOG.iter() {
        let c = &r.clip;
        let a = &r.inspired_by;
        // writing to a String can't fail
        _ = writeln!(
            table,
            "| {} | {} | {} | {}s | {} | {} | {} | [{}]({}) ({}) | {} |",
            r.filename,
            c.resolution,
            c.rate,
            c.duration,
            c.frame_count(),
            c.pattern,
            c.codec.crf,
            a.film,
            a.url,
            a.author,
            a.license,
        );
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arg_after<'a>(args: &'a [std::ffi::OsString], flag: &str) -> &'a OsStr {
        let pos = args.iter().position(|a| a == flag).unwrap();
        &args[pos + 1]
    }

    #[test]
    fn frame_count_is_duration_times_rate() {
        let counts = CATALOG.iter().map(|r| r.clip.frame_count()).collect::<Vec<_>>();
        assert_eq!(counts, [120, 90, 200]);
        for r in CATALOG.iter() {
            assert_eq!(r.clip.frame_count(), r.clip.duration * r.clip.rate);
        }
    }

    #[test]
    fn frame_counts_and_filenames_are_unique() {
        for (i, a) in CATALOG.iter().enumerate() {
            for b in CATALOG.iter().skip(i + 1) {
                assert_ne!(a.clip.frame_count(), b.clip.frame_count());
                assert_ne!(a.filename, b.filename);
                assert_ne!(a.key, b.key);
            }
        }
    }

    #[test]
    fn bbb_invocation() {
        let args = BBB.clip.encoder(OsStr::new("ffmpeg"), BBB.output_path("")).args();
        assert_eq!(
            args,
            [
                "-y",
                "-f",
                "lavfi",
                "-i",
                "testsrc2=duration=5:size=640x360:rate=24",
                "-pix_fmt",
                "yuv420p",
                "-c:v",
                "libx264",
                "-preset",
                "medium",
                "-crf",
                "23",
                "bbb_style_640x360_24fps.mp4",
            ]
        );
    }

    #[test]
    fn sintel_invocation() {
        let args = SINTEL.clip.encoder(OsStr::new("ffmpeg"), SINTEL.output_path("")).args();
        assert_eq!(arg_after(&args, "-i"), "testsrc=duration=3:size=320x240:rate=30");
        assert_eq!(arg_after(&args, "-pix_fmt"), "yuv420p");
        assert_eq!(arg_after(&args, "-crf"), "28");
        assert_eq!(args.last().unwrap(), "sintel_style_320x240_30fps.mp4");
    }

    #[test]
    fn tos_invocation() {
        let args = TOS.clip.encoder(OsStr::new("ffmpeg"), TOS.output_path("")).args();
        assert_eq!(arg_after(&args, "-i"), "smptebars=duration=8:size=480x270:rate=25");
        assert_eq!(arg_after(&args, "-crf"), "23");
        assert_eq!(args.last().unwrap(), "tos_style_480x270_25fps.mp4");
    }

    #[test]
    fn output_lands_in_out_dir() {
        let path = TOS.output_path("media/cc");
        assert_eq!(path, Path::new("media/cc/tos_style_480x270_25fps.mp4"));
    }

    #[test]
    fn patterns_by_name() {
        for p in Pattern::ALL {
            assert_eq!(p.name().parse::<Pattern>().unwrap(), p);
        }
        assert!(matches!("mandelbrot".parse::<Pattern>(), Err(GenError::UnknownPattern(_))));
        assert!("TESTSRC".parse::<Pattern>().is_err());
    }

    #[test]
    fn resolution_parsing() {
        let size = "640x360".parse::<Resolution>().unwrap();
        assert_eq!(size, Resolution { width: 640, height: 360 });
        for bad in ["640", "640x", "x360", "640*360", "0x360", "-1x2"] {
            assert!(matches!(bad.parse::<Resolution>(), Err(GenError::BadSize(_))), "{bad}");
        }
    }

    #[test]
    fn lookup_and_select() {
        assert_eq!(lookup("sintel").unwrap().filename, "sintel_style_320x240_30fps.mp4");
        assert_eq!(lookup("tos_style_480x270_25fps.mp4").unwrap().key, "tos");
        assert!(matches!(lookup("elephants_dream"), Err(GenError::UnknownAsset(_))));

        let none: [&str; 0] = [];
        assert_eq!(select(&none).unwrap().len(), 3);
        let picked = select(&["tos", "bbb"]).unwrap();
        assert_eq!(picked.iter().map(|r| r.key).collect::<Vec<_>>(), ["tos", "bbb"]);
        assert!(select(&["bbb", "nope"]).is_err());
    }

    #[test]
    fn table_lists_every_asset() {
        let table = markdown_table();
        assert_eq!(table.lines().count(), 2 + CATALOG.len());
        assert!(table.contains(
            "| bbb_style_640x360_24fps.mp4 | 640x360 | 24 | 5s | 120 | testsrc2 | 23 | \
             [Big Buck Bunny](https://peach.blender.org/) (Blender Foundation) | CC-BY-3.0 |"
        ));
        assert!(table.contains("| sintel_style_320x240_30fps.mp4 | 320x240 | 30 | 3s | 90 |"));
    }
}
