use std::path::PathBuf;

use cc_videos::{
    catalog, media_root, summarize, Clip, CodecParams, Generator, Pattern, Resolution, Verifier,
};
use stable_eyre::eyre::{bail, Report};
use tracing_subscriber::EnvFilter;

type Result<T> = std::result::Result<T, Report>;

const HELP: &str = "\
cc-videos: synthetic test videos styled after Creative Commons films

USAGE:
  cc-videos <COMMAND> [OPTIONS]

COMMANDS:
  generate   encode assets into the output directory
  verify     decode assets and check their properties
  commands   print the equivalent ffmpeg invocations
  list       print the asset table
  synth      encode a single clip from a test pattern

OPTIONS (generate, verify, commands):
  --out-dir DIR   output directory [default: tests/test_data/cc_videos]
  --ffmpeg PROG   ffmpeg executable [default: ffmpeg]
  --parallel      run one encoder per asset at once (generate)
  --only KEY      restrict to an asset, may repeat (generate, verify)

OPTIONS (synth):
  --pattern NAME  testsrc2, testsrc or smptebars
  --size WxH      frame size
  --rate FPS      frames per second
  --duration SECS length in seconds
  --crf Q         quality [default: 23]
  OUT             output file
";

fn init_logs() -> Result<()> {
    stable_eyre::install()?;
    let format =
        tracing_subscriber::fmt::format().with_thread_names(true).with_target(false).compact();
    tracing_subscriber::fmt()
        .event_format(format)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

#[derive(Debug)]
struct Options {
    out_dir: PathBuf,
    ffmpeg: PathBuf,
}

impl Options {
    fn from_args(pargs: &mut pico_args::Arguments) -> Result<Self> {
        Ok(Self {
            out_dir: pargs.opt_value_from_str("--out-dir")?.unwrap_or_else(media_root),
            ffmpeg: pargs.opt_value_from_str("--ffmpeg")?.unwrap_or_else(|| "ffmpeg".into()),
        })
    }
}

fn finish(pargs: pico_args::Arguments) -> Result<()> {
    let rest = pargs.finish();
    if !rest.is_empty() {
        bail!("unexpected arguments {rest:?}, see --help");
    }
    Ok(())
}

fn generate(mut pargs: pico_args::Arguments) -> Result<()> {
    let opts = Options::from_args(&mut pargs)?;
    let parallel = pargs.contains("--parallel");
    let only: Vec<String> = pargs.values_from_str("--only")?;
    finish(pargs)?;

    let records = catalog::select(&only)?;
    let generator = Generator::new(opts.out_dir).program(opts.ffmpeg).parallel(parallel);
    let outcomes = generator.generate_all(&records)?;
    for (record, outcome) in &outcomes {
        match outcome {
            Ok(report) => println!("{}: {}", record.key, report.output.display()),
            Err(e) => println!("{}: failed, {e}", record.key),
        }
    }
    summarize(outcomes.iter().map(|(r, o)| (r.key, o)))?;
    Ok(())
}

fn verify(mut pargs: pico_args::Arguments) -> Result<()> {
    let opts = Options::from_args(&mut pargs)?;
    let only: Vec<String> = pargs.values_from_str("--only")?;
    finish(pargs)?;

    let records = catalog::select(&only)?;
    let outcomes = Verifier::new(opts.out_dir).program(opts.ffmpeg).verify_all(&records);
    for (record, outcome) in &outcomes {
        match outcome {
            Ok(()) => println!("{}: ok", record.key),
            Err(e) => println!("{}: {e}", record.key),
        }
    }
    summarize(outcomes.iter().map(|(r, o)| (r.key, o)))?;
    Ok(())
}

fn commands(mut pargs: pico_args::Arguments) -> Result<()> {
    let opts = Options::from_args(&mut pargs)?;
    finish(pargs)?;

    let generator = Generator::new(opts.out_dir).program(opts.ffmpeg);
    let records = catalog::CATALOG.iter().collect::<Vec<_>>();
    for cmd in generator.commands(&records) {
        println!("{cmd}");
    }
    Ok(())
}

fn synth(mut pargs: pico_args::Arguments) -> Result<()> {
    let pattern: Pattern = pargs.value_from_str("--pattern")?;
    let resolution: Resolution = pargs.value_from_str("--size")?;
    let rate: u32 = pargs.value_from_str("--rate")?;
    let duration: u32 = pargs.value_from_str("--duration")?;
    let crf: u8 = pargs.opt_value_from_str("--crf")?.unwrap_or(23);
    let ffmpeg: PathBuf = pargs.opt_value_from_str("--ffmpeg")?.unwrap_or_else(|| "ffmpeg".into());
    let out: PathBuf = pargs.free_from_str()?;
    finish(pargs)?;
    if rate == 0 || duration == 0 {
        bail!("rate and duration must be positive");
    }

    let clip = Clip { pattern, resolution, rate, duration, codec: CodecParams::h264(crf) };
    let report = clip.encoder(ffmpeg.as_os_str(), out).run()?;
    match report.frames {
        Some(n) => println!("{}: {n} frames", report.output.display()),
        None => println!("{}", report.output.display()),
    }
    Ok(())
}

fn run(mut pargs: pico_args::Arguments) -> Result<()> {
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        return Ok(());
    }

    match pargs.subcommand()?.as_deref() {
        Some("generate") => generate(pargs),
        Some("verify") => verify(pargs),
        Some("commands") => commands(pargs),
        Some("list") => {
            finish(pargs)?;
            print!("{}", catalog::markdown_table());
            Ok(())
        }
        Some("synth") => synth(pargs),
        Some(other) => bail!("unknown command {other:?}, see --help"),
        None => {
            // options before any command
            finish(pargs)?;
            print!("{HELP}");
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    init_logs()?;
    run(pico_args::Arguments::from_env())
}
