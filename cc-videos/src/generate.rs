use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    thread::{self, ScopedJoinHandle},
};

use ff_video::{EncodeReport, FFMpegEncoderBuilder, VideoProcError};
use tracing::{info, warn};

use crate::{
    catalog::AssetRecord,
    error::{GenError, GenResult},
};

/// Runs the encoder for asset records into one directory
#[derive(Debug, Clone)]
pub struct Generator {
    program: OsString,
    out_dir: PathBuf,
    parallel: bool,
}

impl Generator {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self { program: "ffmpeg".into(), out_dir: out_dir.into(), parallel: false }
    }

    /// Encoder executable, `ffmpeg` from PATH by default
    pub fn program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    /// Run one encoder per record at once
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn encoder(&self, record: &AssetRecord) -> FFMpegEncoderBuilder {
        record.clip.encoder(&self.program, record.output_path(&self.out_dir))
    }

    /// Shell commands reproducing the records
    pub fn commands(&self, records: &[&AssetRecord]) -> Vec<String> {
        records.iter().map(|r| self.encoder(r).command_line()).collect()
    }

    fn ensure_out_dir(&self) -> GenResult<()> {
        std::fs::create_dir_all(&self.out_dir).map_err(|e| {
            GenError::explain_io(format!("couldn't create output directory {:?}", self.out_dir), e)
        })
    }

    pub fn generate_one(&self, record: &AssetRecord) -> GenResult<EncodeReport> {
        self.ensure_out_dir()?;
        self.encode(record)
    }

    fn encode(&self, record: &AssetRecord) -> GenResult<EncodeReport> {
        let report = self.encoder(record).run().map_err(|e| GenError::video(record.key, e))?;

        let clip = &record.clip;
        match &report.stream {
            Some(s) if (s.width, s.height) != (clip.resolution.width, clip.resolution.height) => {
                let key = record.key;
                warn!("{key} encoded as {}x{} instead of {}", s.width, s.height, clip.resolution)
            }
            Some(_) => {}
            None => warn!("{}: encoder didn't announce its output stream", record.key),
        }
        match report.frames {
            Some(n) if n != u64::from(clip.frame_count()) => {
                warn!("{} has {} frames instead of {}", record.key, n, clip.frame_count())
            }
            _ => {}
        }
        info!("generated {:?}", report.output);
        Ok(report)
    }

    /// Generate every record, each succeeds or fails on its own
    pub fn generate_all<'r>(
        &self,
        records: &[&'r AssetRecord],
    ) -> GenResult<Vec<(&'r AssetRecord, GenResult<EncodeReport>)>> {
        self.ensure_out_dir()?;
        if !self.parallel {
            return Ok(records.iter().map(|&r| (r, self.encode(r))).collect());
        }

        Ok(thread::scope(|s| {
            let spawned = records
                .iter()
                .map(|&r| {
                    let handle = thread::Builder::new()
                        .name(r.key.to_string())
                        .spawn_scoped(s, move || self.encode(r))
                        .map_err(|e| GenError::explain_io("couldn't spawn generator thread", e));
                    (r, handle)
                })
                .collect::<Vec<_>>();
            join_all(spawned)
        }))
    }
}

type Encoding<'scope> = ScopedJoinHandle<'scope, GenResult<EncodeReport>>;

/// Await every encoding thread, a record whose thread didn't spawn or panicked failed
fn join_all<'r>(
    spawned: Vec<(&'r AssetRecord, GenResult<Encoding<'_>>)>,
) -> Vec<(&'r AssetRecord, GenResult<EncodeReport>)> {
    spawned
        .into_iter()
        .map(|(r, handle)| {
            let outcome = handle.and_then(|handle| {
                handle.join().unwrap_or_else(|_| {
                    Err(GenError::video(
                        r.key,
                        VideoProcError::Other("generator thread panicked".into()),
                    ))
                })
            });
            (r, outcome)
        })
        .collect()
}
