use ff_video::VideoProcError;
use thiserror::Error;

use crate::verify::Mismatch;

pub type GenResult<T> = std::result::Result<T, GenError>;

fn joined<T: ToString>(items: &[T]) -> String {
    items.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

#[derive(Error, Debug)]
pub enum GenError {
    #[error("unknown pattern {0:?}, expected one of testsrc2, testsrc, smptebars")]
    UnknownPattern(String),
    #[error("size {0:?} isn't <width>x<height>")]
    BadSize(String),
    #[error("no asset named {0:?}")]
    UnknownAsset(String),
    #[error("{msg}")]
    IO {
        msg: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{asset}: {source}")]
    Video {
        asset: String,
        #[source]
        source: VideoProcError,
    },
    #[error("{} doesn't match: {}", .asset, joined(.mismatches))]
    Mismatch { asset: String, mismatches: Vec<Mismatch> },
    #[error("{} of {} assets failed: {}", .failed.len(), .total, .failed.join(", "))]
    Failed { failed: Vec<String>, total: usize },
}

impl GenError {
    pub(crate) fn explain_io(msg: impl ToString, e: std::io::Error) -> Self {
        Self::IO { msg: msg.to_string(), source: e }
    }
    pub(crate) fn video(asset: impl ToString, e: VideoProcError) -> Self {
        Self::Video { asset: asset.to_string(), source: e }
    }
}

/// Fail if any outcome failed, naming every failed asset
pub fn summarize<'a, T: 'a>(
    outcomes: impl IntoIterator<Item = (&'a str, &'a GenResult<T>)>,
) -> GenResult<()> {
    let mut total = 0;
    let failed = outcomes
        .into_iter()
        .inspect(|_| total += 1)
        .filter(|(_, outcome)| outcome.is_err())
        .map(|(name, _)| name.to_string())
        .collect::<Vec<_>>();
    if failed.is_empty() {
        Ok(())
    } else {
        Err(GenError::Failed { failed, total })
    }
}
