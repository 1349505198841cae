use std::{
    io::Read,
    sync::mpsc::Receiver,
    thread::{self, JoinHandle},
};

use tracing::{debug, error, info, warn};

use crate::error::{InfoResult, VideoProcError, VideoResult};
use crate::parse::{FFMpegLines, FrameUpdate, InfoParser, StreamInfo, VideoInfo};

/// What remains known after a process' stderr closed
#[derive(Debug, Default)]
pub(crate) struct InfoSummary {
    /// Most recent progress update, the final one tells the number of frames written
    pub(crate) last_frame: Option<FrameUpdate>,
    /// Last line that wasn't progress, usually the reason when the process failed
    pub(crate) last_line: String,
}

/// Deliver infos about an ffmpeg video process through its stderr
///
/// Stream descriptions and parse errors are sent to the receiver, which can be read until
/// satisfying info was obtained and dropped anytime. Frame updates and other infos are
/// logged as tracing events. The thread finishes once stderr closes.
pub(crate) fn spawn_info_thread<R>(
    stderr: R,
    name: &str,
) -> VideoResult<(Receiver<InfoResult<StreamInfo>>, JoinHandle<InfoSummary>)>
where
    R: Read + Send + 'static,
{
    let (stream_info_tx, stream_info_rx) =
        std::sync::mpsc::sync_channel::<InfoResult<StreamInfo>>(2);

    let info_thread = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let reader = std::io::BufReader::new(stderr);
            let mut ffmpeg_lines = reader.bytes().ffmpeg_lines();
            let mut parser = InfoParser::default();
            let mut summary = InfoSummary::default();

            for line in ffmpeg_lines.by_ref() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        error!("couldn't read stderr {:?}", e);
                        continue;
                    }
                };
                // Delivery semantics depend on the message type:
                // - Stream and Error: sent until the receiver hangs up
                // - Any info: logged
                match parser.push(&line) {
                    Ok(Some(VideoInfo::Stream(msg))) => {
                        info!("new stream info: {:?}", msg);
                        _ = stream_info_tx
                            .send(Ok(msg))
                            .map_err(|e| debug!("stream info not received: {:?}", e));
                    }
                    Ok(Some(VideoInfo::Frame(msg))) => {
                        debug!("frame: {:?}", msg);
                        summary.last_frame = Some(msg);
                        continue;
                    }
                    Ok(Some(VideoInfo::Codec(msg))) => {
                        debug!("codec: {}", msg);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!("parsing video update: {}", e);
                        _ = stream_info_tx.send(Err(e));
                    }
                };
                summary.last_line = line;
            }
            let rest = String::from_utf8_lossy(ffmpeg_lines.state());
            debug!("finished reading stderr: {}", rest);
            summary
        })
        .map_err(|e| VideoProcError::explain_io("couldn't spawn info parsing thread", e))?;
    Ok((stream_info_rx, info_thread))
}
