//! Landmark frames from an external pose tracker.
//!
//! The tracker writes one JSON frame per line (an array of 33 keypoints, or
//! `null`/`[]` when nobody is in view) to a file or FIFO. A producer thread
//! parses lines and hands frames to the game loop over a bounded channel.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, TrySendError};
use std::thread;

use anyhow::{Context, Result};
use pose_runner::LandmarkSet;
use tracing::{debug, info, warn};

pub const LANDMARKS_ENV: &str = "POSE_RUNNER_LANDMARKS";

/// `None` is a frame in which the tracker saw no one.
pub type Frame = Option<LandmarkSet>;

/// Open the source named by the environment, if any.
pub fn from_env() -> Result<Option<Receiver<Frame>>> {
    let Some(path) = std::env::var_os(LANDMARKS_ENV) else {
        info!("{LANDMARKS_ENV} not set, keyboard only");
        return Ok(None);
    };
    open(Path::new(&path)).map(Some)
}

pub fn open(path: &Path) -> Result<Receiver<Frame>> {
    let file = File::open(path)
        .with_context(|| format!("opening landmark source {}", path.display()))?;
    info!(path = %path.display(), "reading landmark frames");
    Ok(spawn(BufReader::new(file)))
}

/// Run the producer on its own thread. It stops once the receiver is dropped
/// or the source ends.
pub fn spawn<R: BufRead + Send + 'static>(reader: R) -> Receiver<Frame> {
    let (tx, rx) = mpsc::sync_channel::<Frame>(4);
    thread::spawn(move || {
        for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "landmark source failed");
                    break;
                }
            };
            let frame = match parse_line(&line) {
                Ok(Some(frame)) => frame,
                Ok(None) => continue,
                Err(e) => {
                    warn!(error = %e, "skipping malformed landmark frame");
                    continue;
                }
            };
            match tx.try_send(frame) {
                Ok(()) | Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Disconnected(_)) => {
                    debug!("game loop gone, landmark producer stopping");
                    break;
                }
            }
        }
        debug!("landmark source closed");
    });
    rx
}

/// `Ok(None)` for a blank line; `Ok(Some(None))` for an empty frame.
fn parse_line(line: &str) -> pose_runner::Result<Option<Frame>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if line == "null" || line == "[]" {
        return Ok(Some(None));
    }
    LandmarkSet::from_json(line).map(|set| Some(Some(set)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    fn full_frame() -> String {
        let point = r#"{"x":0.5,"y":0.5,"visibility":0.9}"#;
        format!("[{}]", vec![point; 33].join(","))
    }

    #[test]
    fn test_parse_line() {
        assert!(matches!(parse_line("  "), Ok(None)));
        assert!(matches!(parse_line("null"), Ok(Some(None))));
        assert!(matches!(parse_line("[]"), Ok(Some(None))));
        assert!(matches!(parse_line(&full_frame()), Ok(Some(Some(_)))));
        assert!(parse_line("[{\"x\":1}]").is_err());
        assert!(parse_line("{oops").is_err());
    }

    #[test]
    fn test_producer_skips_bad_lines() {
        let text = format!("{}\nnot json\n\nnull\n", full_frame());
        let rx = spawn(Cursor::new(text));
        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(first.is_some());
        let second = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(second.is_none());
        assert!(rx.recv_timeout(Duration::from_secs(2)).is_err());
    }
}
