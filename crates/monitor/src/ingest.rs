//! Newline-delimited JSON landmark frames from the face detector

use dms::LandmarkFrame;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{watch, RwLock};
use tracing::{debug, warn};

use crate::runtime::MonitorRuntime;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub lines: u64,
    pub frames: u64,
    pub malformed: u64,
    pub rejected: u64,
}

/// Feed every frame read from `reader` to the runtime until end of input
///
/// Accepted frames also become the scheduler's latest sample.
pub async fn ingest_lines<R>(
    mut reader: R,
    runtime: &RwLock<MonitorRuntime>,
    latest: &watch::Sender<Option<LandmarkFrame>>,
) -> std::io::Result<IngestStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = IngestStats::default();
    let mut line = Vec::new();

    // Raw bytes: a line that is not UTF-8 is malformed input, not an I/O error
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        stats.lines += 1;

        let frame: LandmarkFrame = match serde_json::from_slice(&line) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Skipping malformed frame on line {}: {}", stats.lines, e);
                stats.malformed += 1;
                continue;
            }
        };

        let result = runtime.write().await.handle_frame(&frame);
        match result {
            Ok(analysis) => {
                debug!("{:.3}s {}", analysis.timestamp_secs, analysis.status);
                stats.frames += 1;
                latest.send_replace(Some(frame));
            }
            Err(_) => stats.rejected += 1,
        }
    }

    debug!("Input exhausted: {:?}", stats);
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::tests::{face, runtime, FakeTransport, RecordingSink};
    use dms::StateKind;
    use std::sync::Arc;

    fn frame_line(t: f64, gap: f64) -> String {
        let frame = LandmarkFrame::with_face(t, face(gap));
        serde_json::to_string(&frame).unwrap()
    }

    #[tokio::test]
    async fn test_ingest_drives_detection() {
        let runtime = RwLock::new(runtime(
            RecordingSink::default(),
            Arc::new(FakeTransport::default()),
        ));
        let (tx, rx) = watch::channel(None);

        let input = [
            frame_line(0.0, 0.1),
            String::new(),
            frame_line(1.0, 0.1),
            frame_line(2.5, 0.1),
        ]
        .join("\n");

        let stats = ingest_lines(input.as_bytes(), &runtime, &tx).await.unwrap();
        assert_eq!(stats.lines, 3);
        assert_eq!(stats.frames, 3);

        let snapshot = runtime.read().await.snapshot();
        assert_eq!(snapshot.state, StateKind::Distracted);
        assert_eq!(snapshot.session.alerts, 1);
        assert_eq!(rx.borrow().as_ref().map(|f| f.timestamp_secs), Some(2.5));
    }

    #[tokio::test]
    async fn test_ingest_skips_bad_lines() {
        let runtime = RwLock::new(runtime(
            RecordingSink::default(),
            Arc::new(FakeTransport::default()),
        ));
        let (tx, rx) = watch::channel(None);

        let input = format!(
            "{}\nnot json\n{}\n{}\n",
            r#"{"timestamp_secs": 0.5}"#,
            r#"{"timestamp_secs": 1.0, "landmarks": [{"x": 0.0, "y": 0.0}]}"#,
            r#"{"timestamp_secs": 1.5, "landmarks": null}"#,
        );

        let stats = ingest_lines(input.as_bytes(), &runtime, &tx).await.unwrap();
        assert_eq!(
            stats,
            IngestStats {
                lines: 4,
                frames: 2,
                malformed: 1,
                rejected: 1,
            }
        );

        let snapshot = runtime.read().await.snapshot();
        assert_eq!(snapshot.state, StateKind::NoFace);
        assert_eq!(snapshot.session.no_face_frames, 2);
        assert_eq!(snapshot.rejected_frames, 1);
        assert_eq!(*rx.borrow(), Some(LandmarkFrame::without_face(1.5)));
    }

    #[tokio::test]
    async fn test_ingest_survives_invalid_utf8() {
        let runtime = RwLock::new(runtime(
            RecordingSink::default(),
            Arc::new(FakeTransport::default()),
        ));
        let (tx, rx) = watch::channel(None);

        let mut input = b"\xff\xfe garbage\n".to_vec();
        input.extend_from_slice(br#"{"timestamp_secs": 1.5, "landmarks": null}"#);
        input.push(b'\n');

        let stats = ingest_lines(input.as_slice(), &runtime, &tx).await.unwrap();
        assert_eq!(stats.lines, 2);
        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.frames, 1);
        assert_eq!(runtime.read().await.snapshot().session.frames, 1);
        assert_eq!(*rx.borrow(), Some(LandmarkFrame::without_face(1.5)));
    }
}
