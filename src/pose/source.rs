use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Deserialize;

use crate::error::{CoachError, Result};

use super::landmark::{FrameSnapshot, Landmark, LandmarkLayout};

/// Producer of per-frame landmarks.
///
/// The coach only needs `next_frame`; model loading, runtime selection and
/// camera handling stay behind the implementation. Implementations release
/// their device in `Drop`, so dropping the source ends the capture on every
/// exit path.
pub trait PoseSource {
    /// Next frame, or `Ok(None)` once the stream has ended
    fn next_frame(&mut self) -> Result<Option<FrameSnapshot>>;
}

impl<S: PoseSource + ?Sized> PoseSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<FrameSnapshot>> {
        (**self).next_frame()
    }
}

/// One line of a recording; `layout` may be left out
#[derive(Deserialize)]
struct RecordedFrame {
    timestamp_ms: u64,
    layout: Option<LandmarkLayout>,
    landmarks: Vec<Landmark>,
}

/// Recorded session: one JSON `FrameSnapshot` per line
pub struct ReplaySource<R> {
    reader: R,
    layout: LandmarkLayout,
    line: usize,
    buf: String,
}

impl ReplaySource<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            CoachError::SourceUnavailable(format!("{}: {}", path.display(), e))
        })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> ReplaySource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            layout: LandmarkLayout::default(),
            line: 0,
            buf: String::new(),
        }
    }

    /// Layout assumed for lines that don't name one
    pub fn with_layout(mut self, layout: LandmarkLayout) -> Self {
        self.layout = layout;
        self
    }
}

impl<R: BufRead> PoseSource for ReplaySource<R> {
    fn next_frame(&mut self) -> Result<Option<FrameSnapshot>> {
        loop {
            self.buf.clear();
            let n = self
                .reader
                .read_line(&mut self.buf)
                .map_err(|e| CoachError::Source(e.to_string()))?;
            if n == 0 {
                return Ok(None);
            }
            self.line += 1;
            let text = self.buf.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }
            let frame: RecordedFrame =
                serde_json::from_str(text).map_err(|e| CoachError::Replay {
                    line: self.line,
                    message: e.to_string(),
                })?;
            return Ok(Some(FrameSnapshot::new(
                frame.timestamp_ms,
                frame.layout.unwrap_or(self.layout),
                frame.landmarks,
            )));
        }
    }
}

/// In-memory frames, mostly for tests and demos
pub struct FrameIter<I> {
    frames: I,
}

impl<I: Iterator<Item = FrameSnapshot>> FrameIter<I> {
    pub fn new<T: IntoIterator<IntoIter = I>>(frames: T) -> Self {
        Self {
            frames: frames.into_iter(),
        }
    }
}

impl<I: Iterator<Item = FrameSnapshot>> PoseSource for FrameIter<I> {
    fn next_frame(&mut self) -> Result<Option<FrameSnapshot>> {
        Ok(self.frames.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_replay_reads_frames_and_skips_blank_lines() {
        let data = "\n# recorded\n{\"timestamp_ms\": 1, \"landmarks\": []}\n\n{\"timestamp_ms\": 2, \"layout\": \"movenet17\", \"landmarks\": []}\n";
        let mut src = ReplaySource::new(Cursor::new(data));
        let f1 = src.next_frame().unwrap().unwrap();
        assert_eq!(f1.timestamp_ms, 1);
        let f2 = src.next_frame().unwrap().unwrap();
        assert_eq!(f2.layout, LandmarkLayout::MoveNet17);
        assert!(src.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_replay_reports_bad_line_number() {
        let data = "{\"timestamp_ms\": 1, \"landmarks\": []}\nnot json\n";
        let mut src = ReplaySource::new(Cursor::new(data));
        src.next_frame().unwrap();
        match src.next_frame() {
            Err(CoachError::Replay { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected replay error, got {:?}", other),
        }
    }

    #[test]
    fn test_replay_default_layout() {
        let data = "{\"timestamp_ms\": 1, \"landmarks\": []}\n{\"timestamp_ms\": 2, \"layout\": \"blazepose33\", \"landmarks\": []}\n";
        let mut src = ReplaySource::new(Cursor::new(data)).with_layout(LandmarkLayout::MoveNet17);
        assert_eq!(src.next_frame().unwrap().unwrap().layout, LandmarkLayout::MoveNet17);
        assert_eq!(src.next_frame().unwrap().unwrap().layout, LandmarkLayout::BlazePose33);
    }

    #[test]
    fn test_replay_missing_file_is_unavailable() {
        let err = ReplaySource::open("no/such/recording.jsonl").err().unwrap();
        assert!(matches!(err, CoachError::SourceUnavailable(_)));
    }

    #[test]
    fn test_frame_iter() {
        let frames = vec![FrameSnapshot::empty(0, LandmarkLayout::BlazePose33)];
        let mut src = FrameIter::new(frames);
        assert!(src.next_frame().unwrap().is_some());
        assert!(src.next_frame().unwrap().is_none());
    }
}
