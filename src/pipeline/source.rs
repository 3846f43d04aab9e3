//! Trait for producers of tracked frames.

use std::io::BufRead;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::{DetectedObject, FrameMeta};

/// One frame of tracker output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackedFrame {
    pub meta: FrameMeta,
    /// Objects in detector order
    pub objects: Vec<DetectedObject>,
    /// Track ids the tracker gave up on since the previous frame
    pub lost: Vec<u64>,
}

/// Trait for whatever delivers tracked frames to the pipeline.
///
/// Implement this to connect a detection/tracking stack.
///
/// # Example
///
/// ```ignore
/// use speedmeta::pipeline::{FrameSource, TrackedFrame};
///
/// struct MyTracker {
///     // Your tracker here
/// }
///
/// impl FrameSource for MyTracker {
///     type Error = std::io::Error;
///
///     fn next_frame(&mut self) -> Result<Option<TrackedFrame>, Self::Error> {
///         Ok(None)
///     }
/// }
/// ```
pub trait FrameSource {
    /// Error type for delivery failures.
    type Error;

    /// Return the next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<TrackedFrame>, Self::Error>;
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Reads one JSON-encoded [`TrackedFrame`] per line. Blank lines are skipped.
#[derive(Debug)]
pub struct JsonLinesSource<R> {
    reader: R,
    line: usize,
    buf: String,
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: String::new(),
        }
    }

    /// Number of lines consumed so far.
    pub fn line(&self) -> usize {
        self.line
    }
}

impl<R: BufRead> FrameSource for JsonLinesSource<R> {
    type Error = SourceError;

    fn next_frame(&mut self) -> Result<Option<TrackedFrame>, SourceError> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line += 1;
            let trimmed = self.buf.trim();
            if trimmed.is_empty() {
                continue;
            }
            return serde_json::from_str(trimmed)
                .map(Some)
                .map_err(|source| SourceError::Json {
                    line: self.line,
                    source,
                });
        }
    }
}

impl<S: FrameSource + ?Sized> FrameSource for &mut S {
    type Error = S::Error;

    fn next_frame(&mut self) -> Result<Option<TrackedFrame>, S::Error> {
        (**self).next_frame()
    }
}
