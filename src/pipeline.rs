//! Per-source wiring of the record builder and the codec.
//!
//! A [`MetadataPipeline`] serves one video source. [`SourceRouter`] keeps one
//! pipeline per source id so that sources never share track state, and
//! [`FrameSource`] is the seam through which the host feeds tracked frames.

mod metadata;
mod router;
mod source;

pub use metadata::MetadataPipeline;
pub use router::SourceRouter;
pub use source::{FrameSource, JsonLinesSource, SourceError, TrackedFrame};
