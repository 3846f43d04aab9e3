//! Self-describing binary encoding of frame records.
//!
//! [`MetadataCodec::encode`] writes a [`FrameRecord`](crate::FrameRecord) into
//! a reusable buffer. [`MetadataCodec::decode`] verifies a buffer and hands
//! back a [`FrameView`] that reads fields in place. Layout:
//!
//! ```text
//! header   64 bytes   magic "SPFM", version, length, CRC-32, frame scalars
//! objects  68 bytes   one fixed record per object, in frame order
//! heap     variable   UTF-8 strings referenced by (offset, length)
//! ```
//!
//! All integers and floats are little-endian.

mod encoder;
mod layout;
mod text;
mod verify;
mod view;

pub use encoder::{EncodeError, MetadataCodec};
pub use layout::{LAYOUT_VERSION, MAGIC, SPEED_UNKNOWN, crc32};
pub use verify::VerifyError;
pub use view::{FrameView, ObjectView};
