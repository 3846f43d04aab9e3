use thiserror::Error;
use tracing::trace;

use crate::codec::layout::{
    CHECKSUM_START, FLAG_OVERSPEED, HEADER_LEN, LAYOUT_VERSION, MAGIC, OBJECT_LEN,
    SPEED_UNKNOWN, crc32, header, object, object_base, write_bytes,
};
use crate::codec::verify::{self, VerifyError};
use crate::codec::{FrameView, text};
use crate::record::{FrameRecord, ObjectRecord};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("encoded frame would be {len} bytes, over the 4 GiB layout limit")]
    TooLarge { len: usize },
}

/// Encodes frame records into a reusable byte buffer.
///
/// The slice returned by [`encode`](Self::encode) borrows the codec, so it
/// stays valid exactly until the next call.
#[derive(Debug, Clone)]
pub struct MetadataCodec {
    buffer: Vec<u8>,
}

impl Default for MetadataCodec {
    fn default() -> Self {
        Self::with_capacity(1024)
    }
}

impl MetadataCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    pub fn encode(&mut self, frame: &FrameRecord) -> Result<&[u8], EncodeError> {
        let count = frame.objects.len();
        let table_end = count
            .checked_mul(OBJECT_LEN)
            .and_then(|n| n.checked_add(HEADER_LEN))
            .ok_or(EncodeError::TooLarge { len: usize::MAX })?;
        let object_count = to_u32(count)?;

        let buf = &mut self.buffer;
        buf.clear();
        buf.resize(table_end, 0);

        let source_id = push_str(buf, &frame.source_id)?;
        write_bytes(buf, header::MAGIC, &MAGIC);
        write_bytes(buf, header::VERSION, &LAYOUT_VERSION.to_le_bytes());
        write_bytes(buf, header::FRAME_NUMBER, &frame.frame_number.to_le_bytes());
        write_bytes(buf, header::WIDTH, &frame.width.to_le_bytes());
        write_bytes(buf, header::HEIGHT, &frame.height.to_le_bytes());
        write_bytes(buf, header::OBJECT_COUNT, &object_count.to_le_bytes());
        write_bytes(buf, header::TIMESTAMP, &frame.timestamp.to_le_bytes());
        write_bytes(buf, header::FPS, &frame.stats.fps.to_le_bytes());
        write_bytes(buf, header::INFERENCE_MS, &frame.stats.inference_ms.to_le_bytes());
        write_bytes(buf, header::TRACKING_MS, &frame.stats.tracking_ms.to_le_bytes());
        write_bytes(buf, header::TOTAL_MS, &frame.stats.total_ms.to_le_bytes());
        write_bytes(buf, header::SOURCE_ID, &source_id);

        for (index, obj) in frame.objects.iter().enumerate() {
            write_object(buf, object_base(index), obj)?;
        }

        let total = to_u32(buf.len())?;
        write_bytes(buf, header::TOTAL_LEN, &total.to_le_bytes());
        let checksum = crc32(&buf[CHECKSUM_START..]);
        write_bytes(buf, header::CHECKSUM, &checksum.to_le_bytes());

        trace!(
            frame_number = frame.frame_number,
            objects = count,
            bytes = total,
            "encoded frame"
        );
        Ok(&self.buffer)
    }

    /// The most recently encoded frame, empty before the first encode.
    pub fn last_encoded(&self) -> &[u8] {
        &self.buffer
    }

    /// Verify `bytes` and return a view over them.
    pub fn decode(bytes: &[u8]) -> Result<FrameView<'_>, VerifyError> {
        FrameView::new(bytes)
    }

    /// Check `bytes` without building a view.
    pub fn verify(bytes: &[u8]) -> Result<(), VerifyError> {
        verify::verify(bytes)
    }

    /// Render a record in the human-readable text form.
    pub fn to_text(frame: &FrameRecord) -> String {
        text::record_to_text(frame)
    }
}

fn write_object(buf: &mut Vec<u8>, base: usize, obj: &ObjectRecord) -> Result<(), EncodeError> {
    let class_name = push_str(buf, &obj.class_name)?;
    let text = push_str(buf, &obj.text)?;
    let flags = if obj.is_overspeed { FLAG_OVERSPEED } else { 0 };

    let fields: [(usize, &[u8]); 13] = [
        (object::TRACK_ID, &obj.track_id.to_le_bytes()),
        (object::BBOX_X, &obj.bbox.x.to_le_bytes()),
        (object::BBOX_Y, &obj.bbox.y.to_le_bytes()),
        (object::BBOX_WIDTH, &obj.bbox.width.to_le_bytes()),
        (object::BBOX_HEIGHT, &obj.bbox.height.to_le_bytes()),
        (object::CLASS_ID, &obj.class_id.to_le_bytes()),
        (object::CONFIDENCE, &obj.confidence.to_le_bytes()),
        (object::SPEED, &obj.speed.unwrap_or(SPEED_UNKNOWN).to_le_bytes()),
        (object::TEXT_CONFIDENCE, &obj.text_confidence.to_le_bytes()),
        (object::TIMESTAMP, &obj.timestamp.to_le_bytes()),
        (object::CLASS_NAME, &class_name),
        (object::TEXT, &text),
        (object::FLAGS, &flags.to_le_bytes()),
    ];
    for (offset, bytes) in fields {
        write_bytes(buf, base + offset, bytes);
    }
    Ok(())
}

/// Append a string to the heap and return its encoded (offset, length).
fn push_str(buf: &mut Vec<u8>, s: &str) -> Result<[u8; 8], EncodeError> {
    let offset = to_u32(buf.len())?;
    let len = to_u32(s.len())?;
    buf.extend_from_slice(s.as_bytes());

    let mut out = [0u8; 8];
    out[..4].copy_from_slice(&offset.to_le_bytes());
    out[4..].copy_from_slice(&len.to_le_bytes());
    Ok(out)
}

fn to_u32(len: usize) -> Result<u32, EncodeError> {
    u32::try_from(len).map_err(|_| EncodeError::TooLarge { len })
}
