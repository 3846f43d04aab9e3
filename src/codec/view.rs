use crate::codec::layout::{
    FLAG_OVERSPEED, header, object, object_base, read_f32, read_f64, read_i32, read_str_ref,
    read_u32, read_u64,
};
use crate::codec::text;
use crate::codec::verify::{VerifyError, verify};
use crate::geometry::Rect;
use crate::record::{FrameRecord, FrameStats, ObjectRecord};

/// Read-only access to a verified encoded frame. Nothing is copied; string
/// accessors borrow from the underlying buffer.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    buf: &'a [u8],
}

impl<'a> FrameView<'a> {
    pub fn new(buf: &'a [u8]) -> Result<Self, VerifyError> {
        verify(buf)?;
        Ok(Self { buf })
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.buf
    }

    pub fn frame_number(&self) -> u32 {
        read_u32(self.buf, header::FRAME_NUMBER)
    }

    pub fn timestamp(&self) -> f64 {
        read_f64(self.buf, header::TIMESTAMP)
    }

    pub fn source_id(&self) -> &'a str {
        heap_str(self.buf, header::SOURCE_ID)
    }

    pub fn width(&self) -> u32 {
        read_u32(self.buf, header::WIDTH)
    }

    pub fn height(&self) -> u32 {
        read_u32(self.buf, header::HEIGHT)
    }

    pub fn stats(&self) -> FrameStats {
        FrameStats {
            fps: read_f32(self.buf, header::FPS),
            inference_ms: read_f32(self.buf, header::INFERENCE_MS),
            tracking_ms: read_f32(self.buf, header::TRACKING_MS),
            total_ms: read_f32(self.buf, header::TOTAL_MS),
        }
    }

    pub fn object_count(&self) -> usize {
        read_u32(self.buf, header::OBJECT_COUNT) as usize
    }

    pub fn object(&self, index: usize) -> Option<ObjectView<'a>> {
        (index < self.object_count()).then(|| ObjectView {
            buf: self.buf,
            base: object_base(index),
        })
    }

    /// Objects in encoded order.
    pub fn objects(self) -> impl ExactSizeIterator<Item = ObjectView<'a>> {
        let buf = self.buf;
        (0..self.object_count()).map(move |index| ObjectView {
            buf,
            base: object_base(index),
        })
    }

    /// Copy the frame back into an owned record.
    pub fn to_record(&self) -> FrameRecord {
        FrameRecord {
            frame_number: self.frame_number(),
            timestamp: self.timestamp(),
            source_id: self.source_id().to_string(),
            width: self.width(),
            height: self.height(),
            stats: self.stats(),
            objects: self.objects().map(|o| o.to_record()).collect(),
        }
    }

    /// Same text a [`FrameRecord`] with these contents renders to.
    pub fn to_text(&self) -> String {
        text::view_to_text(self)
    }
}

/// One object record inside a [`FrameView`].
#[derive(Debug, Clone, Copy)]
pub struct ObjectView<'a> {
    buf: &'a [u8],
    base: usize,
}

impl<'a> ObjectView<'a> {
    pub fn track_id(&self) -> u64 {
        read_u64(self.buf, self.base + object::TRACK_ID)
    }

    pub fn bbox(&self) -> Rect {
        Rect::new(
            read_f32(self.buf, self.base + object::BBOX_X),
            read_f32(self.buf, self.base + object::BBOX_Y),
            read_f32(self.buf, self.base + object::BBOX_WIDTH),
            read_f32(self.buf, self.base + object::BBOX_HEIGHT),
        )
    }

    pub fn class_id(&self) -> i32 {
        read_i32(self.buf, self.base + object::CLASS_ID)
    }

    pub fn class_name(&self) -> &'a str {
        heap_str(self.buf, self.base + object::CLASS_NAME)
    }

    pub fn confidence(&self) -> f32 {
        read_f32(self.buf, self.base + object::CONFIDENCE)
    }

    /// Speed as stored, [`SPEED_UNKNOWN`](crate::codec::SPEED_UNKNOWN) when
    /// undetermined.
    pub fn raw_speed(&self) -> f32 {
        read_f32(self.buf, self.base + object::SPEED)
    }

    pub fn speed(&self) -> Option<f32> {
        let speed = self.raw_speed();
        (speed >= 0.0).then_some(speed)
    }

    pub fn text(&self) -> &'a str {
        heap_str(self.buf, self.base + object::TEXT)
    }

    pub fn text_confidence(&self) -> f32 {
        read_f32(self.buf, self.base + object::TEXT_CONFIDENCE)
    }

    pub fn timestamp(&self) -> f64 {
        read_f64(self.buf, self.base + object::TIMESTAMP)
    }

    pub fn is_overspeed(&self) -> bool {
        read_u32(self.buf, self.base + object::FLAGS) & FLAG_OVERSPEED != 0
    }

    pub fn to_record(&self) -> ObjectRecord {
        ObjectRecord {
            track_id: self.track_id(),
            bbox: self.bbox(),
            class_id: self.class_id(),
            class_name: self.class_name().to_string(),
            confidence: self.confidence(),
            speed: self.speed(),
            text: self.text().to_string(),
            text_confidence: self.text_confidence(),
            timestamp: self.timestamp(),
            is_overspeed: self.is_overspeed(),
        }
    }
}

// Only called on verified buffers, where every reference is in bounds and
// valid UTF-8.
fn heap_str(buf: &[u8], at: usize) -> &str {
    let (offset, len) = read_str_ref(buf, at);
    buf.get(offset..offset + len)
        .and_then(|bytes| std::str::from_utf8(bytes).ok())
        .unwrap_or_default()
}
