//! Byte offsets of the wire layout and little-endian access helpers.

pub const MAGIC: [u8; 4] = *b"SPFM";
pub const LAYOUT_VERSION: u16 = 1;

/// Wire value of an undetermined speed.
pub const SPEED_UNKNOWN: f32 = -1.0;

pub(crate) const HEADER_LEN: usize = 64;
pub(crate) const OBJECT_LEN: usize = 68;

/// Bytes before this offset are validated field by field, bytes from here
/// on are covered by the checksum.
pub(crate) const CHECKSUM_START: usize = 16;

pub(crate) const FLAG_OVERSPEED: u32 = 1;
pub(crate) const KNOWN_FLAGS: u32 = FLAG_OVERSPEED;

pub(crate) mod header {
    pub const MAGIC: usize = 0;
    pub const VERSION: usize = 4;
    pub const RESERVED: usize = 6;
    pub const TOTAL_LEN: usize = 8;
    pub const CHECKSUM: usize = 12;
    pub const FRAME_NUMBER: usize = 16;
    pub const WIDTH: usize = 20;
    pub const HEIGHT: usize = 24;
    pub const OBJECT_COUNT: usize = 28;
    pub const TIMESTAMP: usize = 32;
    pub const FPS: usize = 40;
    pub const INFERENCE_MS: usize = 44;
    pub const TRACKING_MS: usize = 48;
    pub const TOTAL_MS: usize = 52;
    pub const SOURCE_ID: usize = 56;
}

pub(crate) mod object {
    pub const TRACK_ID: usize = 0;
    pub const BBOX_X: usize = 8;
    pub const BBOX_Y: usize = 12;
    pub const BBOX_WIDTH: usize = 16;
    pub const BBOX_HEIGHT: usize = 20;
    pub const CLASS_ID: usize = 24;
    pub const CONFIDENCE: usize = 28;
    pub const SPEED: usize = 32;
    pub const TEXT_CONFIDENCE: usize = 36;
    pub const TIMESTAMP: usize = 40;
    pub const CLASS_NAME: usize = 48;
    pub const TEXT: usize = 56;
    pub const FLAGS: usize = 64;
}

/// Start of the `index`-th object record.
#[inline]
pub(crate) fn object_base(index: usize) -> usize {
    HEADER_LEN + index * OBJECT_LEN
}

// Readers assume the range was checked by verification.

#[inline]
fn read_array<const N: usize>(buf: &[u8], at: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[at..at + N]);
    out
}

#[inline]
pub(crate) fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes(read_array(buf, at))
}

#[inline]
pub(crate) fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(read_array(buf, at))
}

#[inline]
pub(crate) fn read_i32(buf: &[u8], at: usize) -> i32 {
    i32::from_le_bytes(read_array(buf, at))
}

#[inline]
pub(crate) fn read_u64(buf: &[u8], at: usize) -> u64 {
    u64::from_le_bytes(read_array(buf, at))
}

#[inline]
pub(crate) fn read_f32(buf: &[u8], at: usize) -> f32 {
    f32::from_le_bytes(read_array(buf, at))
}

#[inline]
pub(crate) fn read_f64(buf: &[u8], at: usize) -> f64 {
    f64::from_le_bytes(read_array(buf, at))
}

/// (offset, length) of a heap string.
#[inline]
pub(crate) fn read_str_ref(buf: &[u8], at: usize) -> (usize, usize) {
    (read_u32(buf, at) as usize, read_u32(buf, at + 4) as usize)
}

#[inline]
pub(crate) fn write_bytes(buf: &mut [u8], at: usize, bytes: &[u8]) {
    buf[at..at + bytes.len()].copy_from_slice(bytes);
}

const CRC_TABLE: [u32; 256] = crc_table();

const fn crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut c = i as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 {
                0xEDB8_8320 ^ (c >> 1)
            } else {
                c >> 1
            };
            k += 1;
        }
        table[i] = c;
        i += 1;
    }
    table
}

/// CRC-32 (IEEE 802.3, reflected).
pub fn crc32(bytes: &[u8]) -> u32 {
    let mut c = !0u32;
    for &b in bytes {
        c = CRC_TABLE[((c ^ u32::from(b)) & 0xFF) as usize] ^ (c >> 8);
    }
    !c
}
