use thiserror::Error;

use crate::codec::layout::{
    CHECKSUM_START, HEADER_LEN, KNOWN_FLAGS, LAYOUT_VERSION, MAGIC, OBJECT_LEN, crc32, header,
    object, object_base, read_str_ref, read_u16, read_u32,
};

/// Reasons a buffer is not a well-formed encoded frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("buffer is {len} bytes, the header alone needs {min}")]
    Truncated { len: usize, min: usize },
    #[error("bad magic {0:02x?}")]
    BadMagic([u8; 4]),
    #[error("unsupported layout version {0}")]
    UnsupportedVersion(u16),
    #[error("reserved header field is {0:#06x}, expected 0")]
    ReservedNotZero(u16),
    #[error("header declares {declared} bytes, buffer has {actual}")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },
    #[error("object table of {count} entries does not fit in the buffer")]
    ObjectTableOutOfBounds { count: usize },
    #[error("{field} at {offset}+{len} lies outside the string heap")]
    StringOutOfBounds {
        field: &'static str,
        offset: usize,
        len: usize,
    },
    #[error("{field} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },
    #[error("object {index} has unknown flag bits {flags:#x}")]
    UnknownFlags { index: usize, flags: u32 },
}

/// Check every structural property a [`FrameView`](crate::FrameView) relies
/// on. After this passes, all field reads are in bounds.
pub(crate) fn verify(buf: &[u8]) -> Result<(), VerifyError> {
    if buf.len() < HEADER_LEN {
        return Err(VerifyError::Truncated {
            len: buf.len(),
            min: HEADER_LEN,
        });
    }

    let mut magic = [0u8; 4];
    magic.copy_from_slice(&buf[header::MAGIC..header::MAGIC + 4]);
    if magic != MAGIC {
        return Err(VerifyError::BadMagic(magic));
    }
    let version = read_u16(buf, header::VERSION);
    if version != LAYOUT_VERSION {
        return Err(VerifyError::UnsupportedVersion(version));
    }
    let reserved = read_u16(buf, header::RESERVED);
    if reserved != 0 {
        return Err(VerifyError::ReservedNotZero(reserved));
    }
    let declared = read_u32(buf, header::TOTAL_LEN) as usize;
    if declared != buf.len() {
        return Err(VerifyError::LengthMismatch {
            declared,
            actual: buf.len(),
        });
    }
    let stored = read_u32(buf, header::CHECKSUM);
    let computed = crc32(&buf[CHECKSUM_START..]);
    if stored != computed {
        return Err(VerifyError::ChecksumMismatch { stored, computed });
    }

    let count = read_u32(buf, header::OBJECT_COUNT) as usize;
    let heap_start = count
        .checked_mul(OBJECT_LEN)
        .and_then(|n| n.checked_add(HEADER_LEN))
        .filter(|&end| end <= buf.len())
        .ok_or(VerifyError::ObjectTableOutOfBounds { count })?;

    check_str(buf, header::SOURCE_ID, heap_start, "source_id")?;
    for index in 0..count {
        let base = object_base(index);
        check_str(buf, base + object::CLASS_NAME, heap_start, "class_name")?;
        check_str(buf, base + object::TEXT, heap_start, "text")?;
        let flags = read_u32(buf, base + object::FLAGS);
        if flags & !KNOWN_FLAGS != 0 {
            return Err(VerifyError::UnknownFlags { index, flags });
        }
    }
    Ok(())
}

fn check_str(
    buf: &[u8],
    at: usize,
    heap_start: usize,
    field: &'static str,
) -> Result<(), VerifyError> {
    let (offset, len) = read_str_ref(buf, at);
    let end = offset
        .checked_add(len)
        .filter(|&end| offset >= heap_start && end <= buf.len())
        .ok_or(VerifyError::StringOutOfBounds { field, offset, len })?;
    std::str::from_utf8(&buf[offset..end]).map_err(|_| VerifyError::InvalidUtf8 { field })?;
    Ok(())
}
