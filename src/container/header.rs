//! Animation file header
//!
//! ```text
//! Offset | Length | Field
//! -------+--------+----------------------------------------------
//!      0 |      4 | file size (informational)
//!      4 |      2 | magic (0xAF11 FLI, 0xAF12 FLC)
//!      6 |      2 | frame count (excludes the ring frame)
//!      8 |      2 | width in pixels
//!     10 |      2 | height in pixels
//!     12 |      2 | color depth (8)
//!     14 |      2 | flags (ignored)
//!     16 |      2 | speed, hundredths of a second per frame
//!     18 |    110 | reserved
//! ```

use super::{ByteReader, FormatError};

/// Size of the fixed header; the chunk stream starts right after it.
pub const HEADER_SIZE: usize = 128;

/// Original Animator FLI files.
pub const FLI_MAGIC: u16 = 0xAF11;

/// Animator Pro FLC files.
pub const FLC_MAGIC: u16 = 0xAF12;

/// Errors from header parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeaderError {
    #[error("header truncated: {0}")]
    Truncated(#[from] FormatError),

    #[error("unrecognized container magic 0x{0:04x}")]
    BadMagic(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub file_size: u32,
    pub magic: u16,
    pub frame_count: u16,
    pub width: u16,
    pub height: u16,
    pub depth: u16,
    pub speed: u16,
}

impl FileHeader {
    /// Parses the leading header record from `data`.
    pub fn parse(data: &[u8]) -> Result<Self, HeaderError> {
        let mut r = ByteReader::new(data);
        // Require the full record so the chunk stream offset is meaningful.
        r.take(HEADER_SIZE)?;

        let mut r = ByteReader::new(data);
        let file_size = r.read_u32()?;
        let magic = r.read_u16()?;
        if magic != FLI_MAGIC && magic != FLC_MAGIC {
            return Err(HeaderError::BadMagic(magic));
        }
        let frame_count = r.read_u16()?;
        let width = r.read_u16()?;
        let height = r.read_u16()?;
        let depth = r.read_u16()?;
        let _flags = r.read_u16()?;
        let speed = r.read_u16()?;

        if depth != 8 {
            log::warn!("header declares color depth {}, decoding as 8-bit", depth);
        }

        Ok(Self {
            file_size,
            magic,
            frame_count,
            width,
            height,
            depth,
            speed,
        })
    }

    /// Encodes the header into its 128-byte on-disk form.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&self.file_size.to_le_bytes());
        out[4..6].copy_from_slice(&self.magic.to_le_bytes());
        out[6..8].copy_from_slice(&self.frame_count.to_le_bytes());
        out[8..10].copy_from_slice(&self.width.to_le_bytes());
        out[10..12].copy_from_slice(&self.height.to_le_bytes());
        out[12..14].copy_from_slice(&self.depth.to_le_bytes());
        out[16..18].copy_from_slice(&self.speed.to_le_bytes());
        out
    }

    #[inline]
    pub fn is_flc(&self) -> bool {
        self.magic == FLC_MAGIC
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> FileHeader {
        FileHeader {
            file_size: 4096,
            magic: FLC_MAGIC,
            frame_count: 12,
            width: 320,
            height: 200,
            depth: 8,
            speed: 7,
        }
    }

    #[test]
    fn test_parse_known_bytes() {
        let mut raw = [0u8; HEADER_SIZE];
        raw[4] = 0x11;
        raw[5] = 0xAF;
        raw[6] = 3;
        raw[8] = 0x40;
        raw[9] = 0x01;
        raw[10] = 200;
        raw[12] = 8;
        raw[16] = 5;

        let hdr = FileHeader::parse(&raw).unwrap();
        assert_eq!(hdr.magic, FLI_MAGIC);
        assert_eq!(hdr.frame_count, 3);
        assert_eq!(hdr.width, 320);
        assert_eq!(hdr.height, 200);
        assert_eq!(hdr.speed, 5);
        assert!(!hdr.is_flc());
    }

    #[test]
    fn test_bad_magic() {
        let mut raw = sample().to_bytes();
        raw[4] = 0x34;
        raw[5] = 0x12;
        assert_eq!(FileHeader::parse(&raw), Err(HeaderError::BadMagic(0x1234)));
    }

    #[test]
    fn test_short_header() {
        let raw = sample().to_bytes();
        let err = FileHeader::parse(&raw[..64]).unwrap_err();
        assert!(matches!(err, HeaderError::Truncated(_)));
    }

    proptest! {
        #[test]
        fn header_round_trips(
            file_size in any::<u32>(),
            flc in any::<bool>(),
            frame_count in any::<u16>(),
            width in any::<u16>(),
            height in any::<u16>(),
            speed in any::<u16>(),
        ) {
            let hdr = FileHeader {
                file_size,
                magic: if flc { FLC_MAGIC } else { FLI_MAGIC },
                frame_count,
                width,
                height,
                depth: 8,
                speed,
            };
            prop_assert_eq!(FileHeader::parse(&hdr.to_bytes()).unwrap(), hdr);
        }
    }
}
