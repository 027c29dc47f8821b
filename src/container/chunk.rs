//! Chunk framing
//!
//! Every record in the stream, top-level or nested inside a frame, starts
//! with the same 6-byte header. The declared `size` includes that header and
//! is the only thing ever used to step over a chunk, which keeps unknown
//! chunk types skippable.

use super::{ByteReader, FormatError};

pub const CHUNK_HEADER_SIZE: usize = 6;

pub const TAG_COLOR_256: u16 = 4;
pub const TAG_DELTA_WORD: u16 = 7;
pub const TAG_COLOR_64: u16 = 11;
pub const TAG_DELTA_LINE: u16 = 12;
pub const TAG_BLACK: u16 = 13;
pub const TAG_BYTE_RUN: u16 = 15;
pub const TAG_COPY: u16 = 16;
pub const TAG_POSTAGE_STAMP: u16 = 18;
pub const TAG_AUDIO: u16 = 0xAAAA;
pub const TAG_PREFIX: u16 = 0xF100;
pub const TAG_FRAME: u16 = 0xF1FA;

/// Chunk kinds this player knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkType {
    /// Frame boundary holding nested pixel/palette chunks.
    Frame,
    /// Animator Pro settings; no pixel data.
    Prefix,
    /// Interleaved 8-bit PCM.
    Audio,
    /// Palette, 8 bits per channel.
    Color256,
    /// Palette, 6 bits per channel.
    Color64,
    /// Word-oriented delta ("SS2").
    DeltaWord,
    /// Line-oriented byte delta.
    DeltaLine,
    Black,
    ByteRun,
    Copy,
    /// Thumbnail image, never displayed.
    PostageStamp,
    Unknown(u16),
}

impl ChunkType {
    pub fn from_tag(tag: u16) -> Self {
        match tag {
            TAG_FRAME => Self::Frame,
            TAG_PREFIX => Self::Prefix,
            TAG_AUDIO => Self::Audio,
            TAG_COLOR_256 => Self::Color256,
            TAG_COLOR_64 => Self::Color64,
            TAG_DELTA_WORD => Self::DeltaWord,
            TAG_DELTA_LINE => Self::DeltaLine,
            TAG_BLACK => Self::Black,
            TAG_BYTE_RUN => Self::ByteRun,
            TAG_COPY => Self::Copy,
            TAG_POSTAGE_STAMP => Self::PostageStamp,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub size: u32,
    pub type_tag: u16,
}

impl ChunkHeader {
    /// Reads the chunk header at `offset` within `data`.
    pub fn read_at(data: &[u8], offset: usize) -> Result<Self, FormatError> {
        let mut r = ByteReader::at(data, offset);
        let size = r.read_u32()?;
        let type_tag = r.read_u16()?;
        Ok(Self { size, type_tag })
    }

    #[inline]
    pub fn chunk_type(&self) -> ChunkType {
        ChunkType::from_tag(self.type_tag)
    }

    /// Absolute end offset of this chunk when it starts at `offset`,
    /// validated against a container of `len` bytes.
    pub fn end_within(&self, offset: usize, len: usize) -> Result<usize, FormatError> {
        if (self.size as usize) < CHUNK_HEADER_SIZE {
            return Err(FormatError::UndersizedChunk {
                offset,
                size: self.size,
            });
        }
        match offset.checked_add(self.size as usize) {
            Some(end) if end <= len => Ok(end),
            _ => Err(FormatError::ChunkOverrun {
                offset,
                size: self.size,
                len,
            }),
        }
    }

    pub fn to_bytes(&self) -> [u8; CHUNK_HEADER_SIZE] {
        let mut out = [0u8; CHUNK_HEADER_SIZE];
        out[0..4].copy_from_slice(&self.size.to_le_bytes());
        out[4..6].copy_from_slice(&self.type_tag.to_le_bytes());
        out
    }
}
