//! In-memory FLI/FLC container access
//!
//! The whole animation file is loaded once into a [`ContainerBuffer`]. Video
//! and audio each walk it with their own offset; nothing ever mutates the
//! bytes after loading.
//!
//! # File Layout
//!
//! ```text
//! [128 bytes] file header (see `header`)
//! [N chunks ] { u32 size, u16 type, payload[size - 6] } ...
//! ```
//!
//! All integers are little-endian.

pub mod chunk;
pub mod header;

use std::fs;
use std::io;
use std::path::Path;

pub use chunk::{ChunkHeader, ChunkType, CHUNK_HEADER_SIZE};
pub use header::{FileHeader, FLC_MAGIC, FLI_MAGIC, HEADER_SIZE};

/// Errors raised while reading raw container bytes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("unexpected end of data at offset {offset}: need {needed} bytes, {available} available")]
    UnexpectedEnd {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("chunk at offset {offset} declares size {size}, smaller than its own header")]
    UndersizedChunk { offset: usize, size: u32 },

    #[error("chunk at offset {offset} declares size {size}, running past end of data ({len} bytes)")]
    ChunkOverrun { offset: usize, size: u32, len: usize },
}

// ============================================================================
// ContainerBuffer
// ============================================================================

/// Owned, immutable bytes of one animation file.
#[derive(Clone)]
pub struct ContainerBuffer {
    bytes: Vec<u8>,
}

impl ContainerBuffer {
    /// Reads an entire file into memory.
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self {
            bytes: fs::read(path)?,
        })
    }

    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Little-endian `u16` at an absolute offset.
    pub fn u16_at(&self, offset: usize) -> Result<u16, FormatError> {
        let mut reader = ByteReader::at(&self.bytes, offset);
        reader.read_u16()
    }

    /// Little-endian `u32` at an absolute offset.
    pub fn u32_at(&self, offset: usize) -> Result<u32, FormatError> {
        let mut reader = ByteReader::at(&self.bytes, offset);
        reader.read_u32()
    }
}

impl std::fmt::Debug for ContainerBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerBuffer")
            .field("len", &self.bytes.len())
            .finish()
    }
}

// ============================================================================
// ByteReader
// ============================================================================

/// Sequential, bounds-checked little-endian reader over a byte slice.
///
/// Every read either returns the value and advances, or fails with
/// [`FormatError::UnexpectedEnd`] leaving the position untouched.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Starts reading at `offset`. An offset past the end simply yields
    /// errors on the first read.
    pub fn at(data: &'a [u8], offset: usize) -> Self {
        Self { data, pos: offset }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Borrows the next `len` bytes and advances past them.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8], FormatError> {
        let available = self.remaining();
        if len > available {
            return Err(FormatError::UnexpectedEnd {
                offset: self.pos,
                needed: len,
                available,
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn skip(&mut self, len: usize) -> Result<(), FormatError> {
        self.take(len).map(|_| ())
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], FormatError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, FormatError> {
        Ok(self.array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, FormatError> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16, FormatError> {
        self.array().map(u16::from_le_bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32, FormatError> {
        self.array().map(u32::from_le_bytes)
    }
}
