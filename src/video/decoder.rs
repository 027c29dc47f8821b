//! Frame chunk decoder
//!
//! Walks the top-level chunk stream that follows the file header and decodes
//! one frame per [`FrameDecoder::decode_next`] call.
//!
//! # Frame chunk
//!
//! ```text
//! [4 bytes] size (includes this header and all nested chunks)
//! [2 bytes] type 0xF1FA
//! [2 bytes] nested chunk count
//! [2 bytes] delay override in milliseconds (0 = none)
//! [6 bytes] reserved / width / height overrides (ignored)
//! [N bytes] nested chunks
//! ```
//!
//! Audio and prefix chunks are stepped over here; the audio extractor reads
//! the same bytes with its own offset. Unknown chunk types are logged and
//! skipped by their declared size.

use super::{codec, palette, CodecError, DecodeError, Framebuffer, Palette, Rgb};
use crate::container::{ByteReader, ChunkHeader, ChunkType, CHUNK_HEADER_SIZE, HEADER_SIZE};

/// Size of the fixed part of a frame chunk.
pub const FRAME_HEADER_SIZE: usize = 16;

/// What a decoded frame chunk declared about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// 0-based index of this frame in decode order.
    pub index: u32,
    /// Number of nested chunks the frame carried.
    pub sub_chunks: u16,
    /// Per-frame delay override in milliseconds; 0 when absent.
    pub delay_override_ms: u16,
}

/// Video-side cursor over the chunk stream.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    cursor: usize,
    frames_decoded: u32,
}

impl FrameDecoder {
    /// Starts at the first chunk after the file header.
    pub fn new() -> Self {
        Self::at(HEADER_SIZE)
    }

    pub fn at(offset: usize) -> Self {
        Self {
            cursor: offset,
            frames_decoded: 0,
        }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.cursor
    }

    #[inline]
    pub fn frames_decoded(&self) -> u32 {
        self.frames_decoded
    }

    /// Whether another frame chunk follows the cursor.
    ///
    /// Walks the remaining top-level chunks by declared size without decoding
    /// them. A chunk that cannot be framed counts as a frame, so that
    /// [`FrameDecoder::decode_next`] gets to report it.
    pub fn has_next_frame(&self, data: &[u8]) -> bool {
        let mut offset = self.cursor;
        while offset < data.len() {
            let Ok(chunk) = ChunkHeader::read_at(data, offset) else {
                return true;
            };
            let Ok(end) = chunk.end_within(offset, data.len()) else {
                return true;
            };
            if chunk.chunk_type() == ChunkType::Frame {
                return true;
            }
            offset = end;
        }
        false
    }

    /// Decodes the next frame chunk into `fb` and `pal`.
    ///
    /// Returns `Ok(None)` once the cursor sits exactly at the end of `data`.
    /// Any error means the stream cannot continue; the cursor is left at the
    /// offending chunk.
    pub fn decode_next(
        &mut self,
        data: &[u8],
        fb: &mut Framebuffer,
        pal: &mut Palette,
        on_palette: &mut dyn FnMut(usize, &[Rgb]),
    ) -> Result<Option<FrameInfo>, DecodeError> {
        loop {
            if self.cursor >= data.len() {
                return Ok(None);
            }

            let chunk = ChunkHeader::read_at(data, self.cursor)?;
            let end = chunk.end_within(self.cursor, data.len())?;

            match chunk.chunk_type() {
                ChunkType::Frame => {
                    let info = self.decode_frame(&data[self.cursor..end], fb, pal, on_palette)?;
                    self.cursor = end;
                    self.frames_decoded += 1;
                    return Ok(Some(info));
                }
                ChunkType::Audio | ChunkType::Prefix => {}
                other => {
                    log::warn!(
                        "skipping unexpected top-level chunk {:?} (0x{:04x}, {} bytes) at offset {}",
                        other,
                        chunk.type_tag,
                        chunk.size,
                        self.cursor
                    );
                }
            }
            self.cursor = end;
        }
    }

    /// Decodes one frame chunk; `frame` spans exactly its declared size.
    fn decode_frame(
        &self,
        frame: &[u8],
        fb: &mut Framebuffer,
        pal: &mut Palette,
        on_palette: &mut dyn FnMut(usize, &[Rgb]),
    ) -> Result<FrameInfo, DecodeError> {
        let malformed = |reason: String| DecodeError::MalformedFrame {
            offset: self.cursor,
            reason,
        };

        let mut r = ByteReader::at(frame, CHUNK_HEADER_SIZE);
        let sub_chunks = r
            .read_u16()
            .map_err(|e| malformed(format!("missing chunk count: {}", e)))?;
        let delay_override_ms = r
            .read_u16()
            .map_err(|e| malformed(format!("missing delay field: {}", e)))?;
        if frame.len() < FRAME_HEADER_SIZE {
            return Err(malformed(format!(
                "frame chunk of {} bytes is shorter than its header",
                frame.len()
            )));
        }

        let mut offset = FRAME_HEADER_SIZE;
        for n in 0..sub_chunks {
            let sub = ChunkHeader::read_at(frame, offset)
                .map_err(|e| malformed(format!("nested chunk {} header: {}", n, e)))?;
            let end = sub
                .end_within(offset, frame.len())
                .map_err(|e| malformed(format!("nested chunk {}: {}", n, e)))?;
            let payload = &frame[offset + CHUNK_HEADER_SIZE..end];

            dispatch(sub, payload, fb, pal, on_palette).map_err(|source| DecodeError::Codec {
                offset: self.cursor + offset,
                tag: sub.type_tag,
                source,
            })?;
            offset = end;
        }

        log::debug!(
            "frame {}: {} chunks, {} bytes, delay override {} ms",
            self.frames_decoded,
            sub_chunks,
            frame.len(),
            delay_override_ms
        );

        Ok(FrameInfo {
            index: self.frames_decoded,
            sub_chunks,
            delay_override_ms,
        })
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn dispatch(
    chunk: ChunkHeader,
    payload: &[u8],
    fb: &mut Framebuffer,
    pal: &mut Palette,
    on_palette: &mut dyn FnMut(usize, &[Rgb]),
) -> Result<(), CodecError> {
    match chunk.chunk_type() {
        ChunkType::Color256 => palette::decode_color_256(payload, pal, on_palette),
        ChunkType::Color64 => palette::decode_color_64(payload, pal, on_palette),
        ChunkType::DeltaWord => codec::decode_word_delta(payload, fb),
        ChunkType::DeltaLine => codec::decode_line_delta(payload, fb),
        ChunkType::ByteRun => codec::decode_byte_run(payload, fb),
        ChunkType::Copy => codec::decode_copy(payload, fb),
        ChunkType::Black => codec::decode_black(fb),
        ChunkType::PostageStamp => Ok(()),
        other => {
            log::warn!(
                "skipping unknown frame chunk {:?} ({} bytes)",
                other,
                chunk.size
            );
            Ok(())
        }
    }
}
