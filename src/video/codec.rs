//! Pixel chunk codecs
//!
//! Each codec takes a chunk payload (already past its 6-byte chunk header)
//! and writes into the [`Framebuffer`] in place. Every read from the payload
//! and every write into a row is bounds-checked; malformed input fails with a
//! [`CodecError`] instead of touching memory outside the frame.

use super::{CodecError, Framebuffer};
use crate::container::ByteReader;

/// Borrows `len` pixels of `row` starting at `column`, or reports the overflow.
fn span(
    row: &mut [u8],
    y: usize,
    column: usize,
    len: usize,
) -> Result<&mut [u8], CodecError> {
    let width = row.len();
    match column.checked_add(len) {
        Some(end) if end <= width => Ok(&mut row[column..end]),
        _ => Err(CodecError::RunOverflow {
            row: y,
            column,
            len,
            width,
        }),
    }
}

// ============================================================================
// ByteRun (full frame)
// ============================================================================

/// Full-frame run-length image.
///
/// Each row starts with a legacy packet-count byte that is ignored; the row
/// is decoded until `width` pixels exist. A positive op copies `op` literal
/// bytes, a negative op repeats the next byte `-op` times.
///
/// A payload that ends cleanly on a row boundary leaves the remaining rows
/// as they were.
pub fn decode_byte_run(payload: &[u8], fb: &mut Framebuffer) -> Result<(), CodecError> {
    let mut r = ByteReader::new(payload);
    let height = fb.height();

    for y in 0..height {
        // One stray pad byte may follow the last encoded row.
        if r.remaining() < 2 {
            log::debug!("byte run ended after {} of {} rows", y, height);
            break;
        }
        let row = fb.row_mut(y)?;
        let width = row.len();
        let _packets = r.read_u8()?;

        let mut x = 0;
        while x < width {
            let op = r.read_i8()?;
            if op > 0 {
                let len = op as usize;
                let src = r.take(len)?;
                span(row, y, x, len)?.copy_from_slice(src);
                x += len;
            } else if op < 0 {
                let len = op.unsigned_abs() as usize;
                let value = r.read_u8()?;
                span(row, y, x, len)?.fill(value);
                x += len;
            }
        }
    }

    Ok(())
}

// ============================================================================
// LineCompressed (byte delta)
// ============================================================================

/// Delta against the previous frame, addressed by rows.
///
/// ```text
/// u16 first row, u16 row count
/// per row:    u8 packet count
/// per packet: u8 column skip, i8 op (+n literal bytes, -n one fill byte)
/// ```
pub fn decode_line_delta(payload: &[u8], fb: &mut Framebuffer) -> Result<(), CodecError> {
    let mut r = ByteReader::new(payload);
    let first = r.read_u16()? as usize;
    let rows = r.read_u16()? as usize;

    for y in first..first + rows {
        let row = fb.row_mut(y)?;
        let packets = r.read_u8()?;
        let mut x = 0usize;

        for _ in 0..packets {
            x += r.read_u8()? as usize;
            let op = r.read_i8()?;
            if op >= 0 {
                let len = op as usize;
                let src = r.take(len)?;
                span(row, y, x, len)?.copy_from_slice(src);
                x += len;
            } else {
                let len = op.unsigned_abs() as usize;
                let value = r.read_u8()?;
                span(row, y, x, len)?.fill(value);
                x += len;
            }
        }
    }

    Ok(())
}

// ============================================================================
// WordCompressed ("SS2", word delta)
// ============================================================================

/// One 16-bit line opcode, classified by its top two bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOp {
    /// `11`: skip this many rows; the logical row is not consumed.
    SkipLines(u16),
    /// `10`: write this value to the row's last column after its packets.
    SetLastPixel(u8),
    /// `00`: number of column packets on this row.
    PacketCount(u16),
}

impl LineOp {
    pub fn decode(raw: u16) -> Result<Self, CodecError> {
        match raw & 0xC000 {
            0xC000 => Ok(Self::SkipLines((raw as i16).unsigned_abs())),
            0x8000 => Ok(Self::SetLastPixel((raw & 0x00FF) as u8)),
            0x0000 => Ok(Self::PacketCount(raw)),
            _ => Err(CodecError::UndefinedOpcode(raw)),
        }
    }
}

/// Delta against the previous frame in 2-pixel units.
///
/// ```text
/// u16 logical row count
/// per row:    one or more u16 line opcodes, ending with a packet count
/// per packet: u8 column skip (pixels), i8 op
///             +n copies 2n literal bytes, -n repeats one 2-byte pattern n times
/// ```
///
/// Skip-lines and set-last-pixel opcodes may precede the packet count in any
/// combination. The last-pixel value is written after the row's packets.
pub fn decode_word_delta(payload: &[u8], fb: &mut Framebuffer) -> Result<(), CodecError> {
    let mut r = ByteReader::new(payload);
    let lines = r.read_u16()?;
    let mut y = 0usize;

    for _ in 0..lines {
        let mut last_pixel: Option<u8> = None;
        let packets = loop {
            match LineOp::decode(r.read_u16()?)? {
                LineOp::SkipLines(count) => {
                    if last_pixel.is_some() {
                        log::warn!(
                            "SS2: skip of {} rows after set-last-pixel on row {}; value carried to row {}",
                            count,
                            y,
                            y + count as usize
                        );
                    }
                    y += count as usize;
                }
                LineOp::SetLastPixel(value) => {
                    if let Some(previous) = last_pixel {
                        log::warn!(
                            "SS2: repeated set-last-pixel on row {} ({} replaced by {})",
                            y,
                            previous,
                            value
                        );
                    }
                    last_pixel = Some(value);
                }
                LineOp::PacketCount(count) => break count,
            }
        };

        let row = fb.row_mut(y)?;
        let mut x = 0usize;
        for _ in 0..packets {
            x += r.read_u8()? as usize;
            let op = r.read_i8()?;
            if op >= 0 {
                let len = op as usize * 2;
                let src = r.take(len)?;
                span(row, y, x, len)?.copy_from_slice(src);
                x += len;
            } else {
                let words = op.unsigned_abs() as usize;
                let pattern = r.take(2)?;
                for pair in span(row, y, x, words * 2)?.chunks_exact_mut(2) {
                    pair.copy_from_slice(pattern);
                }
                x += words * 2;
            }
        }

        if let Some(value) = last_pixel {
            if let Some(last) = row.last_mut() {
                *last = value;
            }
        }
        y += 1;
    }

    Ok(())
}

// ============================================================================
// RawCopy / Black (full frame)
// ============================================================================

/// Uncompressed image: `height` rows of `width` bytes.
pub fn decode_copy(payload: &[u8], fb: &mut Framebuffer) -> Result<(), CodecError> {
    let mut r = ByteReader::new(payload);
    for y in 0..fb.height() {
        let row = fb.row_mut(y)?;
        let src = r.take(row.len())?;
        row.copy_from_slice(src);
    }
    Ok(())
}

/// Clears every row to palette index 0. Reads no payload.
pub fn decode_black(fb: &mut Framebuffer) -> Result<(), CodecError> {
    for y in 0..fb.height() {
        fb.row_mut(y)?.fill(0);
    }
    Ok(())
}
