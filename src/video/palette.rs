//! Palette chunk codecs
//!
//! Both palette chunks share one packet structure:
//!
//! ```text
//! u16 packet count
//! per packet: u8 skip (entries left untouched, accumulates)
//!             u8 count (0 means 256)
//!             count x { r, g, b }
//! ```
//!
//! The 64-level variant stores 6-bit channels that are widened by a left
//! shift of two. Each packet is forwarded as soon as it has been applied.

use super::{CodecError, Palette, Rgb, PALETTE_SIZE};
use crate::container::ByteReader;

/// Applies a 256-level (8 bits per channel) palette chunk.
pub fn decode_color_256(
    payload: &[u8],
    palette: &mut Palette,
    on_update: &mut dyn FnMut(usize, &[Rgb]),
) -> Result<(), CodecError> {
    decode_packets(payload, palette, 0, on_update)
}

/// Applies a 64-level (6 bits per channel) palette chunk.
pub fn decode_color_64(
    payload: &[u8],
    palette: &mut Palette,
    on_update: &mut dyn FnMut(usize, &[Rgb]),
) -> Result<(), CodecError> {
    decode_packets(payload, palette, 2, on_update)
}

fn decode_packets(
    payload: &[u8],
    palette: &mut Palette,
    shift: u32,
    on_update: &mut dyn FnMut(usize, &[Rgb]),
) -> Result<(), CodecError> {
    let mut r = ByteReader::new(payload);
    let packets = r.read_u16()?;
    let mut index = 0usize;

    for _ in 0..packets {
        index += r.read_u8()? as usize;
        let count = match r.read_u8()? {
            0 => PALETTE_SIZE,
            n => n as usize,
        };
        if index + count > PALETTE_SIZE {
            return Err(CodecError::PaletteOverflow { index, count });
        }

        let triples = r.take(count * 3)?;
        for (slot, rgb) in palette.colors[index..index + count]
            .iter_mut()
            .zip(triples.chunks_exact(3))
        {
            *slot = Rgb::new(
                rgb[0].wrapping_shl(shift),
                rgb[1].wrapping_shl(shift),
                rgb[2].wrapping_shl(shift),
            );
        }

        on_update(index, &palette.colors[index..index + count]);
        index += count;
    }

    Ok(())
}
