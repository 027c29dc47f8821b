//! Video subsystem
//!
//! Decodes the frame chunks of an FLI/FLC stream into an 8-bit indexed
//! [`Framebuffer`] plus a 256-entry [`Palette`], and drives presentation
//! through a [`Surface`].
//!
//! # Carry-forward
//!
//! The framebuffer is never cleared between frames. Delta chunks only touch
//! the rows and columns they address, so every frame is the previous frame
//! plus its chunks.
//!
//! # Example
//!
//! ```
//! use flicplay::video::{Framebuffer, Palette};
//!
//! let fb = Framebuffer::new(320, 200);
//! assert!(fb.stride() >= 320);
//! assert_eq!(Palette::new().colors().len(), 256);
//! ```

pub mod codec;
pub mod decoder;
pub mod null;
pub mod palette;
pub mod player;

use crate::container::FormatError;

/// Number of palette entries in an 8-bit indexed image.
pub const PALETTE_SIZE: usize = 256;

// ============================================================================
// Error Types
// ============================================================================

/// Errors from a single pixel or palette chunk payload
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("payload truncated: {0}")]
    Truncated(#[from] FormatError),

    #[error("row {row} outside framebuffer height {height}")]
    RowOutOfRange { row: usize, height: usize },

    #[error("run of {len} pixels at row {row} column {column} overflows width {width}")]
    RunOverflow {
        row: usize,
        column: usize,
        len: usize,
        width: usize,
    },

    #[error("undefined line opcode 0x{0:04x}")]
    UndefinedOpcode(u16),

    #[error("palette update of {count} entries at index {index} overflows the table")]
    PaletteOverflow { index: usize, count: usize },
}

/// Errors that end frame decoding
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// A chunk header or declared size runs past the end of the data.
    #[error("truncated stream: {0}")]
    TruncatedStream(#[from] FormatError),

    #[error("frame at offset {offset} is malformed: {reason}")]
    MalformedFrame { offset: usize, reason: String },

    #[error("chunk 0x{tag:04x} at offset {offset}: {source}")]
    Codec {
        offset: usize,
        tag: u16,
        #[source]
        source: CodecError,
    },
}

/// Errors reported by a presentation surface
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("surface backend error: {0}")]
    Backend(String),

    #[error("frame dump failed: {0}")]
    Dump(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Framebuffer
// ============================================================================

/// `width x height` palette indices laid out with a row stride.
///
/// Bytes between `width` and `stride` on each row are padding and are never
/// written by the codecs.
#[derive(Clone, PartialEq, Eq)]
pub struct Framebuffer {
    width: usize,
    height: usize,
    stride: usize,
    pixels: Vec<u8>,
}

impl Framebuffer {
    /// Creates a zeroed framebuffer with rows padded to a 4-byte multiple.
    pub fn new(width: usize, height: usize) -> Self {
        Self::with_stride(width, height, (width + 3) & !3)
    }

    /// Creates a zeroed framebuffer with an explicit stride (at least `width`).
    pub fn with_stride(width: usize, height: usize, stride: usize) -> Self {
        let stride = stride.max(width);
        Self {
            width,
            height,
            stride,
            pixels: vec![0; stride * height],
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Raw backing store including row padding.
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// The visible `width` bytes of row `y`.
    pub fn row(&self, y: usize) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let start = y * self.stride;
        Some(&self.pixels[start..start + self.width])
    }

    /// Mutable visible bytes of row `y`.
    pub fn row_mut(&mut self, y: usize) -> Result<&mut [u8], CodecError> {
        if y >= self.height {
            return Err(CodecError::RowOutOfRange {
                row: y,
                height: self.height,
            });
        }
        let start = y * self.stride;
        Ok(&mut self.pixels[start..start + self.width])
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<u8> {
        self.row(y).and_then(|row| row.get(x).copied())
    }

    /// Copies the visible area out without padding, row after row.
    pub fn to_packed(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.width * self.height);
        for y in 0..self.height {
            let start = y * self.stride;
            out.extend_from_slice(&self.pixels[start..start + self.width]);
        }
        out
    }
}

impl std::fmt::Debug for Framebuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Framebuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .finish()
    }
}

// ============================================================================
// Palette
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// 256-entry color table, starting all black.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: [Rgb; PALETTE_SIZE],
}

impl Palette {
    pub fn new() -> Self {
        Self {
            colors: [Rgb::default(); PALETTE_SIZE],
        }
    }

    #[inline]
    pub fn colors(&self) -> &[Rgb] {
        &self.colors
    }

    #[inline]
    pub fn get(&self, index: u8) -> Rgb {
        self.colors[index as usize]
    }

    pub fn set(&mut self, index: u8, color: Rgb) {
        self.colors[index as usize] = color;
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Presentation surface
// ============================================================================

/// Where decoded frames and palette changes are shown.
pub trait Surface {
    /// Shows the visible area of an indexed framebuffer.
    fn present(
        &mut self,
        pixels: &[u8],
        width: usize,
        height: usize,
        stride: usize,
    ) -> Result<(), SurfaceError>;

    /// Replaces palette entries `start..start + colors.len()`.
    fn set_palette(&mut self, colors: &[Rgb], start: usize);

    /// Blanks the surface.
    fn clear(&mut self);

    /// The output area changed size; the next present should fill it.
    fn resize(&mut self, _width: u32, _height: u32) {}
}

impl<S: Surface + ?Sized> Surface for Box<S> {
    fn present(
        &mut self,
        pixels: &[u8],
        width: usize,
        height: usize,
        stride: usize,
    ) -> Result<(), SurfaceError> {
        (**self).present(pixels, width, height, stride)
    }

    fn set_palette(&mut self, colors: &[Rgb], start: usize) {
        (**self).set_palette(colors, start)
    }

    fn clear(&mut self) {
        (**self).clear()
    }

    fn resize(&mut self, width: u32, height: u32) {
        (**self).resize(width, height)
    }
}
