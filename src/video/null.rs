//! Headless presentation surface
//!
//! Counts frames and optionally writes each presented frame to
//! `<dir>/frame_NNNNN.png`, converting indices through the current palette.

use std::fs;
use std::path::PathBuf;

use super::{Palette, Rgb, Surface, SurfaceError};

#[derive(Debug, Default)]
pub struct NullSurface {
    palette: Palette,
    frames_presented: u64,
    dump_dir: Option<PathBuf>,
    size: Option<(u32, u32)>,
}

impl NullSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dumps every presented frame as PNG into `dir`, creating it if needed.
    pub fn with_dump_dir(dir: impl Into<PathBuf>) -> Result<Self, SurfaceError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dump_dir: Some(dir),
            ..Self::default()
        })
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Last size reported through [`Surface::resize`].
    pub fn output_size(&self) -> Option<(u32, u32)> {
        self.size
    }

    fn dump(
        &self,
        dir: &std::path::Path,
        pixels: &[u8],
        width: usize,
        height: usize,
        stride: usize,
    ) -> Result<(), SurfaceError> {
        let mut rgb = Vec::with_capacity(width * height * 3);
        for y in 0..height {
            for &index in &pixels[y * stride..y * stride + width] {
                let c = self.palette.get(index);
                rgb.extend_from_slice(&[c.r, c.g, c.b]);
            }
        }
        let image = image::RgbImage::from_raw(width as u32, height as u32, rgb)
            .ok_or_else(|| SurfaceError::Backend("frame buffer size mismatch".into()))?;
        let path = dir.join(format!("frame_{:05}.png", self.frames_presented));
        image.save(&path)?;
        log::debug!("wrote {}", path.display());
        Ok(())
    }
}

impl Surface for NullSurface {
    fn present(
        &mut self,
        pixels: &[u8],
        width: usize,
        height: usize,
        stride: usize,
    ) -> Result<(), SurfaceError> {
        if pixels.len() < stride * height.saturating_sub(1) + width {
            return Err(SurfaceError::Backend(format!(
                "{} bytes cannot hold {}x{} at stride {}",
                pixels.len(),
                width,
                height,
                stride
            )));
        }
        if let Some(dir) = &self.dump_dir {
            self.dump(dir, pixels, width, height, stride)?;
        }
        self.frames_presented += 1;
        Ok(())
    }

    fn set_palette(&mut self, colors: &[Rgb], start: usize) {
        for (i, &color) in colors.iter().enumerate() {
            if let Ok(index) = u8::try_from(start + i) {
                self.palette.set(index, color);
            }
        }
    }

    fn clear(&mut self) {}

    fn resize(&mut self, width: u32, height: u32) {
        self.size = Some((width, height));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::Framebuffer;

    #[test]
    fn test_counts_frames() {
        let mut surface = NullSurface::new();
        let fb = Framebuffer::new(3, 3);
        surface.present(fb.pixels(), 3, 3, fb.stride()).unwrap();
        surface.present(fb.pixels(), 3, 3, fb.stride()).unwrap();
        assert_eq!(surface.frames_presented(), 2);
    }

    #[test]
    fn test_rejects_short_buffer() {
        let mut surface = NullSurface::new();
        assert!(surface.present(&[0; 5], 3, 2, 3).is_err());
        assert_eq!(surface.frames_presented(), 0);
    }

    #[test]
    fn test_dumps_png_through_palette() {
        let dir = tempfile::tempdir().unwrap();
        let mut surface = NullSurface::with_dump_dir(dir.path().join("frames")).unwrap();
        surface.set_palette(&[Rgb::new(255, 0, 0), Rgb::new(0, 0, 255)], 1);

        let mut fb = Framebuffer::with_stride(2, 1, 4);
        fb.row_mut(0).unwrap().copy_from_slice(&[1, 2]);
        surface.present(fb.pixels(), 2, 1, 4).unwrap();

        let written = image::open(dir.path().join("frames/frame_00000.png"))
            .unwrap()
            .to_rgb8();
        assert_eq!(written.dimensions(), (2, 1));
        assert_eq!(written.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(written.get_pixel(1, 0).0, [0, 0, 255]);
    }

    #[test]
    fn test_resize_recorded() {
        let mut surface = NullSurface::new();
        assert_eq!(surface.output_size(), None);
        surface.resize(640, 400);
        assert_eq!(surface.output_size(), Some((640, 400)));
    }

    #[test]
    fn test_palette_past_end_ignored() {
        let mut surface = NullSurface::new();
        surface.set_palette(&[Rgb::new(1, 1, 1); 4], 254);
        assert_eq!(surface.palette.get(255), Rgb::new(1, 1, 1));
    }
}
