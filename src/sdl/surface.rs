use sdl2::pixels::{Color, PixelFormatEnum};
use sdl2::render::Canvas;
use sdl2::video::Window;
use sdl2::Sdl;

use crate::video::{Palette, Rgb, Surface, SurfaceError};

/// Window surface; indexed frames are expanded to RGB24 on present.
pub struct SdlSurface {
    canvas: Canvas<Window>,
    palette: Palette,
    rgb: Vec<u8>,
    _context: Sdl,
}

impl SdlSurface {
    pub(super) fn new(
        context: Sdl,
        title: &str,
        width: u32,
        height: u32,
        scale: u32,
    ) -> Result<Self, SurfaceError> {
        let video = context
            .video()
            .map_err(|e| SurfaceError::Backend(format!("video subsystem: {}", e)))?;
        log::info!("SDL2 video driver: {}", video.current_video_driver());

        let window = video
            .window(title, width * scale, height * scale)
            .position_centered()
            .resizable()
            .build()
            .map_err(|e| SurfaceError::Backend(e.to_string()))?;

        let mut canvas = window
            .into_canvas()
            .accelerated()
            .build()
            .map_err(|e| SurfaceError::Backend(e.to_string()))?;
        log::info!("SDL2 renderer: {}", canvas.info().name);

        // Letterboxes to the animation's aspect ratio on any window size.
        canvas
            .set_logical_size(width, height)
            .map_err(|e| SurfaceError::Backend(format!("set logical size: {}", e)))?;
        sdl2::hint::set("SDL_RENDER_SCALE_QUALITY", "nearest");

        Ok(Self {
            canvas,
            palette: Palette::new(),
            rgb: Vec::new(),
            _context: context,
        })
    }
}

impl Surface for SdlSurface {
    fn present(
        &mut self,
        pixels: &[u8],
        width: usize,
        height: usize,
        stride: usize,
    ) -> Result<(), SurfaceError> {
        self.rgb.clear();
        for y in 0..height {
            let row = pixels
                .get(y * stride..y * stride + width)
                .ok_or_else(|| SurfaceError::Backend(format!("row {} out of bounds", y)))?;
            for &index in row {
                let c = self.palette.get(index);
                self.rgb.extend_from_slice(&[c.r, c.g, c.b]);
            }
        }

        // Texture is created per frame and dropped at the end of scope.
        let texture_creator = self.canvas.texture_creator();
        let mut texture = texture_creator
            .create_texture_streaming(PixelFormatEnum::RGB24, width as u32, height as u32)
            .map_err(|e| SurfaceError::Backend(format!("frame texture: {}", e)))?;
        texture
            .update(None, &self.rgb, width * 3)
            .map_err(|e| SurfaceError::Backend(format!("texture update: {}", e)))?;

        self.canvas.set_draw_color(Color::RGB(0, 0, 0));
        self.canvas.clear();
        self.canvas
            .copy(&texture, None, None)
            .map_err(|e| SurfaceError::Backend(format!("render copy: {}", e)))?;
        self.canvas.present();
        Ok(())
    }

    fn set_palette(&mut self, colors: &[Rgb], start: usize) {
        for (i, &color) in colors.iter().enumerate() {
            if let Ok(index) = u8::try_from(start + i) {
                self.palette.set(index, color);
            }
        }
    }

    fn clear(&mut self) {
        self.canvas.set_draw_color(Color::RGB(0, 0, 0));
        self.canvas.clear();
        self.canvas.present();
    }

    fn resize(&mut self, width: u32, height: u32) {
        log::info!("Window resized to {}x{}", width, height);
    }
}
