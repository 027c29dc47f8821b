//! SDL2 backends (`sdl` feature)
//!
//! One [`SdlBackend::open`] call initializes SDL and hands out the three
//! collaborators a session needs. All of them must stay on the thread that
//! created them, except for the audio callback SDL runs itself.

mod audio;
mod events;
mod surface;

pub use audio::SdlAudioDevice;
pub use events::SdlEvents;
pub use surface::SdlSurface;

use crate::video::player::Collaborators;
use crate::video::SurfaceError;

pub struct SdlBackend {
    pub surface: SdlSurface,
    pub audio: SdlAudioDevice,
    pub events: SdlEvents,
}

impl SdlBackend {
    /// Opens a window sized `width x height` times `scale`.
    pub fn open(title: &str, width: u32, height: u32, scale: u32) -> Result<Self, SurfaceError> {
        log::info!("Initializing SDL2");
        let context = sdl2::init().map_err(|e| SurfaceError::Backend(format!("SDL2 init: {}", e)))?;

        let audio = match context.audio() {
            Ok(subsystem) => SdlAudioDevice::new(Some(subsystem)),
            Err(e) => {
                log::warn!("SDL2 audio subsystem unavailable: {}", e);
                SdlAudioDevice::new(None)
            }
        };
        let events = context
            .event_pump()
            .map_err(|e| SurfaceError::Backend(format!("event pump: {}", e)))?;
        let surface = SdlSurface::new(context, title, width, height, scale)?;

        Ok(Self {
            surface,
            audio,
            events: SdlEvents::new(events),
        })
    }

    pub fn into_collaborators(self) -> Collaborators {
        Collaborators {
            surface: Box::new(self.surface),
            audio: Box::new(self.audio),
            events: Box::new(self.events),
        }
    }
}
