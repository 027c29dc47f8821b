use sdl2::event::{Event, WindowEvent};
use sdl2::keyboard::Scancode;
use sdl2::EventPump;

use crate::input::{EventSource, PlayerEvent};

/// Maps SDL input to player events; everything else is dropped.
pub struct SdlEvents {
    pump: EventPump,
}

impl SdlEvents {
    pub(super) fn new(pump: EventPump) -> Self {
        Self { pump }
    }
}

impl EventSource for SdlEvents {
    fn poll(&mut self) -> Option<PlayerEvent> {
        while let Some(event) = self.pump.poll_event() {
            match event {
                Event::Quit { .. } => return Some(PlayerEvent::Cancel),
                Event::KeyDown {
                    scancode: Some(Scancode::Escape | Scancode::Space | Scancode::Return),
                    ..
                } => return Some(PlayerEvent::Cancel),
                Event::MouseButtonDown { .. } => return Some(PlayerEvent::Cancel),
                Event::Window {
                    win_event: WindowEvent::Resized(w, h),
                    ..
                } => {
                    return Some(PlayerEvent::Resize {
                        width: w.max(0) as u32,
                        height: h.max(0) as u32,
                    })
                }
                _ => {}
            }
        }
        None
    }
}
