//! FLI/FLC animation decoding and synchronized playback
//!
//! ```no_run
//! use flicplay::input::NoEvents;
//! use flicplay::sound::null::NullAudioDevice;
//! use flicplay::video::null::NullSurface;
//! use flicplay::{Collaborators, Session};
//!
//! let collaborators = Collaborators {
//!     surface: Box::new(NullSurface::new()),
//!     audio: Box::new(NullAudioDevice::new()),
//!     events: Box::new(NoEvents),
//! };
//! let mut session = Session::init("intro.flc".as_ref(), collaborators)?;
//! session.play(false);
//! session.deinit();
//! # Ok::<(), flicplay::LoadError>(())
//! ```

pub mod cli;
pub mod config;
pub mod container;
pub mod input;
pub mod logging;
#[cfg(feature = "sdl")]
pub mod sdl;
pub mod sound;
pub mod time;
pub mod video;

pub use cli::Cli;
pub use config::Options;
pub use logging::LogLevel;
pub use video::player::{Collaborators, LoadError, PlaybackState, PlayerConfig, Session};
