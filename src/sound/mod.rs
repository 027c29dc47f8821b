//! Audio subsystem
//!
//! Audio chunks interleaved with the frames are decoded by an
//! [`extractor::AudioExtractor`] into a [`queue::AudioQueue`], and an
//! [`AudioDevice`] pulls samples back out of the queue on its own thread.
//!
//! ```text
//! ContainerBuffer --(extractor cursor)--> loading buffer
//!                                              | swap when playing is drained
//!                 AudioDevice callback <-- playing buffer
//! ```

pub mod extractor;
pub mod null;
pub mod queue;

use std::sync::Arc;

use crate::container::FormatError;

/// Channel count of every audio stream this player handles.
pub const CHANNELS: u16 = 1;

/// Errors from the audio path
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AudioError {
    /// A later audio chunk disagrees with the rate latched from the first.
    #[error("audio format mismatch: stream opened at {expected} Hz, chunk is {found} Hz")]
    FormatMismatch { expected: u32, found: u32 },

    #[error("audio chunk truncated: {0}")]
    Truncated(#[from] FormatError),

    #[error("audio chunk at offset {offset} declares a zero sample rate")]
    ZeroSampleRate { offset: usize },

    #[error("audio device initialization failed: {0}")]
    DeviceInit(String),
}

/// Pull side of the audio queue, as seen by a device callback.
pub trait SampleSource: Send + Sync {
    /// Fills `out` completely; returns how many samples were real audio.
    /// Anything past that count is silence.
    fn fill(&self, out: &mut [i16]) -> usize;
}

/// Audio output device
///
/// The device owns its playback thread and calls back into the
/// [`SampleSource`] for signed 16-bit samples.
pub trait AudioDevice {
    fn name(&self) -> &str;

    /// Opens the device at the stream's format and starts pulling.
    fn open(
        &mut self,
        sample_rate: u32,
        channels: u16,
        source: Arc<dyn SampleSource>,
    ) -> Result<(), AudioError>;

    /// Stops pulling. Safe to call when not open.
    fn close(&mut self);
}

impl<D: AudioDevice + ?Sized> AudioDevice for Box<D> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn open(
        &mut self,
        sample_rate: u32,
        channels: u16,
        source: Arc<dyn SampleSource>,
    ) -> Result<(), AudioError> {
        (**self).open(sample_rate, channels, source)
    }

    fn close(&mut self) {
        (**self).close()
    }
}
