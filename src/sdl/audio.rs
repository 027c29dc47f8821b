use std::sync::Arc;

use sdl2::audio::{AudioCallback, AudioSpecDesired};
use sdl2::AudioSubsystem;

use crate::sound::{AudioDevice, AudioError, SampleSource};

/// Runs on SDL's audio thread.
struct PullCallback {
    source: Arc<dyn SampleSource>,
}

impl AudioCallback for PullCallback {
    type Channel = i16;

    fn callback(&mut self, out: &mut [i16]) {
        self.source.fill(out);
    }
}

pub struct SdlAudioDevice {
    subsystem: Option<AudioSubsystem>,
    device: Option<sdl2::audio::AudioDevice<PullCallback>>,
}

impl SdlAudioDevice {
    pub(super) fn new(subsystem: Option<AudioSubsystem>) -> Self {
        Self {
            subsystem,
            device: None,
        }
    }
}

impl AudioDevice for SdlAudioDevice {
    fn name(&self) -> &str {
        "sdl2"
    }

    fn open(
        &mut self,
        sample_rate: u32,
        channels: u16,
        source: Arc<dyn SampleSource>,
    ) -> Result<(), AudioError> {
        self.close();
        let subsystem = self
            .subsystem
            .as_ref()
            .ok_or_else(|| AudioError::DeviceInit("no SDL2 audio subsystem".into()))?;

        let desired = AudioSpecDesired {
            freq: Some(sample_rate as i32),
            channels: Some(channels as u8),
            samples: None,
        };
        let device = subsystem
            .open_playback(None, &desired, |spec| {
                log::debug!(
                    "SDL2 audio spec: {} Hz, {} channels, {} samples",
                    spec.freq,
                    spec.channels,
                    spec.samples
                );
                PullCallback { source }
            })
            .map_err(AudioError::DeviceInit)?;
        device.resume();
        self.device = Some(device);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(device) = self.device.take() {
            device.pause();
        }
    }
}
