//! Null (silent) audio device
//!
//! Drains the sample source on a background thread at roughly the stream's
//! real-time rate and throws the samples away. Used for headless playback
//! and as the fallback when no output device is available.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::{AudioDevice, AudioError, SampleSource};

/// How often the drain thread wakes up.
const TICK: Duration = Duration::from_millis(20);

pub struct NullAudioDevice {
    running: Arc<AtomicBool>,
    samples_consumed: Arc<AtomicU64>,
    thread: Option<JoinHandle<()>>,
}

impl NullAudioDevice {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            samples_consumed: Arc::new(AtomicU64::new(0)),
            thread: None,
        }
    }

    /// Real samples pulled from the source so far.
    pub fn samples_consumed(&self) -> u64 {
        self.samples_consumed.load(Ordering::Relaxed)
    }

    pub fn is_open(&self) -> bool {
        self.thread.is_some()
    }
}

impl Default for NullAudioDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioDevice for NullAudioDevice {
    fn name(&self) -> &str {
        "null"
    }

    fn open(
        &mut self,
        sample_rate: u32,
        channels: u16,
        source: Arc<dyn SampleSource>,
    ) -> Result<(), AudioError> {
        self.close();

        let per_second = sample_rate as u64 * channels.max(1) as u64;
        let running = Arc::clone(&self.running);
        let consumed = Arc::clone(&self.samples_consumed);
        running.store(true, Ordering::SeqCst);

        let handle = thread::Builder::new()
            .name("null-audio".into())
            .spawn(move || {
                let started = Instant::now();
                let mut pulled = 0u64;
                let mut buf = Vec::new();
                while running.load(Ordering::SeqCst) {
                    thread::sleep(TICK);
                    let due = started.elapsed().as_millis() as u64 * per_second / 1000;
                    let want = due.saturating_sub(pulled) as usize;
                    if want == 0 {
                        continue;
                    }
                    buf.resize(want, 0);
                    let real = source.fill(&mut buf);
                    consumed.fetch_add(real as u64, Ordering::Relaxed);
                    pulled += want as u64;
                }
            })
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?;

        log::debug!("null audio device open at {} Hz", sample_rate);
        self.thread = Some(handle);
        Ok(())
    }

    fn close(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                log::warn!("null audio thread panicked");
            }
        }
    }
}

impl Drop for NullAudioDevice {
    fn drop(&mut self) {
        self.close();
    }
}
