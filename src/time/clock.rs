//! Audio/video sync clock
//!
//! Each frame is shown `delay` milliseconds after the previous frame's
//! deadline, not after the previous frame finished decoding, so decode time
//! does not accumulate as drift. While waiting, the caller's pump closure
//! runs every poll interval to keep audio flowing and to notice a skip.

use std::ops::ControlFlow;
use std::thread;
use std::time::{Duration, Instant};

/// Wake-up interval of the pacing wait.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How the per-frame delay is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayModel {
    /// Silent stream: the header speed, in hundredths of a second.
    FixedRate { speed: u16 },
    /// One frame per audio chunk.
    AudioDerived {
        sample_rate: u32,
        samples_per_chunk: u32,
    },
}

impl DelayModel {
    /// Delay in milliseconds before the next frame is due.
    ///
    /// A non-zero `override_ms` from the frame header wins for fixed-rate
    /// streams. Audio-paced streams ignore it, since the audio defines the
    /// timeline.
    pub fn frame_delay_ms(&self, override_ms: u16) -> u64 {
        match *self {
            DelayModel::FixedRate { speed } => {
                if override_ms != 0 {
                    override_ms as u64
                } else {
                    speed as u64 * 10
                }
            }
            DelayModel::AudioDerived {
                sample_rate,
                samples_per_chunk,
            } => {
                if sample_rate == 0 {
                    return 0;
                }
                1000 * samples_per_chunk as u64 / sample_rate as u64
            }
        }
    }
}

/// How a pacing wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Elapsed,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct AvSyncClock {
    last_deadline: Instant,
    poll_interval: Duration,
}

impl AvSyncClock {
    /// Starts the timeline now.
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            last_deadline: Instant::now(),
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Restarts the timeline at the current instant.
    pub fn reset(&mut self) {
        self.last_deadline = Instant::now();
    }

    /// Sleeps until `delay_ms` after the previous deadline.
    ///
    /// `pump` runs before every sleep slice, at least once; returning
    /// `ControlFlow::Break` ends the wait early with
    /// [`WaitOutcome::Cancelled`]. When the caller is more than one frame
    /// late the timeline is resynchronized to now instead of bursting
    /// frames to catch up.
    pub fn wait_until_next_deadline<F>(&mut self, delay_ms: u64, mut pump: F) -> WaitOutcome
    where
        F: FnMut() -> ControlFlow<()>,
    {
        let delay = Duration::from_millis(delay_ms);
        let deadline = self.last_deadline + delay;

        loop {
            if pump().is_break() {
                return WaitOutcome::Cancelled;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(self.poll_interval));
        }

        let now = Instant::now();
        let late = now.saturating_duration_since(deadline);
        if late > delay {
            log::debug!("pacing {} ms behind; resynchronizing", late.as_millis());
            self.last_deadline = now;
        } else {
            self.last_deadline = deadline;
        }
        WaitOutcome::Elapsed
    }
}
