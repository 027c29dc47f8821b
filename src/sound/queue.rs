//! Double-buffered PCM queue
//!
//! Two [`AudioBuffer`]s alternate between the "loading" role (appended to by
//! the decode thread) and the "playing" role (drained by the device
//! callback). Both roles live in one [`BufferPair`] behind a single
//! `parking_lot::Mutex`, so a swap exchanges them as a unit.
//!
//! The lock is held only to append, to swap, or to copy samples out. No
//! caller ever waits or touches a device while holding it.

use parking_lot::Mutex;

use super::SampleSource;

/// One half of the queue.
#[derive(Debug, Clone, Default)]
pub struct AudioBuffer {
    samples: Vec<i16>,
    capacity: usize,
    /// Samples not yet handed to the consumer.
    sample_count: usize,
    read_cursor: usize,
}

impl AudioBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
            sample_count: 0,
            read_cursor: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    #[inline]
    pub fn read_cursor(&self) -> usize {
        self.read_cursor
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }

    fn append(&mut self, samples: &[i16]) {
        self.samples.extend_from_slice(samples);
        self.sample_count += samples.len();
    }

    /// Copies up to `out.len()` unread samples; returns how many.
    fn drain_into(&mut self, out: &mut [i16]) -> usize {
        let n = out.len().min(self.sample_count);
        out[..n].copy_from_slice(&self.samples[self.read_cursor..self.read_cursor + n]);
        self.read_cursor += n;
        self.sample_count -= n;
        n
    }

    fn clear(&mut self) {
        self.samples.clear();
        self.sample_count = 0;
        self.read_cursor = 0;
    }
}

/// The two buffers in their current roles.
#[derive(Debug, Default)]
pub struct BufferPair {
    pub loading: AudioBuffer,
    pub playing: AudioBuffer,
}

impl BufferPair {
    /// Swaps roles iff the playing buffer is drained and there is something
    /// to play.
    fn try_swap(&mut self) -> bool {
        if self.playing.sample_count != 0 || self.loading.sample_count == 0 {
            return false;
        }
        std::mem::swap(&mut self.loading, &mut self.playing);
        self.playing.read_cursor = 0;
        self.loading.clear();
        true
    }
}

/// Counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub samples_written: u64,
    pub samples_read: u64,
    pub swaps: u64,
    /// Callback requests that could not be fully satisfied.
    pub underruns: u64,
}

#[derive(Debug, Default)]
struct Inner {
    pair: BufferPair,
    stats: QueueStats,
}

/// Shared producer/consumer queue; wrap in an `Arc` to hand to a device.
#[derive(Debug, Default)]
pub struct AudioQueue {
    inner: Mutex<Inner>,
}

impl AudioQueue {
    /// Creates a queue whose loading buffer is considered full at
    /// `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                pair: BufferPair {
                    loading: AudioBuffer::with_capacity(capacity),
                    playing: AudioBuffer::with_capacity(capacity),
                },
                stats: QueueStats::default(),
            }),
        }
    }

    /// Capacity for a buffer holding `buffer_ms` of audio at `sample_rate`.
    pub fn capacity_for(sample_rate: u32, buffer_ms: u32) -> usize {
        (sample_rate as u64 * buffer_ms as u64 / 1000) as usize
    }

    /// Appends to the loading buffer.
    pub fn write(&self, samples: &[i16]) {
        let mut inner = self.inner.lock();
        inner.pair.loading.append(samples);
        inner.stats.samples_written += samples.len() as u64;
    }

    /// Whether the producer may decode another chunk. An empty loading
    /// buffer always has room, whatever the chunk size.
    pub fn has_room(&self) -> bool {
        let inner = self.inner.lock();
        let loading = &inner.pair.loading;
        loading.sample_count == 0 || loading.sample_count < loading.capacity
    }

    /// Exchanges the buffers when the playing one is exhausted.
    pub fn try_swap(&self) -> bool {
        let mut inner = self.inner.lock();
        let swapped = inner.pair.try_swap();
        if swapped {
            inner.stats.swaps += 1;
        }
        swapped
    }

    /// Fills `out` from the playing buffer, swapping in the loading buffer
    /// whenever the playing one runs dry. The tail that no queued audio
    /// covers is zeroed. Returns the number of real samples.
    pub fn read(&self, out: &mut [i16]) -> usize {
        let mut inner = self.inner.lock();
        let mut filled = 0;

        while filled < out.len() {
            filled += inner.pair.playing.drain_into(&mut out[filled..]);
            if filled == out.len() {
                break;
            }
            if !inner.pair.try_swap() {
                break;
            }
            inner.stats.swaps += 1;
        }

        out[filled..].fill(0);
        inner.stats.samples_read += filled as u64;
        if filled < out.len() {
            inner.stats.underruns += 1;
        }
        filled
    }

    /// Samples queued in both buffers.
    pub fn queued(&self) -> usize {
        let inner = self.inner.lock();
        inner.pair.loading.sample_count + inner.pair.playing.sample_count
    }

    pub fn stats(&self) -> QueueStats {
        self.inner.lock().stats
    }

    /// Runs `f` with the buffer pair locked. Keep `f` short.
    pub fn with_pair<R>(&self, f: impl FnOnce(&BufferPair) -> R) -> R {
        f(&self.inner.lock().pair)
    }
}

impl SampleSource for AudioQueue {
    fn fill(&self, out: &mut [i16]) -> usize {
        self.read(out)
    }
}
