//! Audio chunk extraction
//!
//! The extractor keeps its own cursor over the container and looks only at
//! top-level audio chunks; frames and everything else are stepped over by
//! declared size.
//!
//! # Audio chunk
//!
//! ```text
//! [6 bytes ] chunk header (size, type 0xAAAA)
//! [2 bytes ] reserved
//! [2 bytes ] sample rate (Hz)
//! [2 bytes ] channel indicator (always 1)
//! [2 bytes ] fixed
//! [2 bytes ] reserved
//! [size - 16] unsigned 8-bit mono PCM
//! ```

use super::queue::AudioQueue;
use super::AudioError;
use crate::container::{
    ByteReader, ChunkHeader, ChunkType, FormatError, CHUNK_HEADER_SIZE, HEADER_SIZE,
};

/// Bytes from the start of an audio chunk to its first sample.
pub const AUDIO_PREAMBLE_SIZE: usize = CHUNK_HEADER_SIZE + 10;

/// Format of the first audio chunk in a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    /// PCM samples carried by one audio chunk.
    pub samples_per_chunk: u32,
}

/// Result of one [`AudioExtractor::pump`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpStatus {
    /// Stopped because the loading buffer is full.
    Full { decoded: usize },
    /// No audio chunks remain.
    Exhausted { decoded: usize },
}

#[derive(Debug, Clone, Copy)]
struct ChunkFormat {
    sample_rate: u32,
    channels: u16,
}

/// Parses the audio preamble of the chunk at `offset`.
fn read_format(data: &[u8], offset: usize) -> Result<ChunkFormat, AudioError> {
    let mut r = ByteReader::at(data, offset + CHUNK_HEADER_SIZE);
    let _reserved = r.read_u16()?;
    let sample_rate = r.read_u16()? as u32;
    let channels = r.read_u16()?;
    let _fixed = r.read_u16()?;
    let _reserved = r.read_u16()?;
    if sample_rate == 0 {
        return Err(AudioError::ZeroSampleRate { offset });
    }
    Ok(ChunkFormat {
        sample_rate,
        channels,
    })
}

/// Converts unsigned 8-bit PCM to signed 16-bit with a volume multiply.
pub fn convert_samples(pcm: &[u8], volume: f32, out: &mut Vec<i16>) {
    out.extend(pcm.iter().map(|&b| {
        let centered = ((b as i32) - 128) << 8;
        (centered as f32 * volume) as i16
    }));
}

/// Finds the format of the first audio chunk without decoding anything.
///
/// Returns `None` for a silent stream, or when the chunk walk hits a
/// malformed chunk before any audio.
pub fn probe(data: &[u8]) -> Option<AudioFormat> {
    let mut offset = HEADER_SIZE;
    while offset < data.len() {
        let chunk = ChunkHeader::read_at(data, offset).ok()?;
        let end = chunk.end_within(offset, data.len()).ok()?;
        if chunk.chunk_type() == ChunkType::Audio {
            if (chunk.size as usize) < AUDIO_PREAMBLE_SIZE {
                log::warn!("audio chunk at offset {} too short for its preamble", offset);
                return None;
            }
            let format = match read_format(data, offset) {
                Ok(format) => format,
                Err(e) => {
                    log::warn!("unusable first audio chunk: {}", e);
                    return None;
                }
            };
            if format.channels != super::CHANNELS {
                log::warn!(
                    "audio chunk declares {} channels; treating as mono",
                    format.channels
                );
            }
            return Some(AudioFormat {
                sample_rate: format.sample_rate,
                channels: super::CHANNELS,
                samples_per_chunk: (chunk.size as usize - AUDIO_PREAMBLE_SIZE) as u32,
            });
        }
        offset = end;
    }
    None
}

/// Audio-side cursor over the chunk stream.
#[derive(Debug, Clone)]
pub struct AudioExtractor {
    cursor: usize,
    volume: f32,
    sample_rate: Option<u32>,
    chunks_decoded: usize,
    exhausted: bool,
    scratch: Vec<i16>,
}

impl AudioExtractor {
    /// `volume` is clamped to `0.0..=1.0`.
    pub fn new(volume: f32) -> Self {
        Self {
            cursor: HEADER_SIZE,
            volume: volume.clamp(0.0, 1.0),
            sample_rate: None,
            chunks_decoded: 0,
            exhausted: false,
            scratch: Vec::new(),
        }
    }

    /// Rate latched from the first decoded chunk.
    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    pub fn chunks_decoded(&self) -> usize {
        self.chunks_decoded
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Decodes audio chunks into `queue` while it has room.
    ///
    /// After each chunk the queue gets a chance to swap. An error leaves the
    /// cursor on the offending chunk and the extractor exhausted.
    pub fn pump(&mut self, data: &[u8], queue: &AudioQueue) -> Result<PumpStatus, AudioError> {
        let mut decoded = 0;
        while !self.exhausted {
            if !queue.has_room() {
                return Ok(PumpStatus::Full { decoded });
            }
            let Some((offset, chunk)) = self.next_audio_chunk(data)? else {
                self.exhausted = true;
                break;
            };
            if let Err(e) = self.decode_chunk(data, offset, chunk, queue) {
                self.exhausted = true;
                return Err(e);
            }
            self.cursor = offset + chunk.size as usize;
            decoded += 1;
            queue.try_swap();
        }
        Ok(PumpStatus::Exhausted { decoded })
    }

    /// Moves the cursor to the next audio chunk, if any.
    fn next_audio_chunk(
        &mut self,
        data: &[u8],
    ) -> Result<Option<(usize, ChunkHeader)>, AudioError> {
        while self.cursor < data.len() {
            let header = ChunkHeader::read_at(data, self.cursor).and_then(|chunk| {
                chunk.end_within(self.cursor, data.len()).map(|end| (chunk, end))
            });
            let (chunk, end) = match header {
                Ok(found) => found,
                Err(e) => {
                    self.exhausted = true;
                    return Err(e.into());
                }
            };
            if chunk.chunk_type() == ChunkType::Audio {
                return Ok(Some((self.cursor, chunk)));
            }
            self.cursor = end;
        }
        Ok(None)
    }

    /// Decodes one audio chunk whose bounds were already validated.
    pub fn decode_chunk(
        &mut self,
        data: &[u8],
        offset: usize,
        chunk: ChunkHeader,
        queue: &AudioQueue,
    ) -> Result<(), AudioError> {
        if (chunk.size as usize) < AUDIO_PREAMBLE_SIZE {
            return Err(AudioError::Truncated(FormatError::UnexpectedEnd {
                offset: offset + CHUNK_HEADER_SIZE,
                needed: AUDIO_PREAMBLE_SIZE - CHUNK_HEADER_SIZE,
                available: (chunk.size as usize).saturating_sub(CHUNK_HEADER_SIZE),
            }));
        }
        let format = read_format(data, offset)?;
        match self.sample_rate {
            None => {
                log::info!("audio stream: {} Hz mono", format.sample_rate);
                self.sample_rate = Some(format.sample_rate);
            }
            Some(expected) if expected != format.sample_rate => {
                return Err(AudioError::FormatMismatch {
                    expected,
                    found: format.sample_rate,
                });
            }
            Some(_) => {}
        }

        let pcm_len = (chunk.size as usize).saturating_sub(AUDIO_PREAMBLE_SIZE);
        let pcm = ByteReader::at(data, offset + AUDIO_PREAMBLE_SIZE).take(pcm_len)?;

        self.scratch.clear();
        convert_samples(pcm, self.volume, &mut self.scratch);
        queue.write(&self.scratch);
        self.chunks_decoded += 1;
        Ok(())
    }
}
