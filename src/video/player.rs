//! Playback session
//!
//! A [`Session`] owns the loaded container, the framebuffer, the palette and
//! both stream cursors, and drives them against the three collaborators:
//!
//! ```text
//! loop {
//!     poll events            -> Cancel ends the loop as Skipped
//!     feed audio             -> extractor fills the queue while it has room
//!     decode one frame       -> end of data or bad chunk ends as Finished
//!     present                -> skipped for a suppressed final frame
//!     wait for the deadline  -> keeps feeding audio and polling events
//! }
//! ```
//!
//! A frame's delay, including its own override, is waited out after that
//! frame is presented, so the override sets how long the frame stays on
//! screen. The last frame is the one matching the header's frame count or
//! the last frame chunk in the file, whichever comes first.

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::decoder::FrameDecoder;
use super::{Framebuffer, Palette, Surface};
use crate::container::header::HeaderError;
use crate::container::{ContainerBuffer, FileHeader};
use crate::input::{EventSource, PlayerEvent};
use crate::sound::extractor::{self, AudioExtractor};
use crate::sound::queue::AudioQueue;
use crate::sound::{AudioDevice, AudioError};
use crate::time::{AvSyncClock, DelayModel, WaitOutcome, DEFAULT_POLL_INTERVAL};

/// Current state of playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Playing,
    /// The user cancelled.
    Skipped,
    /// End of stream, a malformed chunk, or a dead surface.
    Finished,
}

/// Errors from [`Session::init`]
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid header: {0}")]
    InvalidHeader(#[from] HeaderError),
}

/// Tunables for a session.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerConfig {
    /// Linear gain applied to decoded samples, `0.0..=1.0`.
    pub volume: f32,
    /// How often the pacing wait wakes to feed audio and poll events.
    pub poll_interval: Duration,
    /// Loading buffer size in milliseconds of audio.
    pub audio_buffer_ms: u32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            volume: 1.0,
            poll_interval: DEFAULT_POLL_INTERVAL,
            audio_buffer_ms: 250,
        }
    }
}

/// The outside world a session talks to.
pub struct Collaborators {
    pub surface: Box<dyn Surface>,
    pub audio: Box<dyn AudioDevice>,
    pub events: Box<dyn EventSource>,
}

/// Audio extraction state; `None` in the session once the path is disabled.
struct AudioPath {
    extractor: AudioExtractor,
    queue: Arc<AudioQueue>,
}

pub struct Session {
    container: ContainerBuffer,
    header: FileHeader,
    framebuffer: Framebuffer,
    palette: Palette,
    decoder: FrameDecoder,

    surface: Box<dyn Surface>,
    device: Box<dyn AudioDevice>,
    device_open: bool,
    events: Box<dyn EventSource>,
    audio: Option<AudioPath>,

    clock: AvSyncClock,
    delay_model: DelayModel,
    state: PlaybackState,
    frames_presented: u32,
}

impl Session {
    /// Loads `path` with default settings.
    pub fn init(path: &Path, collaborators: Collaborators) -> Result<Self, LoadError> {
        Self::init_with(path, collaborators, PlayerConfig::default())
    }

    pub fn init_with(
        path: &Path,
        collaborators: Collaborators,
        config: PlayerConfig,
    ) -> Result<Self, LoadError> {
        let container = ContainerBuffer::open(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("loaded {} ({} bytes)", path.display(), container.len());
        Self::from_container(container, collaborators, config)
    }

    /// Starts a session over bytes already in memory.
    ///
    /// An audio device that fails to open is logged and playback continues
    /// without sound.
    pub fn from_container(
        container: ContainerBuffer,
        collaborators: Collaborators,
        config: PlayerConfig,
    ) -> Result<Self, LoadError> {
        let header = FileHeader::parse(container.as_bytes())?;
        log::info!(
            "{} {}x{}, {} frames, speed {}",
            if header.is_flc() { "FLC" } else { "FLI" },
            header.width,
            header.height,
            header.frame_count,
            header.speed
        );

        let Collaborators {
            surface,
            audio: mut device,
            events,
        } = collaborators;

        let mut audio = None;
        let mut device_open = false;
        let delay_model = match extractor::probe(container.as_bytes()) {
            Some(format) => {
                let capacity = AudioQueue::capacity_for(format.sample_rate, config.audio_buffer_ms);
                let queue = Arc::new(AudioQueue::new(capacity));
                match device.open(format.sample_rate, format.channels, queue.clone()) {
                    Ok(()) => {
                        log::info!(
                            "audio device '{}' open at {} Hz",
                            device.name(),
                            format.sample_rate
                        );
                        device_open = true;
                        audio = Some(AudioPath {
                            extractor: AudioExtractor::new(config.volume),
                            queue,
                        });
                    }
                    Err(e) => {
                        log::warn!("{}; playing video only", e);
                    }
                }
                DelayModel::AudioDerived {
                    sample_rate: format.sample_rate,
                    samples_per_chunk: format.samples_per_chunk,
                }
            }
            None => DelayModel::FixedRate {
                speed: header.speed,
            },
        };
        log::debug!("pacing: {:?}", delay_model);

        let mut session = Self {
            framebuffer: Framebuffer::new(header.width as usize, header.height as usize),
            palette: Palette::new(),
            decoder: FrameDecoder::new(),
            container,
            header,
            surface,
            device,
            device_open,
            events,
            audio,
            clock: AvSyncClock::new(config.poll_interval),
            delay_model,
            state: PlaybackState::Playing,
            frames_presented: 0,
        };
        feed_audio(&mut session.audio, session.container.as_bytes());
        Ok(session)
    }

    /// Plays until the stream ends or the user cancels.
    ///
    /// With `suppress_final_frame` the last frame is decoded but not
    /// presented, for callers that cut straight to another scene.
    pub fn play(&mut self, suppress_final_frame: bool) -> PlaybackState {
        if self.state != PlaybackState::Playing {
            return self.state;
        }

        let frame_limit = self.header.frame_count as u32;
        let mut failed = false;
        self.clock.reset();

        loop {
            if handle_events(
                &mut *self.events,
                &mut *self.surface,
                &self.framebuffer,
                &self.palette,
            )
            .is_break()
            {
                self.state = PlaybackState::Skipped;
                break;
            }
            feed_audio(&mut self.audio, self.container.as_bytes());

            let surface = &mut self.surface;
            let decoded = self.decoder.decode_next(
                self.container.as_bytes(),
                &mut self.framebuffer,
                &mut self.palette,
                &mut |start, colors| surface.set_palette(colors, start),
            );
            let info = match decoded {
                Ok(Some(info)) => info,
                Ok(None) => {
                    log::debug!("end of stream after {} frames", self.decoder.frames_decoded());
                    self.state = PlaybackState::Finished;
                    break;
                }
                Err(e) => {
                    log::warn!("stopping playback: {}", e);
                    failed = true;
                    self.state = PlaybackState::Finished;
                    break;
                }
            };

            // Past the declared count is the ring frame looping back to the start.
            let is_final = (frame_limit != 0 && info.index + 1 >= frame_limit)
                || !self.decoder.has_next_frame(self.container.as_bytes());

            if !(is_final && suppress_final_frame) {
                let fb = &self.framebuffer;
                if let Err(e) = self
                    .surface
                    .present(fb.pixels(), fb.width(), fb.height(), fb.stride())
                {
                    log::error!("presentation failed: {}", e);
                    failed = true;
                    self.state = PlaybackState::Finished;
                    break;
                }
                self.frames_presented += 1;
            }

            let delay_ms = self.delay_model.frame_delay_ms(info.delay_override_ms);
            let Self {
                events,
                surface,
                framebuffer,
                palette,
                audio,
                container,
                clock,
                ..
            } = self;
            let outcome = clock.wait_until_next_deadline(delay_ms, || {
                feed_audio(audio, container.as_bytes());
                handle_events(&mut **events, &mut **surface, framebuffer, palette)
            });
            if outcome == WaitOutcome::Cancelled {
                self.state = PlaybackState::Skipped;
                break;
            }

            if is_final {
                self.state = PlaybackState::Finished;
                break;
            }
        }

        if self.state == PlaybackState::Skipped || failed {
            self.surface.clear();
        }
        log::info!(
            "playback {:?} after {} presented frames",
            self.state,
            self.frames_presented
        );
        self.state
    }

    /// Closes the audio device and releases the container.
    pub fn deinit(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.device_open {
            self.device.close();
            self.device_open = false;
            log::debug!("audio device '{}' closed", self.device.name());
        }
        self.audio = None;
    }

    #[inline]
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    #[inline]
    pub fn was_skipped(&self) -> bool {
        self.state == PlaybackState::Skipped
    }

    /// Frame count declared by the header.
    #[inline]
    pub fn frame_count(&self) -> u32 {
        self.header.frame_count as u32
    }

    pub fn frames_presented(&self) -> u32 {
        self.frames_presented
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn delay_model(&self) -> DelayModel {
        self.delay_model
    }

    /// Whether decoded audio is still being fed to a device.
    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Drains pending events. `Break` means the user cancelled.
fn handle_events(
    events: &mut dyn EventSource,
    surface: &mut dyn Surface,
    fb: &Framebuffer,
    palette: &Palette,
) -> ControlFlow<()> {
    while let Some(event) = events.poll() {
        match event {
            PlayerEvent::Cancel => {
                log::info!("playback cancelled");
                return ControlFlow::Break(());
            }
            PlayerEvent::Resize { width, height } => {
                log::debug!("output resized to {}x{}", width, height);
                surface.resize(width, height);
                surface.set_palette(palette.colors(), 0);
                if let Err(e) = surface.present(fb.pixels(), fb.width(), fb.height(), fb.stride()) {
                    log::warn!("re-present after resize failed: {}", e);
                }
            }
        }
    }
    ControlFlow::Continue(())
}

/// Runs the extractor; any audio error disables the audio path for good.
fn feed_audio(audio: &mut Option<AudioPath>, data: &[u8]) {
    let Some(path) = audio.as_mut() else {
        return;
    };
    match path.extractor.pump(data, &path.queue) {
        Ok(_) => {}
        Err(e @ AudioError::FormatMismatch { .. }) => {
            log::error!("{}; disabling audio", e);
            *audio = None;
        }
        Err(e) => {
            log::warn!("audio stream ended early: {}; disabling audio", e);
            *audio = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::chunk::{TAG_AUDIO, TAG_BYTE_RUN, TAG_COPY, TAG_FRAME};
    use crate::container::{ChunkHeader, FLC_MAGIC, HEADER_SIZE};
    use crate::input::{ChannelEvents, NoEvents};
    use crate::sound::null::NullAudioDevice;
    use crate::sound::SampleSource;
    use crate::video::{Rgb, SurfaceError};
    use parking_lot::Mutex;
    use std::time::Instant;

    #[derive(Default)]
    struct Record {
        frames: Vec<Vec<u8>>,
        presented_at: Vec<Instant>,
        palette_updates: usize,
        clears: usize,
        resizes: Vec<(u32, u32)>,
    }

    struct RecordingSurface(Arc<Mutex<Record>>, bool);

    impl Surface for RecordingSurface {
        fn present(
            &mut self,
            pixels: &[u8],
            width: usize,
            height: usize,
            stride: usize,
        ) -> Result<(), SurfaceError> {
            if self.1 {
                return Err(SurfaceError::Backend("gone".into()));
            }
            let mut packed = Vec::new();
            for y in 0..height {
                packed.extend_from_slice(&pixels[y * stride..y * stride + width]);
            }
            let mut record = self.0.lock();
            record.frames.push(packed);
            record.presented_at.push(Instant::now());
            Ok(())
        }

        fn set_palette(&mut self, _colors: &[Rgb], _start: usize) {
            self.0.lock().palette_updates += 1;
        }

        fn clear(&mut self) {
            self.0.lock().clears += 1;
        }

        fn resize(&mut self, width: u32, height: u32) {
            self.0.lock().resizes.push((width, height));
        }
    }

    struct FailingDevice;

    impl AudioDevice for FailingDevice {
        fn name(&self) -> &str {
            "failing"
        }

        fn open(&mut self, _: u32, _: u16, _: Arc<dyn SampleSource>) -> Result<(), AudioError> {
            Err(AudioError::DeviceInit("no device".into()))
        }

        fn close(&mut self) {}
    }

    fn chunk(tag: u16, payload: &[u8]) -> Vec<u8> {
        let mut out = ChunkHeader {
            size: (6 + payload.len()) as u32,
            type_tag: tag,
        }
        .to_bytes()
        .to_vec();
        out.extend_from_slice(payload);
        out
    }

    fn frame(subs: &[Vec<u8>]) -> Vec<u8> {
        frame_with_delay(0, subs)
    }

    fn frame_with_delay(delay_ms: u16, subs: &[Vec<u8>]) -> Vec<u8> {
        let body = subs.concat();
        let mut out = ChunkHeader {
            size: (16 + body.len()) as u32,
            type_tag: TAG_FRAME,
        }
        .to_bytes()
        .to_vec();
        out.extend_from_slice(&(subs.len() as u16).to_le_bytes());
        out.extend_from_slice(&delay_ms.to_le_bytes());
        out.extend_from_slice(&[0; 6]);
        out.extend_from_slice(&body);
        out
    }

    fn audio(rate: u16, samples: usize) -> Vec<u8> {
        let mut payload = Vec::new();
        for field in [0u16, rate, 1, 0, 0] {
            payload.extend_from_slice(&field.to_le_bytes());
        }
        payload.extend(std::iter::repeat(128u8).take(samples));
        chunk(TAG_AUDIO, &payload)
    }

    fn container(frame_count: u16, speed: u16, chunks: &[Vec<u8>]) -> ContainerBuffer {
        let header = FileHeader {
            file_size: 0,
            magic: FLC_MAGIC,
            frame_count,
            width: 4,
            height: 2,
            depth: 8,
            speed,
        };
        let mut data = header.to_bytes().to_vec();
        assert_eq!(data.len(), HEADER_SIZE);
        for c in chunks {
            data.extend_from_slice(c);
        }
        ContainerBuffer::from_vec(data)
    }

    fn recording(fail: bool) -> (Arc<Mutex<Record>>, Box<dyn Surface>) {
        let record = Arc::new(Mutex::new(Record::default()));
        (record.clone(), Box::new(RecordingSurface(record, fail)))
    }

    fn quiet(surface: Box<dyn Surface>) -> Collaborators {
        Collaborators {
            surface,
            audio: Box::new(NullAudioDevice::new()),
            events: Box::new(NoEvents),
        }
    }

    fn fast() -> PlayerConfig {
        PlayerConfig {
            poll_interval: Duration::from_millis(2),
            ..PlayerConfig::default()
        }
    }

    #[test]
    fn test_plays_to_end() {
        let data = container(
            2,
            0,
            &[
                frame(&[chunk(TAG_COPY, &[1; 8])]),
                frame(&[chunk(TAG_BYTE_RUN, &[1, 0xFE, 5, 0xFE, 6])]),
            ],
        );
        let (record, surface) = recording(false);
        let mut session = Session::from_container(data, quiet(surface), fast()).unwrap();

        assert_eq!(session.play(false), PlaybackState::Finished);
        assert!(!session.was_skipped());
        let record = record.lock();
        assert_eq!(
            record.frames,
            vec![vec![1; 8], vec![5, 5, 6, 6, 1, 1, 1, 1]]
        );
        assert_eq!(record.clears, 0);
    }

    #[test]
    fn test_ring_frame_not_shown() {
        let data = container(
            1,
            0,
            &[
                frame(&[chunk(TAG_COPY, &[1; 8])]),
                frame(&[chunk(TAG_COPY, &[9; 8])]),
            ],
        );
        let (record, surface) = recording(false);
        let mut session = Session::from_container(data, quiet(surface), fast()).unwrap();
        session.play(false);
        assert_eq!(record.lock().frames, vec![vec![1; 8]]);
    }

    #[test]
    fn test_suppressed_final_frame() {
        let data = container(
            2,
            0,
            &[frame(&[chunk(TAG_COPY, &[1; 8])]), frame(&[chunk(TAG_COPY, &[2; 8])])],
        );
        let (record, surface) = recording(false);
        let mut session = Session::from_container(data, quiet(surface), fast()).unwrap();

        assert_eq!(session.play(true), PlaybackState::Finished);
        assert_eq!(record.lock().frames, vec![vec![1; 8]]);
        assert_eq!(session.framebuffer().to_packed(), vec![2; 8]);
    }

    #[rstest::rstest]
    #[case::no_declared_count(0)]
    #[case::overstated_count(5)]
    fn test_suppressed_final_frame_found_from_stream(#[case] frame_count: u16) {
        let data = container(
            frame_count,
            0,
            &[
                frame(&[chunk(TAG_COPY, &[1; 8])]),
                frame(&[chunk(TAG_COPY, &[2; 8])]),
                audio(8000, 16),
            ],
        );
        let (record, surface) = recording(false);
        let collab = Collaborators {
            surface,
            audio: Box::new(FailingDevice),
            events: Box::new(NoEvents),
        };
        let mut session = Session::from_container(data, collab, fast()).unwrap();

        assert_eq!(session.play(true), PlaybackState::Finished);
        assert_eq!(record.lock().frames, vec![vec![1; 8]]);
        assert_eq!(session.framebuffer().to_packed(), vec![2; 8]);
    }

    #[test]
    fn test_last_frame_shown_without_declared_count() {
        let data = container(
            0,
            0,
            &[frame(&[chunk(TAG_COPY, &[1; 8])]), frame(&[chunk(TAG_COPY, &[2; 8])])],
        );
        let (record, surface) = recording(false);
        let mut session = Session::from_container(data, quiet(surface), fast()).unwrap();

        assert_eq!(session.play(false), PlaybackState::Finished);
        assert_eq!(record.lock().frames, vec![vec![1; 8], vec![2; 8]]);
    }

    #[test]
    fn test_delay_override_holds_its_own_frame() {
        let data = container(
            2,
            0,
            &[
                frame_with_delay(60, &[chunk(TAG_COPY, &[1; 8])]),
                frame_with_delay(0, &[chunk(TAG_COPY, &[2; 8])]),
            ],
        );
        let (record, surface) = recording(false);
        let mut session = Session::from_container(data, quiet(surface), fast()).unwrap();
        session.play(false);

        let record = record.lock();
        assert_eq!(record.presented_at.len(), 2);
        let held = record.presented_at[1].duration_since(record.presented_at[0]);
        // Deadlines run from the start of playback, not from the first present.
        assert!(held >= Duration::from_millis(50));
    }

    #[test]
    fn test_cancel_before_first_frame_clears() {
        let data = container(1, 0, &[frame(&[chunk(TAG_COPY, &[1; 8])])]);
        let (record, surface) = recording(false);
        let (tx, events) = ChannelEvents::channel();
        tx.send_cancel();
        let collab = Collaborators {
            surface,
            audio: Box::new(NullAudioDevice::new()),
            events: Box::new(events),
        };
        let mut session = Session::from_container(data, collab, fast()).unwrap();

        assert_eq!(session.play(false), PlaybackState::Skipped);
        assert!(session.was_skipped());
        let record = record.lock();
        assert!(record.frames.is_empty());
        assert_eq!(record.clears, 1);
        // Terminal: another call does nothing.
        drop(record);
        assert_eq!(session.play(false), PlaybackState::Skipped);
    }

    #[test]
    fn test_malformed_frame_finishes_and_clears() {
        let mut bad = frame(&[chunk(TAG_COPY, &[1; 8])]);
        bad.truncate(bad.len() - 3);
        let data = container(0, 0, &[frame(&[chunk(TAG_COPY, &[4; 8])]), bad]);
        let (record, surface) = recording(false);
        let mut session = Session::from_container(data, quiet(surface), fast()).unwrap();

        assert_eq!(session.play(false), PlaybackState::Finished);
        let record = record.lock();
        assert_eq!(record.frames.len(), 1);
        assert_eq!(record.clears, 1);
    }

    #[test]
    fn test_presentation_failure_finishes() {
        let data = container(2, 0, &[frame(&[]), frame(&[])]);
        let (_record, surface) = recording(true);
        let mut session = Session::from_container(data, quiet(surface), fast()).unwrap();
        assert_eq!(session.play(false), PlaybackState::Finished);
        assert_eq!(session.frames_presented(), 0);
    }

    #[test]
    fn test_resize_represents_current_frame() {
        let data = container(
            2,
            5,
            &[frame(&[chunk(TAG_COPY, &[3; 8])]), frame(&[])],
        );
        let (record, surface) = recording(false);
        let (tx, events) = ChannelEvents::channel();
        let collab = Collaborators {
            surface,
            audio: Box::new(NullAudioDevice::new()),
            events: Box::new(events),
        };
        let mut session = Session::from_container(data, collab, fast()).unwrap();
        tx.send_resize(800, 600);

        session.play(false);
        let record = record.lock();
        assert_eq!(record.resizes, vec![(800, 600)]);
        // Resize is seen before the first frame: re-present, then two frames.
        assert_eq!(record.frames.len(), 3);
        assert_eq!(record.palette_updates, 1);
    }

    #[test]
    fn test_audio_selects_audio_pacing() {
        let data = container(
            1,
            5,
            &[audio(8000, 400), frame(&[])],
        );
        let (_record, surface) = recording(false);
        let session = Session::from_container(data, quiet(surface), fast()).unwrap();
        assert_eq!(
            session.delay_model(),
            DelayModel::AudioDerived {
                sample_rate: 8000,
                samples_per_chunk: 400
            }
        );
        assert!(session.has_audio());
        session.deinit();
    }

    #[test]
    fn test_device_failure_plays_video_only() {
        let data = container(1, 0, &[audio(8000, 80), frame(&[chunk(TAG_COPY, &[7; 8])])]);
        let (record, surface) = recording(false);
        let collab = Collaborators {
            surface,
            audio: Box::new(FailingDevice),
            events: Box::new(NoEvents),
        };
        let mut session = Session::from_container(data, collab, fast()).unwrap();
        assert!(!session.has_audio());
        assert_eq!(session.play(false), PlaybackState::Finished);
        assert_eq!(record.lock().frames, vec![vec![7; 8]]);
    }

    #[test]
    fn test_audio_mismatch_disables_audio_only() {
        let data = container(
            2,
            0,
            &[
                audio(8000, 8),
                frame(&[chunk(TAG_COPY, &[1; 8])]),
                audio(11025, 8),
                frame(&[chunk(TAG_COPY, &[2; 8])]),
            ],
        );
        let (record, surface) = recording(false);
        let mut session = Session::from_container(data, quiet(surface), fast()).unwrap();
        assert!(!session.has_audio());
        assert_eq!(session.play(false), PlaybackState::Finished);
        assert_eq!(record.lock().frames.len(), 2);
    }

    #[test]
    fn test_bad_magic_is_invalid_header() {
        let mut bytes = container(1, 0, &[]).as_bytes().to_vec();
        bytes[4] = 0x00;
        let (_record, surface) = recording(false);
        let err = Session::from_container(ContainerBuffer::from_vec(bytes), quiet(surface), fast())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            LoadError::InvalidHeader(HeaderError::BadMagic(_))
        ));
    }
}
