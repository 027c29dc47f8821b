//! Playback integration tests
//!
//! Builds small animation files on disk and plays them through the public
//! API with recording collaborators.

use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use flicplay::container::chunk::{TAG_AUDIO, TAG_BLACK, TAG_BYTE_RUN, TAG_COLOR_64, TAG_COPY, TAG_FRAME};
use flicplay::container::{ChunkHeader, FileHeader, FLI_MAGIC};
use flicplay::input::{ChannelEvents, NoEvents};
use flicplay::sound::null::NullAudioDevice;
use flicplay::sound::{AudioDevice, AudioError, SampleSource};
use flicplay::video::{Rgb, Surface, SurfaceError};
use flicplay::{Collaborators, LoadError, PlaybackState, PlayerConfig, Session};

// ============================================================================
// Helpers
// ============================================================================

#[derive(Default)]
struct Shown {
    frames: Vec<Vec<u8>>,
    palette: Vec<(usize, Vec<Rgb>)>,
    clears: usize,
}

struct RecordingSurface(Arc<Mutex<Shown>>);

impl Surface for RecordingSurface {
    fn present(
        &mut self,
        pixels: &[u8],
        width: usize,
        height: usize,
        stride: usize,
    ) -> Result<(), SurfaceError> {
        let packed = (0..height)
            .flat_map(|y| pixels[y * stride..y * stride + width].iter().copied())
            .collect();
        self.0.lock().frames.push(packed);
        Ok(())
    }

    fn set_palette(&mut self, colors: &[Rgb], start: usize) {
        self.0.lock().palette.push((start, colors.to_vec()));
    }

    fn clear(&mut self) {
        self.0.lock().clears += 1;
    }
}

/// Device that records the format it was opened with.
struct ProbeDevice(Arc<Mutex<Option<(u32, u16)>>>);

impl AudioDevice for ProbeDevice {
    fn name(&self) -> &str {
        "probe"
    }

    fn open(
        &mut self,
        sample_rate: u32,
        channels: u16,
        _source: Arc<dyn SampleSource>,
    ) -> Result<(), AudioError> {
        *self.0.lock() = Some((sample_rate, channels));
        Ok(())
    }

    fn close(&mut self) {}
}

struct BrokenDevice;

impl AudioDevice for BrokenDevice {
    fn name(&self) -> &str {
        "broken"
    }

    fn open(&mut self, _: u32, _: u16, _: Arc<dyn SampleSource>) -> Result<(), AudioError> {
        Err(AudioError::DeviceInit("unplugged".into()))
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
    let body = subs.concat();
    let mut out = ChunkHeader {
        size: (16 + body.len()) as u32,
        type_tag: TAG_FRAME,
    }
    .to_bytes()
    .to_vec();
    out.extend_from_slice(&(subs.len() as u16).to_le_bytes());
    out.extend_from_slice(&[0; 8]);
    out.extend_from_slice(&body);
    out
}

fn audio(rate: u16, samples: usize) -> Vec<u8> {
    let mut payload = Vec::new();
    for field in [0u16, rate, 1, 0, 0] {
        payload.extend_from_slice(&field.to_le_bytes());
    }
    payload.resize(payload.len() + samples, 128);
    chunk(TAG_AUDIO, &payload)
}

fn write_animation(frame_count: u16, speed: u16, chunks: &[Vec<u8>]) -> tempfile::NamedTempFile {
    let header = FileHeader {
        file_size: 0,
        magic: FLI_MAGIC,
        frame_count,
        width: 4,
        height: 4,
        depth: 8,
        speed,
    };
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&header.to_bytes()).unwrap();
    for c in chunks {
        file.write_all(c).unwrap();
    }
    file.flush().unwrap();
    file
}

fn recording() -> (Arc<Mutex<Shown>>, Box<dyn Surface>) {
    let shown = Arc::new(Mutex::new(Shown::default()));
    (shown.clone(), Box::new(RecordingSurface(shown)))
}

fn config(poll_ms: u64) -> PlayerConfig {
    PlayerConfig {
        poll_interval: Duration::from_millis(poll_ms),
        ..PlayerConfig::default()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_three_frame_carry_forward() {
    let file = write_animation(
        3,
        0,
        &[
            frame(&[chunk(TAG_COPY, &[7; 16])]),
            frame(&[chunk(TAG_BYTE_RUN, &[1, 0xFE, 1, 0xFE, 2])]),
            frame(&[chunk(TAG_BLACK, &[])]),
        ],
    );
    let (shown, surface) = recording();
    let collaborators = Collaborators {
        surface,
        audio: Box::new(NullAudioDevice::new()),
        events: Box::new(NoEvents),
    };

    let mut session = Session::init_with(file.path(), collaborators, config(5)).unwrap();
    assert_eq!(session.frame_count(), 3);
    assert_eq!(session.play(false), PlaybackState::Finished);
    assert!(!session.was_skipped());
    session.deinit();

    let shown = shown.lock();
    assert_eq!(shown.frames.len(), 3);
    assert_eq!(shown.frames[0], vec![7; 16]);

    let mut second = vec![1, 1, 2, 2];
    second.extend_from_slice(&[7; 12]);
    assert_eq!(shown.frames[1], second);

    assert_eq!(shown.frames[2], vec![0; 16]);
    assert_eq!(shown.clears, 0);
}

#[test]
fn test_small_palette_reaches_surface() {
    let file = write_animation(
        1,
        0,
        &[frame(&[chunk(TAG_COLOR_64, &[1, 0, 5, 2, 63, 0, 0, 0, 63, 0])])],
    );
    let (shown, surface) = recording();
    let collaborators = Collaborators {
        surface,
        audio: Box::new(NullAudioDevice::new()),
        events: Box::new(NoEvents),
    };
    let mut session = Session::init(file.path(), collaborators).unwrap();
    session.play(false);

    assert_eq!(
        shown.lock().palette,
        vec![(5, vec![Rgb::new(252, 0, 0), Rgb::new(0, 252, 0)])]
    );
    assert_eq!(session.palette().get(6), Rgb::new(0, 252, 0));
}

#[test]
fn test_bad_magic_fails_init() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let mut bytes = [0u8; 128];
    bytes[4..6].copy_from_slice(&0x1234u16.to_le_bytes());
    file.write_all(&bytes).unwrap();

    let (_shown, surface) = recording();
    let collaborators = Collaborators {
        surface,
        audio: Box::new(NullAudioDevice::new()),
        events: Box::new(NoEvents),
    };
    let err = Session::init(file.path(), collaborators).err().unwrap();
    assert!(matches!(err, LoadError::InvalidHeader(_)));
}

#[test]
fn test_short_file_fails_init() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&[0x11, 0xAF]).unwrap();
    let (_shown, surface) = recording();
    let collaborators = Collaborators {
        surface,
        audio: Box::new(NullAudioDevice::new()),
        events: Box::new(NoEvents),
    };
    assert!(matches!(
        Session::init(file.path(), collaborators),
        Err(LoadError::InvalidHeader(_))
    ));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let (_shown, surface) = recording();
    let collaborators = Collaborators {
        surface,
        audio: Box::new(NullAudioDevice::new()),
        events: Box::new(NoEvents),
    };
    assert!(matches!(
        Session::init(&dir.path().join("nope.fli"), collaborators),
        Err(LoadError::Io { .. })
    ));
}

#[test]
fn test_audio_device_opened_at_stream_rate() {
    let file = write_animation(1, 0, &[audio(11025, 735), frame(&[])]);
    let (_shown, surface) = recording();
    let opened = Arc::new(Mutex::new(None));
    let collaborators = Collaborators {
        surface,
        audio: Box::new(ProbeDevice(opened.clone())),
        events: Box::new(NoEvents),
    };

    let mut session = Session::init_with(file.path(), collaborators, config(5)).unwrap();
    assert_eq!(*opened.lock(), Some((11025, 1)));
    assert!(session.has_audio());
    assert_eq!(session.play(false), PlaybackState::Finished);
}

#[test]
fn test_broken_device_plays_video_only() {
    let file = write_animation(
        2,
        0,
        &[
            audio(8000, 80),
            frame(&[chunk(TAG_COPY, &[3; 16])]),
            audio(8000, 80),
            frame(&[chunk(TAG_BLACK, &[])]),
        ],
    );
    let (shown, surface) = recording();
    let collaborators = Collaborators {
        surface,
        audio: Box::new(BrokenDevice),
        events: Box::new(NoEvents),
    };

    let mut session = Session::init_with(file.path(), collaborators, config(5)).unwrap();
    assert!(!session.has_audio());
    assert_eq!(session.play(false), PlaybackState::Finished);
    assert_eq!(shown.lock().frames.len(), 2);
}

#[test]
fn test_skip_during_wait_is_prompt() {
    // 100 frames at 1 s each; only a cancel can end this quickly.
    let frames: Vec<Vec<u8>> = (0..100).map(|_| frame(&[])).collect();
    let file = write_animation(100, 100, &frames);
    let (shown, surface) = recording();
    let (tx, events) = ChannelEvents::channel();
    let collaborators = Collaborators {
        surface,
        audio: Box::new(NullAudioDevice::new()),
        events: Box::new(events),
    };
    let poll = Duration::from_millis(10);
    let mut session = Session::init_with(file.path(), collaborators, config(10)).unwrap();

    let raised = Arc::new(Mutex::new(None));
    let canceller = {
        let raised = raised.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            *raised.lock() = Some(Instant::now());
            tx.send_cancel();
        })
    };

    let state = session.play(false);
    let ended = Instant::now();
    canceller.join().unwrap();

    assert_eq!(state, PlaybackState::Skipped);
    assert!(session.was_skipped());
    let raised = raised.lock().unwrap();
    // One poll interval, plus slack for scheduler noise.
    assert!(ended.duration_since(raised) < poll * 2 + Duration::from_millis(25));
    let shown = shown.lock();
    assert_eq!(shown.frames.len(), 1);
    assert_eq!(shown.clears, 1);
}
