use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use flicplay::input::NoEvents;
use flicplay::sound::null::NullAudioDevice;
use flicplay::video::null::NullSurface;
use flicplay::{config, logging, Cli, Collaborators, Options, Session};

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("flicplay: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    let options = config::load_config(cli.config.as_deref())?;
    let options = cli.merge_into_options(options)?;

    logging::init(options.log_level, options.log_file.as_deref())
        .context("Failed to open log file")?;
    log::info!("flicplay {} starting", env!("CARGO_PKG_VERSION"));
    log::debug!("options: {:?}", options);

    let collaborators = collaborators(&cli, &options)?;
    let mut session = match Session::init_with(&cli.file, collaborators, options.player_config()) {
        Ok(session) => session,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("flicplay: {}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    let state = session.play(options.suppress_final_frame);
    log::info!(
        "{:?}: {} of {} frames presented",
        state,
        session.frames_presented(),
        session.frame_count()
    );
    session.deinit();
    Ok(ExitCode::SUCCESS)
}

fn headless(options: &Options) -> Result<Collaborators> {
    let surface = match &options.dump_dir {
        Some(dir) => NullSurface::with_dump_dir(dir)
            .with_context(|| format!("Cannot create dump directory {}", dir.display()))?,
        None => NullSurface::new(),
    };
    Ok(Collaborators {
        surface: Box::new(surface),
        audio: Box::new(NullAudioDevice::new()),
        events: Box::new(NoEvents),
    })
}

#[cfg(feature = "sdl")]
fn collaborators(cli: &Cli, options: &Options) -> Result<Collaborators> {
    if options.headless || options.dump_dir.is_some() {
        return headless(options);
    }

    let (width, height) = window_size(&cli.file).unwrap_or((320, 200));

    let title = format!("flicplay - {}", cli.file.display());
    match flicplay::sdl::SdlBackend::open(&title, width, height, options.scale) {
        Ok(backend) => Ok(backend.into_collaborators()),
        Err(e) => {
            log::warn!("{}; falling back to headless playback", e);
            headless(options)
        }
    }
}

/// Animation size from the file header alone.
#[cfg(feature = "sdl")]
fn window_size(path: &std::path::Path) -> Option<(u32, u32)> {
    use std::io::Read;

    use flicplay::container::{FileHeader, HEADER_SIZE};

    let mut bytes = [0u8; HEADER_SIZE];
    std::fs::File::open(path).ok()?.read_exact(&mut bytes).ok()?;
    let header = FileHeader::parse(&bytes).ok()?;
    Some((header.width as u32, header.height as u32))
}

#[cfg(not(feature = "sdl"))]
fn collaborators(_cli: &Cli, options: &Options) -> Result<Collaborators> {
    if !options.headless {
        log::info!("built without the sdl feature; playing headless");
    }
    headless(options)
}
