use anyhow::{anyhow, bail, Context, Result};
use camera_session::config::SessionConfig;
use camera_session::preferences::Preferences;
use camera_session::testing::{SyntheticCapabilitySource, SyntheticCaptureBackend};
use camera_session::{
    CaptureMode, CaptureOutcome, CaptureState, Configuration, Device, DeviceCatalog, Environment,
    LiveViews, SessionCoordinator, SessionEvent, UpdateOutcome,
};
use serde::Serialize;
use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const USAGE: &str = "Usage: camera-session-cli [--config <file>] [--preferences <file>] [--json] <command> [args]

Commands:
  list-devices              List available cameras
  capabilities <id>         Show the capability set of a camera
  show                      Show the bound configuration and live views
  select <id>               Bind a camera
  flip                      Switch to the next camera facing
  mode <photo|video|qr>     Switch capture mode
  cycle <axis>              aspect-ratio, extension, high-res, quality,
                            frame-rate, dynamic-range, mirror, stabilization
  flash                     Cycle the flash mode
  torch                     Toggle force torch
  zoom <ratio>              Set the zoom ratio
  exposure <index>          Set exposure compensation
  photo                     Take a photo (honours the self-timer)
  record [--seconds <n>]    Record a video; ctrl-c stops early
  repl                      Read commands from stdin";

struct Options {
    config: Option<PathBuf>,
    preferences: Option<PathBuf>,
    json: bool,
}

fn parse_options(args: &[String]) -> Result<(Options, Vec<String>)> {
    let mut options = Options {
        config: None,
        preferences: None,
        json: false,
    };
    let mut command = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                options.config = Some(args.get(i).context("--config needs a path")?.into());
            }
            "--preferences" => {
                i += 1;
                options.preferences =
                    Some(args.get(i).context("--preferences needs a path")?.into());
            }
            "--json" => options.json = true,
            other => command.push(other.to_string()),
        }
        i += 1;
    }
    Ok((options, command))
}

#[tokio::main]
async fn main() -> Result<()> {
    camera_session::init_logging();

    let args: Vec<String> = env::args().skip(1).collect();
    let (options, command) = parse_options(&args)?;
    if command.is_empty() {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    }

    let config = match &options.config {
        Some(path) => SessionConfig::load_layered(path)?,
        None => SessionConfig::load_or_default(),
    };
    config.validate().map_err(|e| anyhow!("invalid configuration: {}", e))?;

    let preferences = match &options.preferences {
        Some(path) => Preferences::load_from_file(path)?,
        None => Preferences::new(config.preferences.clone()),
    };

    let catalog = Arc::new(DeviceCatalog::new(
        Arc::new(SyntheticCapabilitySource::reference()),
        config.policy.clone(),
    )?);
    let session = SessionCoordinator::new(
        catalog,
        Arc::new(SyntheticCaptureBackend::auto_complete()),
        preferences,
        Environment::new(),
        config.zoom.clone(),
    )?;

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        let session = session.clone();
        ctrlc::set_handler(move || {
            interrupted.store(true, Ordering::SeqCst);
            if session.capture_state().is_recording() {
                session.stop_recording();
            }
        })
        .context("failed to install ctrl-c handler")?;
    }

    if command[0] == "repl" {
        repl(&session, &options, &interrupted).await?;
    } else {
        run(&session, &command, &options, &interrupted).await?;
    }

    if let Some(path) = &options.preferences {
        session.preferences().save_to_file(path)?;
    }
    Ok(())
}

async fn repl(
    session: &SessionCoordinator,
    options: &Options,
    interrupted: &AtomicBool,
) -> Result<()> {
    let stdin = io::stdin();
    loop {
        print!("camera> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 || interrupted.load(Ordering::SeqCst) {
            break;
        }
        let words: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        match words.first().map(String::as_str) {
            None => continue,
            Some("quit") | Some("exit") => break,
            Some(_) => {
                if let Err(e) = run(session, &words, options, interrupted).await {
                    eprintln!("error: {:#}", e);
                }
            }
        }
    }
    Ok(())
}

fn print<T: Serialize + std::fmt::Debug>(options: &Options, value: &T) -> Result<()> {
    if options.json {
        println!("{}", serde_json::to_string(value)?);
    } else {
        println!("{:#?}", value);
    }
    Ok(())
}

fn arg<'a>(words: &'a [String], index: usize, what: &str) -> Result<&'a str> {
    words
        .get(index)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("{} required", what))
}

async fn run(
    session: &SessionCoordinator,
    words: &[String],
    options: &Options,
    interrupted: &AtomicBool,
) -> Result<()> {
    match words[0].as_str() {
        "list-devices" => {
            let devices = session.catalog().devices();
            if options.json {
                let devices: Vec<&Device> = devices.iter().map(Arc::as_ref).collect();
                println!("{}", serde_json::to_string(&devices)?);
            } else {
                for device in devices {
                    println!(
                        "{}: {}{}",
                        device.id,
                        device.facing,
                        if device.is_logical { " (logical)" } else { "" }
                    );
                }
            }
        }
        "capabilities" => {
            let id = arg(words, 1, "device id")?;
            let device = session
                .catalog()
                .device(id)
                .ok_or_else(|| anyhow!("no camera with id {}", id))?;
            print(options, &device.capabilities)?;
        }
        "show" => {
            #[derive(Debug, Serialize)]
            struct Status {
                configuration: Configuration,
                capture_state: CaptureState,
                views: LiveViews,
                zoom_ratio: f32,
                exposure_compensation: i32,
            }
            print(
                options,
                &Status {
                    configuration: session.configuration(),
                    capture_state: session.capture_state(),
                    views: session.views(),
                    zoom_ratio: session.zoom_ratio(),
                    exposure_compensation: session.exposure_compensation(),
                },
            )?;
        }
        "select" => report(options, session.select_camera(arg(words, 1, "device id")?)?)?,
        "flip" => report(options, session.flip_camera()?)?,
        "mode" => {
            let mode: CaptureMode = arg(words, 1, "capture mode")?
                .parse()
                .map_err(|e: String| anyhow!(e))?;
            report(options, session.set_capture_mode(mode)?)?;
        }
        "cycle" => {
            let outcome = match arg(words, 1, "axis")? {
                "aspect-ratio" => session.cycle_aspect_ratio()?,
                "extension" => session.cycle_extension_mode()?,
                "high-res" => session.toggle_high_resolution()?,
                "quality" => session.cycle_video_quality()?,
                "frame-rate" => session.cycle_frame_rate()?,
                "dynamic-range" => session.cycle_dynamic_range()?,
                "mirror" => session.cycle_video_mirror_mode()?,
                "stabilization" => session.toggle_video_stabilization()?,
                other => bail!("unknown axis: {}", other),
            };
            report(options, outcome)?;
        }
        "flash" => {
            session.cycle_flash_mode();
            print(options, &session.views().flash_mode)?;
        }
        "torch" => print(options, &session.toggle_force_torch())?,
        "zoom" => {
            let ratio: f32 = arg(words, 1, "zoom ratio")?.parse()?;
            print(options, &session.set_zoom_ratio(ratio))?;
        }
        "exposure" => {
            let index: i32 = arg(words, 1, "exposure index")?.parse()?;
            print(options, &session.set_exposure_compensation(index))?;
        }
        "photo" => {
            let outcome = session.take_photo_with_timer();
            print(options, &outcome)?;
            if outcome == CaptureOutcome::Started {
                wait_for_idle(session, interrupted).await;
            }
        }
        "record" => {
            let seconds: u64 = match words.get(1).map(String::as_str) {
                Some("--seconds") => arg(words, 2, "duration")?.parse()?,
                _ => 3,
            };
            record(session, options, Duration::from_secs(seconds), interrupted).await?;
        }
        other => bail!("unknown command: {}\n\n{}", other, USAGE),
    }

    print_events(session).await;
    Ok(())
}

fn report(options: &Options, outcome: UpdateOutcome) -> Result<()> {
    print(options, &outcome)
}

async fn record(
    session: &SessionCoordinator,
    options: &Options,
    duration: Duration,
    interrupted: &AtomicBool,
) -> Result<()> {
    let outcome = session.capture_video()?;
    print(options, &outcome)?;
    if outcome != CaptureOutcome::Started {
        return Ok(());
    }

    let deadline = tokio::time::Instant::now() + duration;
    while tokio::time::Instant::now() < deadline && !interrupted.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    if session.capture_state().is_recording() {
        print(options, &session.capture_video()?)?;
    }
    wait_for_idle(session, interrupted).await;
    Ok(())
}

async fn wait_for_idle(session: &SessionCoordinator, interrupted: &AtomicBool) {
    let mut state = session.subscribe_capture_state();
    while *state.borrow_and_update() != CaptureState::Idle {
        if interrupted.load(Ordering::SeqCst) && session.cancel_countdown() {
            break;
        }
        if tokio::time::timeout(Duration::from_millis(250), state.changed())
            .await
            .is_ok_and(|changed| changed.is_err())
        {
            break;
        }
    }
}

async fn print_events(session: &SessionCoordinator) {
    while let Some(event) = session.poll_event().await {
        match event {
            SessionEvent::PhotoCaptured(photo) => {
                println!("photo saved: {}", photo.output.file_name)
            }
            SessionEvent::RecordingFinalized(Ok(video)) => {
                println!("video saved: {}", video.output.file_name)
            }
            other => log::debug!("{:?}", other),
        }
    }
}
