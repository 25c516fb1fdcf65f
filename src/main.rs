// src/main.rs
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};

use gesture_control::actuator::Actuators;
use gesture_control::data::SessionRecorder;
use gesture_control::driver::{DriverConfig, FrameDriver};
use gesture_control::logging;
use gesture_control::source::{
    ImageDirSource, MotionPoseSource, PoseSource, PoseStreamSource, SyntheticFrames,
    SyntheticSource,
};
use gesture_control::{Channel, Config, ControlSession, Strategy};

#[derive(Parser, Debug)]
#[command(
    name = "gesture_control",
    version,
    about = "Control brightness and volume with hand gestures"
)]
struct Args {
    /// JSON configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Recognition strategy: pinch, flexion or contour
    #[arg(short, long)]
    strategy: Option<Strategy>,

    /// Replay a JSON-lines pose stream ("-" reads stdin)
    #[arg(long, value_name = "FILE", conflicts_with_all = ["frames", "camera", "synthetic"])]
    replay: Option<PathBuf>,

    /// Flip replayed landmarks horizontally
    #[arg(long, requires = "replay")]
    mirror_stream: bool,

    /// Directory of still frames for motion tracking
    #[arg(long, value_name = "DIR", conflicts_with_all = ["camera", "synthetic"])]
    frames: Option<PathBuf>,

    /// Camera index for motion tracking
    #[arg(long, value_name = "INDEX", conflicts_with = "synthetic")]
    camera: Option<u32>,

    /// Generated hands, no hardware needed (default source)
    #[arg(long)]
    synthetic: bool,

    /// Stop after this many frames
    #[arg(long, value_name = "N")]
    max_frames: Option<u64>,

    /// Drive the real backlight and mixer instead of logging values
    #[arg(long)]
    actuate: bool,

    /// Write control_data.csv and report.html when the session ends
    #[arg(long)]
    export: bool,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    print_config: bool,

    /// Show the status window
    #[arg(long)]
    gui: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    let mut config = Config::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(strategy) = args.strategy {
        config.strategy = strategy;
        config.validate().context("Invalid configuration")?;
    }

    if args.print_config {
        println!("{}", config.to_json_pretty()?);
        return Ok(());
    }

    if args.gui {
        return run_gui(args, config);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(run_headless(args, config))
}

fn open_source(args: &Args, config: &Config) -> Result<Box<dyn PoseSource>> {
    let (width, height) = (config.frame_width, config.frame_height);

    if let Some(path) = &args.replay {
        if config.strategy == Strategy::Contour {
            bail!(
                "the contour strategy needs frames (--frames, --camera or --synthetic), \
                 not a pose stream"
            );
        }
        let source: Box<dyn PoseSource> = if path.as_os_str() == "-" {
            info!("reading pose stream from stdin");
            Box::new(
                PoseStreamSource::new(BufReader::new(std::io::stdin()))
                    .mirrored(args.mirror_stream),
            )
        } else {
            Box::new(
                PoseStreamSource::open(path)
                    .with_context(|| format!("Failed to open {}", path.display()))?
                    .mirrored(args.mirror_stream),
            )
        };
        return Ok(source);
    }

    if args.frames.is_some() || args.camera.is_some() {
        if config.strategy.needs_landmarks() {
            bail!(
                "the {} strategy needs landmarks; pipe an estimator's output through --replay",
                config.strategy
            );
        }
    }

    if let Some(dir) = &args.frames {
        let frames = ImageDirSource::open(dir)
            .with_context(|| format!("Failed to read frames from {}", dir.display()))?;
        return Ok(Box::new(
            MotionPoseSource::new(frames, config.motion).mirrored(config.mirror),
        ));
    }

    if let Some(index) = args.camera {
        return open_camera(index, config);
    }

    info!(strategy = %config.strategy, "using synthetic source");
    Ok(match config.strategy {
        Strategy::Contour => Box::new(MotionPoseSource::new(
            SyntheticFrames::new(width, height),
            config.motion,
        )),
        Strategy::Pinch | Strategy::Flexion => Box::new(SyntheticSource::new(width, height)),
    })
}

#[cfg(feature = "camera")]
fn open_camera(index: u32, config: &Config) -> Result<Box<dyn PoseSource>> {
    use gesture_control::source::CameraSource;

    let camera = CameraSource::open(index, config.frame_width, config.frame_height)
        .with_context(|| format!("Failed to open camera {}", index))?;
    Ok(Box::new(
        MotionPoseSource::new(camera, config.motion).mirrored(config.mirror),
    ))
}

#[cfg(not(feature = "camera"))]
fn open_camera(_index: u32, _config: &Config) -> Result<Box<dyn PoseSource>> {
    bail!("built without camera support; rebuild with `--features camera`")
}

fn build_driver(args: &Args, config: &Config) -> FrameDriver {
    let mut actuators = if args.actuate {
        Actuators::system()
    } else {
        Actuators::logging()
    }
    .with_native_range(config.volume_native_range);

    let mut session = ControlSession::new(config);
    if let Some(level) = actuators.current_brightness() {
        session = session.with_initial_value(Channel::Brightness, level);
    }
    if let Some(level) = actuators.current_volume() {
        session = session.with_initial_value(Channel::Volume, level);
    }

    let mut driver_config = DriverConfig::from_config(config);
    driver_config.max_frames = args.max_frames;

    let driver = FrameDriver::new(driver_config, session, actuators);
    if args.export {
        driver.with_recorder(SessionRecorder::new(&config.export_dir, None))
    } else {
        driver
    }
}

fn export(recorder: Option<SessionRecorder>) -> Result<()> {
    let Some(recorder) = recorder else {
        return Ok(());
    };
    if recorder.is_empty() {
        warn!("no frames recorded, nothing to export");
        return Ok(());
    }

    let csv_path = recorder.export_csv().context("Failed to export control data")?;
    let report_path = recorder.generate_report().context("Failed to write report")?;
    info!(csv = %csv_path.display(), report = %report_path.display(), "session exported");
    Ok(())
}

async fn run_headless(args: Args, config: Config) -> Result<()> {
    let mut source = open_source(&args, &config)?;
    let driver = build_driver(&args, &config);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    let (_, recorder) = driver.run(&mut source, shutdown).await;
    export(recorder)
}

#[cfg(feature = "gui")]
fn run_gui(args: Args, config: Config) -> Result<()> {
    use eframe::egui;
    use gesture_control::app::GestureControlApp;

    let driver = build_driver(&args, &config);
    let receiver = driver.subscribe();
    let strategy = config.strategy;
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let (ready_tx, ready_rx) = std::sync::mpsc::channel::<bool>();

    // the frame loop gets its own thread; the window owns the main thread
    let worker = std::thread::spawn(move || -> Result<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to start async runtime")?;
        let mut source = match open_source(&args, &config) {
            Ok(source) => {
                let _ = ready_tx.send(true);
                source
            }
            Err(e) => {
                let _ = ready_tx.send(false);
                return Err(e);
            }
        };
        let (_, recorder) = runtime.block_on(driver.run(&mut source, async {
            let _ = stop_rx.await;
        }));
        export(recorder)
    });

    if ready_rx.recv() != Ok(true) {
        return worker
            .join()
            .map_err(|_| anyhow::anyhow!("frame driver thread panicked"))?;
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([900.0, 760.0])
            .with_min_inner_size([640.0, 520.0]),
        centered: true,
        ..Default::default()
    };

    let result = eframe::run_native(
        "Gesture Control",
        options,
        Box::new(move |cc| Box::new(GestureControlApp::new(cc, receiver, strategy))),
    );

    let _ = stop_tx.send(());
    let joined = worker
        .join()
        .map_err(|_| anyhow::anyhow!("frame driver thread panicked"))?;
    result.map_err(|e| anyhow::anyhow!("Error running application: {}", e))?;
    joined
}

#[cfg(not(feature = "gui"))]
fn run_gui(_args: Args, _config: Config) -> Result<()> {
    bail!("built without GUI support; rebuild with `--features gui`")
}
