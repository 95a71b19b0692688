//! AR helmet overlay: tracks a face from the webcam and draws a helmet over it.

use anyhow::{Context, Result};
use ar_helmet_overlay::{
    app::OverlayApp,
    camera::{OpenCvCamera, VideoSource},
    collaborators::Collaborators,
    config::{Config, EXAMPLE_CONFIG},
    display::HighGuiDisplay,
    landmark_detection::OnnxLandmarkDetector,
    pose_estimation::OpenCvPnpSolver,
    renderer::WireframeRenderer,
    utils::safe_cast::u32_to_i32,
};
use clap::Parser;
use log::info;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Camera index to use (overrides camera.device_id)
    #[arg(long)]
    cam: Option<i32>,

    /// Video file to process instead of a camera
    #[arg(short, long)]
    video: Option<PathBuf>,

    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,

    /// Process one of every N+1 frames (overrides render.frame_skip)
    #[arg(long)]
    frame_skip: Option<u32>,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// Draw tracked landmarks (toggle with 'd' at runtime)
    #[arg(long)]
    show_landmarks: bool,

    /// Write the example configuration to this path and exit
    #[arg(long, value_name = "PATH")]
    write_default_config: Option<PathBuf>,
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Config::from_file(path).with_context(|| format!("Failed to load {}", path.display()))?
        }
        None => Config::default(),
    };

    if let Some(cam) = args.cam {
        config.camera.device_id = cam;
    }
    if let Some(skip) = args.frame_skip {
        config.render.frame_skip = skip;
    }
    if args.show_landmarks {
        config.debug.show_landmarks = true;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(path) = &args.write_default_config {
        std::fs::write(path, EXAMPLE_CONFIG)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Wrote example configuration to {}", path.display());
        return Ok(());
    }

    // Config is parsed before the logger so its log level can apply
    let config_result = load_config(&args);
    let level = match (&config_result, args.debug) {
        (_, true) => "debug".to_string(),
        (Ok(config), false) => config.debug.log_level.clone(),
        (Err(_), false) => "info".to_string(),
    };
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(level));

    info!("AR Helmet Overlay");
    let config = config_result?;
    config.validate_model_paths()?;

    let source = args
        .video
        .clone()
        .map_or(VideoSource::Camera(config.camera.device_id), VideoSource::File);
    let camera = OpenCvCamera::open(source, &config.camera)?;
    let (frame_width, frame_height) = camera.frame_size();

    let detector = OnnxLandmarkDetector::new(
        &config.models.face_cascade,
        &config.models.face_landmarks,
        config.tracking.min_detection_confidence,
    )?;
    let renderer = WireframeRenderer::new(&config.render)?;
    let display = HighGuiDisplay::new(
        &config.render.window_title,
        u32_to_i32(config.render.width)?,
        u32_to_i32(config.render.height)?,
        &config.debug,
    )?;

    let collaborators = Collaborators {
        source: Box::new(camera),
        detector: Box::new(detector),
        solver: Box::new(OpenCvPnpSolver::new()),
        renderer: Box::new(renderer),
        sink: Box::new(display),
    };

    let mut app = OverlayApp::new(&config, collaborators, frame_width, frame_height)?;
    let summary = app.run();
    info!(
        "Processed {} of {} ticks, last FPS {:.1}",
        summary.processed, summary.ticks, summary.last_fps
    );

    Ok(())
}
