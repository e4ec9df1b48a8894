//! vision_relayd - object detection relay daemon
//!
//! This daemon:
//! 1. Loads the detector and resolves the class filter
//! 2. Runs inference on a camera (continuous) or an image file (single-shot)
//! 3. Writes a decorated frame per inference cycle
//! 4. Publishes results to a JSON file and, for cameras, two UDP ports
//! 5. Stops every thread on Ctrl-C / SIGTERM

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use vision_relay::config::RelayConfig;
use vision_relay::pipeline::{Pipeline, PipelineOptions};
use vision_relay::Shutdown;

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Model file (.onnx) or stub:// for the built-in test detector.
    model: String,
    /// /dev/videoN, an image file, or stub:// for a synthetic camera.
    source: String,
    /// Emit a "no detections" marker image and skip empty full-detail documents.
    #[arg(long)]
    suppress_empty: bool,
    /// Comma-separated class names to surface (person is always added).
    #[arg(long, env = "VISION_RELAY_CLASSES")]
    classes: Option<String>,
    /// Minimum detector score.
    #[arg(long)]
    confidence_threshold: Option<f32>,
    /// Label file; defaults to coco_80_labels_list.txt next to the model.
    #[arg(long, env = "VISION_RELAY_LABELS")]
    labels: Option<PathBuf>,
    /// JSON config file.
    #[arg(long, env = "VISION_RELAY_CONFIG")]
    config: Option<PathBuf>,
    /// Capture rate in continuous mode.
    #[arg(long)]
    target_fps: Option<u32>,
    /// UI mode for stderr progress.
    #[arg(long, value_enum, default_value = "auto", value_name = "MODE")]
    ui: ui::UiMode,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    run(args).map_err(|err| {
        log::error!("vision_relayd failed: {:#}", err);
        err
    })
}

fn run(args: Args) -> Result<()> {
    let ui = ui::Ui::new(args.ui, std::io::stderr().is_terminal());

    let stage = ui.stage("Load configuration");
    let mut config = RelayConfig::load_from(args.config.as_deref())?;
    if let Some(fps) = args.target_fps {
        config.target_fps = fps;
    }
    if let Some(threshold) = args.confidence_threshold {
        config.confidence_threshold = threshold;
    }
    config.validate()?;
    stage.done();

    let options = PipelineOptions {
        model: args.model,
        source: args.source,
        labels: args.labels,
        classes: args.classes,
        suppress_empty: args.suppress_empty,
        config,
    };

    let stage = ui.stage("Load model and open source");
    let pipeline = Pipeline::build(&options, Shutdown::new())?;
    stage.done();

    let stop = pipeline.stop_signal();
    ctrlc::set_handler(move || {
        if !stop.is_triggered() {
            log::info!("shutdown signal received, stopping pipeline...");
        }
        stop.trigger();
    })
    .context("install shutdown signal handler")?;

    let publishers = pipeline.publisher_names().join(", ");
    let handle = pipeline.start()?;
    log::info!(
        "vision_relayd running (publishers: {}, results: {}, decorated: {})",
        publishers,
        options.config.results_path.display(),
        options.config.decorated_path.display()
    );

    let report = handle.join()?;
    for (name, stats) in &report.publishers {
        log::info!(
            "publisher {}: {} sent, {} failed, {} skipped",
            name,
            stats.sent,
            stats.failed,
            stats.disconnected + stats.suppressed
        );
    }
    Ok(())
}
