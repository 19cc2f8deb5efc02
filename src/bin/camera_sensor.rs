//! camera_sensor - presence sensor process
//!
//! Watches the armed flag in the shared store and, while armed, samples the
//! camera, runs person detection and publishes debounced frames.

use anyhow::Result;
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use watchpost::{ingest, store, ui, BackendRegistry, PresenceMonitor, WatchpostConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Watchpost presence sensor")]
struct Args {
    /// Device name published with detections (overrides config).
    #[arg(long, env = "WATCHPOST_DEVICE_NAME")]
    device: Option<String>,
    /// Camera source URL (stub://name or http(s)://snapshot-url).
    #[arg(long)]
    camera: Option<String>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let ui = ui::Ui::from_flag(&args.ui);

    let mut config = {
        let _stage = ui.stage("Load configuration");
        WatchpostConfig::load()?
    };
    if let Some(device) = args.device {
        config.device_name = device;
    }
    if let Some(camera) = args.camera {
        config.camera.source = camera;
    }

    let shared = {
        let _stage = ui.stage("Connect to store");
        store::connect(&config.store)?
    };
    let source = {
        let _stage = ui.stage("Open camera");
        ingest::open_source(
            &config.camera.source,
            config.camera.width,
            config.camera.height,
        )?
    };
    let detectors = {
        let _stage = ui.stage("Load detector");
        let registry = BackendRegistry::from_settings(&config.detector)?;
        if let Some(backend) = registry.default_backend() {
            if let Ok(mut backend) = backend.lock() {
                backend.warm_up()?;
            }
        }
        registry
    };

    let mut monitor = PresenceMonitor::new(&config, shared, source, detectors)?;

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        stop_flag.store(true, Ordering::SeqCst);
    })
    .expect("error setting Ctrl-C handler");

    log::info!("camera_sensor running as {}", config.device_name);
    monitor.run(&stop)
}
