//! Barcode Capture CLI
//!
//! `rank` shows how a scaling strategy orders candidate preview sizes.
//! `scan` runs the capture and decode pipeline until a frame budget is
//! spent or Ctrl-C is pressed.

use barcode_capture::{
    camera::{CameraSession, CameraWorker},
    capture::FileConfig,
    decode::{DecodeOptions, DecodeStats, DecodeWorker, Decoder, NullReader},
    events::{self, ScanEvent},
    geometry::{Rect, Resolution},
    metrics::{MetricsRegistry, MetricsSnapshot},
    scaling::{framing::calculate_frames, ScalingMode},
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "barcode-capture", version, about = "Camera barcode scanning pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the order a scaling strategy puts preview sizes in.
    Rank {
        /// Viewfinder size, e.g. 1280x720.
        #[arg(long)]
        viewfinder: Resolution,
        #[arg(long, default_value = "fit")]
        strategy: ScalingMode,
        /// Candidate preview sizes.
        #[arg(required = true, value_delimiter = ',')]
        sizes: Vec<Resolution>,
    },
    /// Scan barcodes from the camera.
    Scan {
        /// TOML configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Viewfinder size, overriding the configuration file.
        #[arg(long)]
        viewfinder: Option<Resolution>,
        /// Frames to decode before stopping, overriding the configuration file.
        #[arg(long)]
        frames: Option<u32>,
        /// Run until interrupted.
        #[arg(long)]
        continuous: bool,
        /// Metrics server port, 0 to disable.
        #[arg(long)]
        metrics_port: Option<u16>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Rank {
            viewfinder,
            strategy,
            sizes,
        } => {
            rank(viewfinder, strategy, &sizes);
            ExitCode::SUCCESS
        }
        Command::Scan {
            config,
            viewfinder,
            frames,
            continuous,
            metrics_port,
        } => {
            let mut config = match config {
                Some(path) => match FileConfig::from_file(&path) {
                    Ok(config) => config,
                    Err(e) => {
                        error!(path = %path.display(), error = %e, "invalid configuration");
                        return ExitCode::FAILURE;
                    }
                },
                None => FileConfig::default(),
            };
            if let Some(size) = viewfinder {
                config.display.viewfinder = Some(size);
            }
            if config.display.viewfinder.is_none() {
                config.display.viewfinder = Some(Resolution::new(1280, 720));
            }
            if let Some(frames) = frames {
                config.output.frame_count = frames;
            }
            config.output.continuous |= continuous;
            if let Some(port) = metrics_port {
                config.output.metrics_port = port;
            }
            if let Err(e) = config.validate() {
                error!(error = %e, "invalid configuration");
                return ExitCode::FAILURE;
            }
            scan(config)
        }
    }
}

fn rank(viewfinder: Resolution, mode: ScalingMode, sizes: &[Resolution]) {
    let strategy = mode.strategy();
    println!("{} strategy, viewfinder {}", mode, viewfinder);
    for (i, size) in strategy.best_order(sizes, Some(viewfinder)).iter().enumerate() {
        println!(
            "{:>3}. {:<10} score {:.4}  placed at {}",
            i + 1,
            size.to_string(),
            strategy.score(*size, viewfinder),
            strategy.scale_preview(*size, viewfinder)
        );
    }
}

#[cfg(feature = "camera")]
fn camera_worker() -> CameraWorker {
    CameraWorker::new(barcode_capture::capture::NokhwaProvider::new())
}

#[cfg(not(feature = "camera"))]
fn camera_worker() -> CameraWorker {
    info!("built without the camera feature, scanning a mock camera");
    CameraWorker::new(barcode_capture::MockCamera::new().with_frame_interval(Duration::from_millis(33)))
}

fn scan(config: FileConfig) -> ExitCode {
    info!("Barcode Capture v{}", barcode_capture::VERSION);

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = Arc::clone(&running);
    if let Err(e) = ctrlc::set_handler(move || handler_flag.store(false, Ordering::SeqCst)) {
        warn!(error = %e, "failed to install Ctrl-C handler");
    }

    let metrics = Metrics::start(config.output.metrics_port);

    let worker = camera_worker();
    let (tx, rx) = events::channel();
    let display = config.display.display_configuration();
    let framing = config.decode.framing_options();

    let mut session = CameraSession::new(worker.clone(), config.camera.clone(), tx.clone());
    session.set_display_configuration(display.clone());
    session.open();
    session.configure();
    session.start_preview();

    let mut crop_rect: Option<Rect> = None;
    let mut decoder: Option<DecodeWorker> = None;
    let mut results = 0u64;
    let mut exit = ExitCode::SUCCESS;
    let budget = u64::from(config.output.frame_count);

    while running.load(Ordering::SeqCst) {
        let stats = decoder.as_ref().map(DecodeWorker::stats).unwrap_or_default();
        metrics.update(&MetricsSnapshot::from_components(&worker.stats(), &stats));
        if !config.output.continuous && stats.frames + stats.skipped >= budget {
            info!(frames = stats.frames, "frame budget spent");
            break;
        }
        if decoder.as_ref().is_some_and(|d| !d.is_running()) {
            info!("decode loop finished");
            break;
        }

        let event = match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => event,
            Err(_) => continue,
        };
        debug!(session = %event.session(), kind = event.kind(), "event");
        match event {
            ScanEvent::PreviewSized { size, .. } => {
                crop_rect = calculate_frames(size, &display, &framing).map(|f| f.preview_framing_rect);
                info!(%size, crop = ?crop_rect, "preview sized");
                if let Some(decoder) = &decoder {
                    decoder.set_crop_rect(crop_rect);
                }
            }
            ScanEvent::PreviewStarted { .. } => {
                let reader = Decoder::new(NullReader)
                    .with_hints(config.decode.hints())
                    .with_inversion(config.decode.inversion);
                let options = DecodeOptions {
                    crop_rect,
                    scaling_factor: config.decode.scaling_factor,
                    mode: config.decode.mode,
                    retry_delay: Duration::from_millis(config.decode.retry_delay_ms),
                };
                match DecodeWorker::start(session.requester(), reader, options, tx.clone()) {
                    Ok(worker) => decoder = Some(worker),
                    Err(e) => {
                        error!(error = %e, "failed to start decoding");
                        exit = ExitCode::FAILURE;
                        break;
                    }
                }
            }
            ScanEvent::BarcodeResult { result, .. } => {
                results += 1;
                println!("{}", result);
            }
            ScanEvent::CameraError { error, .. } => {
                error!(%error, "camera failed");
                exit = ExitCode::FAILURE;
                break;
            }
            _ => {}
        }
    }

    let stats = decoder.as_ref().map(DecodeWorker::stats).unwrap_or_default();
    if let Some(mut decoder) = decoder.take() {
        decoder.stop();
    }
    session.close();
    wait_for_close(&rx);
    metrics.update(&MetricsSnapshot::from_components(&worker.stats(), &stats));

    summarize(&stats, results);
    exit
}

fn wait_for_close(rx: &events::EventReceiver) {
    loop {
        match rx.recv_timeout(Duration::from_secs(2)) {
            Ok(ScanEvent::CameraClosed { .. }) => return,
            Ok(_) => {}
            Err(_) => {
                warn!("camera did not report closing");
                return;
            }
        }
    }
}

fn summarize(stats: &DecodeStats, results: u64) {
    info!(
        frames = stats.frames,
        results,
        failures = stats.failures,
        skipped = stats.skipped,
        preview_errors = stats.preview_errors,
        last_decode_ms = stats.last_decode.map(|d| d.as_millis() as u64),
        "scan finished"
    );
}

/// Metrics registry, served over HTTP when built with the `metrics` feature.
struct Metrics {
    registry: Option<MetricsRegistry>,
    #[cfg(feature = "metrics")]
    state: Option<Arc<tokio::sync::RwLock<barcode_capture::metrics::MetricsState>>>,
}

impl Metrics {
    #[cfg(not(feature = "metrics"))]
    fn start(port: u16) -> Self {
        if port != 0 {
            debug!(port, "built without the metrics feature, not serving metrics");
        }
        let registry = MetricsRegistry::new()
            .map_err(|e| warn!(error = %e, "metrics disabled"))
            .ok();
        Self { registry }
    }

    #[cfg(feature = "metrics")]
    fn start(port: u16) -> Self {
        use barcode_capture::metrics::{MetricsServer, MetricsServerConfig};

        let registry = match MetricsRegistry::new() {
            Ok(registry) => registry,
            Err(e) => {
                warn!(error = %e, "metrics disabled");
                return Self {
                    registry: None,
                    state: None,
                };
            }
        };
        if port == 0 {
            return Self {
                registry: Some(registry),
                state: None,
            };
        }

        let server = MetricsServer::new(MetricsServerConfig::with_port(port), registry);
        let state = server.state();
        let spawned = std::thread::Builder::new()
            .name("metrics-server".into())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(1)
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!(error = %e, "failed to start metrics runtime");
                        return;
                    }
                };
                if let Err(e) = runtime.block_on(server.run()) {
                    error!(error = %e, "metrics server stopped");
                }
            });
        if let Err(e) = spawned {
            warn!(error = %e, "failed to spawn metrics server");
        }
        Self {
            registry: None,
            state: Some(state),
        }
    }

    fn update(&self, snapshot: &MetricsSnapshot) {
        if let Some(registry) = &self.registry {
            registry.update(snapshot);
        }
        #[cfg(feature = "metrics")]
        if let Some(state) = &self.state {
            state.blocking_write().update(snapshot);
        }
    }
}
