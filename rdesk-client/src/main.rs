//! rdesk client: loopback session entry point.
//!
//! ```text
//! rdesk-client                    Run with defaults
//! rdesk-client --config <path>    Use custom config TOML
//! rdesk-client --frames <n>       Stop after n frames (0 = until Ctrl+C)
//! rdesk-client --gen-config       Dump default config and exit
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use rdesk_core::desktop::{MappedMemoryFactory, platform_capturer};
use rdesk_core::{CaptureDriver, Frame, ScreenCapturer, SyntheticScreenCapturer};

use rdesk_client::config::{ClientConfig, LoggingConfig};
use rdesk_client::headless::HeadlessWindow;
use rdesk_client::loopback;
use rdesk_client::{UiTaskQueue, WindowHost};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "rdesk-client", about = "rdesk loopback desktop session")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "rdesk-client.toml")]
    config: PathBuf,

    /// Number of frames to capture (overrides config).
    #[arg(short, long)]
    frames: Option<u64>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

fn init_tracing(logging: &LoggingConfig) -> std::io::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    if logging.file.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    } else {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&logging.file)?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init();
    }
    Ok(())
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ClientConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = ClientConfig::load(&cli.config);
    if let Some(frames) = cli.frames {
        config.capture.max_frames = frames;
    }

    init_tracing(&config.logging)?;

    info!("rdesk-client v{}", env!("CARGO_PKG_VERSION"));

    // ── 1. UI side: task queue and window ───────────────────────

    let mut queue = UiTaskQueue::new();
    let host = WindowHost::new(queue.runner(), HeadlessWindow::new());
    let proxy = host.proxy();
    info!(screens = config.screens.len(), "desktop window created");

    // ── 2. Session negotiation ──────────────────────────────────

    let negotiation = tokio::task::spawn_blocking({
        let proxy = Arc::clone(&proxy);
        let screens = config.screens.clone();
        let current = config.capture.screen_id;
        move || loopback::negotiate(&proxy, &screens, current)
    });

    // ── 3. Capture thread ───────────────────────────────────────

    let mut capturer: Box<dyn ScreenCapturer> = match config.capture.backend.as_str() {
        "platform" => platform_capturer()?,
        other => {
            if other != "synthetic" {
                warn!("unknown capture backend {other:?}; using synthetic screens");
            }
            Box::new(SyntheticScreenCapturer::new(
                config.screens.iter().map(|s| (s.title.clone(), s.size())),
            ))
        }
    };
    if config.capture.use_shared_memory {
        capturer.set_shared_memory_factory(Some(Arc::new(MappedMemoryFactory::new())));
    }
    let mut driver = CaptureDriver::new(capturer, config.capture.to_capture_config());
    let stop = driver.stop_handle();

    let capture = tokio::task::spawn_blocking({
        let proxy = Arc::clone(&proxy);
        move || driver.run(&mut |frame: &Frame| loopback::deliver_frame(&proxy, frame))
    });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted");
            stop.store(true, Ordering::SeqCst);
        }
    });

    // ── 4. Event loop ───────────────────────────────────────────

    let mut selection_sent = false;
    while !capture.is_finished() {
        queue.run_pending();

        // Once the session is up, ask for the screen we are watching.
        if !selection_sent && host.window().is_visible() {
            let window = host.window();
            if !window.select_screen(window.screen_list().current_screen) {
                info!("streaming the full desktop");
            }
            selection_sent = true;
        }

        // Yield briefly so Tokio can make progress.
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    negotiation.await?;
    let result = capture.await?;
    queue.run_pending();

    match &result {
        Ok(stats) => info!(
            captured = stats.captured,
            temporary_failures = stats.temporary_failures,
            "capture finished"
        ),
        Err(e) => error!("capture failed: {e}"),
    }
    {
        let window = host.window();
        info!(frames = window.frames_drawn(), "frames drawn");
        if let Some(frame) = window.last_frame() {
            info!(size = ?frame.size(), "last frame");
        }
    }

    // ── 5. Shutdown ─────────────────────────────────────────────

    info!("shutting down");
    drop(host);
    let late = queue.run_pending();
    if late > 0 {
        warn!(late, "deliveries arrived after the window closed");
    }

    result?;
    Ok(())
}
