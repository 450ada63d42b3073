//! routeros-exporter - RouterOS metrics exporter.
//!
//! Scrapes every configured device and writes the Prometheus text exposition
//! to stdout or to a file. With `--interval` it keeps scraping until
//! interrupted, replacing the output file atomically on every cycle.

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use prometheus::Registry;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;

use routeros_exporter::collector::Scraper;
use routeros_exporter::config::Config;
use routeros_exporter::metrics::{PrometheusBridge, render_text};
use routeros_exporter::routeros::ReplayConnector;

type BoxError = Box<dyn std::error::Error>;

/// RouterOS metrics exporter.
#[derive(Parser)]
#[command(name = "routeros-exporter", about = "RouterOS metrics exporter", version)]
struct Args {
    /// Path to the YAML device list.
    #[arg(short, long, default_value = "config.yml")]
    config: PathBuf,

    /// Directory with recorded device replies (`<device name>.json`).
    #[arg(long, value_name = "DIR")]
    replay_dir: PathBuf,

    /// Write the exposition to this file instead of stdout.
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Scrape interval in seconds. 0 scrapes once and exits.
    #[arg(short, long, default_value = "0")]
    interval: u64,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Logs go to stderr so stdout stays clean for the exposition.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("routeros_exporter={}", level).parse::<Directive>() {
        filter = filter.add_directive(directive);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Renders `registry` and writes it to `output`, or stdout when `None`.
///
/// File output goes through a temporary file in the same directory so
/// readers never see a partial exposition.
fn write_exposition(registry: &Registry, output: Option<&Path>) -> Result<(), BoxError> {
    let text = render_text(registry)?;

    match output {
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
        }
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
            tmp.write_all(text.as_bytes())?;
            tmp.persist(path)?;
            debug!("Exposition written to {}", path.display());
        }
    }

    Ok(())
}

fn run(args: Args) -> Result<(), BoxError> {
    let config = Config::load(&args.config)?;

    info!("routeros-exporter {} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "Config: devices={}, replay_dir={}, interval={}s",
        config.devices.len(),
        args.replay_dir.display(),
        args.interval
    );

    let connector = ReplayConnector::new(&args.replay_dir);
    let scraper = Arc::new(Scraper::with_default_collectors(config.devices, connector));

    let registry = Registry::new();
    registry.register(Box::new(PrometheusBridge::new(Arc::clone(&scraper))?))?;

    if args.interval == 0 {
        return write_exposition(&registry, args.output.as_deref());
    }

    let interval = Duration::from_secs(args.interval);

    // Setup graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    info!("Starting scrape loop over {} devices", scraper.devices().len());

    let mut cycle: u64 = 0;
    while running.load(Ordering::SeqCst) {
        cycle += 1;
        match write_exposition(&registry, args.output.as_deref()) {
            Ok(()) => debug!("Scrape cycle #{} complete", cycle),
            Err(e) => error!("Scrape cycle #{} failed: {}", cycle, e),
        }

        // Sleep with periodic checks for shutdown signal
        let sleep_interval = Duration::from_millis(100);
        let mut remaining = interval;
        while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
            let sleep_time = remaining.min(sleep_interval);
            std::thread::sleep(sleep_time);
            remaining = remaining.saturating_sub(sleep_time);
        }
    }

    info!("Shutdown complete");
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
