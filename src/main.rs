//! Grind Sentinel CLI
//!
//! Classify screenshots, replay them through the attempt monitor, and
//! manage network adapters from the command line.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use grind_sentinel::config::Settings;
use grind_sentinel::grind::AttemptMonitor;
use grind_sentinel::network::{
    NetworkAdapterController, PowerShellPlatform, ReachabilityProbe, SystemClock,
};
use grind_sentinel::vision::{ColorStateClassifier, FrameSource, ImageSequence, RelativeRect};
use grind_sentinel::{GrindSession, SessionError};

/// Grind Sentinel - progress bar watcher and airplane-mode helper
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Settings file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the progress bar state of each screenshot
    Classify {
        images: Vec<PathBuf>,
        /// Progress bar region as relative x,y,width,height
        #[arg(long, value_parser = parse_region)]
        region: Option<RelativeRect>,
    },
    /// Feed screenshots through the attempt monitor
    Replay {
        images: Vec<PathBuf>,
        /// Override monitor.max_attempts
        #[arg(long)]
        max_attempts: Option<u32>,
    },
    /// List network adapters
    Adapters,
    /// Enable or disable adapters by id
    Toggle {
        state: AdapterState,
        ids: Vec<String>,
        /// Wait until connectivity confirms the change
        #[arg(long)]
        wait: bool,
        /// Wait timeout in seconds
        #[arg(long, value_parser = parse_timeout)]
        timeout: Option<Duration>,
    },
    /// Run a full session over screenshots, toggling configured adapters
    Run { images: Vec<PathBuf> },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AdapterState {
    On,
    Off,
}

fn parse_region(value: &str) -> Result<RelativeRect, String> {
    let parts = value
        .split(',')
        .map(|p| p.trim().parse::<f32>().map_err(|e| e.to_string()))
        .collect::<Result<Vec<_>, _>>()?;

    match parts[..] {
        [x, y, width, height] => Ok(RelativeRect {
            x,
            y,
            width,
            height,
        }),
        _ => Err("expected x,y,width,height".to_string()),
    }
}

fn parse_timeout(value: &str) -> Result<Duration, String> {
    let secs = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("{}: {}", value, e))?;

    if !secs.is_finite() || secs <= 0.0 {
        return Err(format!("{} is not a positive number of seconds", value));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| format!("{}: {}", value, e))
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), SessionError> {
    let settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    match args.command {
        Commands::Classify { images, region } => {
            let classifier = ColorStateClassifier::new();
            let region = region.or(settings.session.progress_bar_region);

            for path in images {
                let mut source = ImageSequence::new(vec![path.clone()]).with_region(region);
                if let Some(frame) = source.next_frame()? {
                    println!("{}: {}", path.display(), classifier.classify(frame.view())?);
                }
            }
        }
        Commands::Replay {
            images,
            max_attempts,
        } => {
            let max_attempts = max_attempts.unwrap_or(settings.monitor.max_attempts);
            let mut monitor = AttemptMonitor::new(ColorStateClassifier::new(), max_attempts)?;
            let region = settings.session.progress_bar_region;
            let mut source = ImageSequence::new(images).with_region(region);

            let mut reason = None;
            while let Some(frame) = source.next_frame()? {
                let state = monitor.process(frame.view())?;
                println!("{:>3}  {}", monitor.fail_count(), state);

                reason = monitor.stop_reason();
                if reason.is_some() {
                    break;
                }
            }

            match reason {
                Some(reason) => println!("Stopped: {} ({} fails)", reason, monitor.fail_count()),
                None => println!("No stop condition ({} fails)", monitor.fail_count()),
            }
        }
        Commands::Adapters => {
            let controller = controller(&settings)?;
            for adapter in controller.list_adapters()? {
                let status = if adapter.enabled {
                    "enabled"
                } else {
                    "disabled"
                };
                println!(
                    "{}  {:<8} {:<24} {}",
                    adapter.id,
                    status,
                    adapter.name,
                    adapter.kind.as_deref().unwrap_or("-")
                );
            }
        }
        Commands::Toggle {
            state,
            ids,
            wait,
            timeout,
        } => {
            let controller = controller(&settings)?;
            let ids = if ids.is_empty() {
                settings.network.adapter_ids.clone()
            } else {
                ids
            };

            let enable = matches!(state, AdapterState::On);
            if !controller.toggle(&ids, enable, wait, timeout)? {
                return Err(SessionError::AdaptersUnavailable(ids.join(", ")));
            }
            println!("Adapters {}", if enable { "enabled" } else { "disabled" });
        }
        Commands::Run { images } => {
            let region = settings.session.progress_bar_region;
            let mut session = GrindSession::from_settings(settings)?;
            let mut source = ImageSequence::new(images).with_region(region);

            let report = session.run(&mut source)?;
            println!(
                "{:?}: {} fails over {} frames (last state: {})",
                report.end,
                report.fail_count,
                report.frames,
                report.last_state.map_or("none", |s| s.as_str())
            );
        }
    }

    Ok(())
}

type Controller = NetworkAdapterController<PowerShellPlatform, ReachabilityProbe, SystemClock>;

fn controller(settings: &Settings) -> Result<Controller, SessionError> {
    settings.validate()?;
    let probe = ReachabilityProbe::new(settings.probe.probe_options()?);
    Ok(NetworkAdapterController::with_clock(
        PowerShellPlatform::new(),
        probe,
        SystemClock,
        settings.network.controller_options(),
    ))
}
