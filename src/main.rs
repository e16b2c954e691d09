//! # Plant Mood Application Entry Point
//!
//! Wires the library's render loop to a real panel (or the console) and a
//! Tokio runtime, then runs until Ctrl+C / SIGTERM.
//!
//! ```text
//! plant-mood [CONFIG] [--stdout] [--once] [--verbose]
//! ```
//!
//! - `CONFIG`: path to the JSON configuration (default `plant-mood.json`)
//! - `--stdout`: print frames as ASCII art instead of driving the panel
//! - `--once`: run a single poll cycle and exit
//! - `--verbose`: debug logging

#[cfg(test)]
mod tests;

#[cfg(all(target_os = "linux", feature = "hardware"))]
mod hardware;

use anyhow::{bail, Context};
use log::{error, info, LevelFilter};
use plant_mood_lib::config::{Config, DEFAULT_CONFIG_PATH};
use plant_mood_lib::fonts::FsFontStore;
use plant_mood_lib::network::Iwgetid;
use plant_mood_lib::panel::{ConsolePanel, Panel};
use plant_mood_lib::render_loop::RenderLoop;
use plant_mood_lib::sensor::SensorClient;
use simplelog::SimpleLogger;
use std::env;
use std::path::PathBuf;
use tokio::sync::watch;

/// Command line options.
#[derive(Debug, PartialEq, Eq)]
pub struct Args {
    pub config_path: PathBuf,
    pub development_mode: bool,
    pub once: bool,
    pub verbose: bool,
}

/// Parse arguments (without the program name).
pub fn parse_args<I>(args: I) -> anyhow::Result<Args>
where
    I: IntoIterator<Item = String>,
{
    let mut parsed = Args {
        config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        development_mode: false,
        once: false,
        verbose: false,
    };
    let mut have_path = false;
    for arg in args {
        match arg.as_str() {
            "--stdout" => parsed.development_mode = true,
            "--once" => parsed.once = true,
            "--verbose" | "-v" => parsed.verbose = true,
            flag if flag.starts_with('-') => bail!("unknown option {flag}"),
            path => {
                if have_path {
                    bail!("more than one config path given");
                }
                parsed.config_path = PathBuf::from(path);
                have_path = true;
            }
        }
    }
    Ok(parsed)
}

fn open_panel(config: &Config, development_mode: bool) -> anyhow::Result<Box<dyn Panel>> {
    let hw = &config.hardware;
    if development_mode {
        return Ok(Box::new(ConsolePanel::stdout(hw.width, hw.height)));
    }

    #[cfg(all(target_os = "linux", feature = "hardware"))]
    {
        hardware::open_panel(hw)
    }

    #[cfg(not(all(target_os = "linux", feature = "hardware")))]
    {
        bail!(
            "e-paper support not compiled in (rebuild with --features hardware on Linux), \
             or use --stdout"
        )
    }
}

/// Resolves once the process is asked to stop.
async fn interrupted() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Main application entry point.
fn main() -> anyhow::Result<()> {
    let args = parse_args(env::args().skip(1))?;

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    SimpleLogger::init(level, simplelog::Config::default())?;

    // A missing or broken config is the one fatal startup error
    let config = Config::load(&args.config_path)
        .with_context(|| format!("loading config {}", args.config_path.display()))?;

    let panel = open_panel(&config, args.development_mode)?;
    let sensor = SensorClient::new(config.sensor_base_url())?;
    let mut app = RenderLoop::new(config, panel, Iwgetid::default(), sensor, FsFontStore);

    let rt = tokio::runtime::Runtime::new()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    rt.spawn(async move {
        interrupted().await;
        info!("🛑 Interrupt received, finishing up");
        let _ = shutdown_tx.send(true);
    });

    if args.once {
        let report = rt
            .block_on(app.run_once_or_shutdown(shutdown_rx))
            .inspect_err(|e| error!("❌ {e}"))?;
        if let Some(report) = report {
            info!("Single cycle done: {} -> {:?}", report.state, report.message.text);
        }
        return Ok(());
    }

    rt.block_on(app.run(shutdown_rx)).inspect_err(|e| error!("❌ {e}"))?;
    info!("Bye");
    Ok(())
}
