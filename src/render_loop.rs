//! # Render Loop
//!
//! The whole application is one sequential loop:
//!
//! ```text
//! INIT -> GRID_PREVIEW -> POLL_CYCLE -> POLL_CYCLE -> ... -> SHUTDOWN
//! ```
//!
//! - **INIT**: wake and configure the panel, blank it
//! - **GRID_PREVIEW**: show the calibration grid once, pause briefly
//! - **POLL_CYCLE**: wake panel, check the network, fetch or synthesize a
//!   reading, classify, pick a message, render, display, put panel to sleep,
//!   wait for the next interval
//! - **SHUTDOWN**: on interrupt, wake the panel, blank it and leave it asleep
//!
//! Sensor problems never stop the loop; they only switch the cycle to
//! synthetic values. Any panel error ends the loop, because the panel is the
//! only output there is.
//!
//! The interrupt is cooperative: it is checked before each cycle and raced
//! against the waits between cycles, never in the middle of a panel update.

use crate::config::{Config, Message};
use crate::fallback::SyntheticReadings;
use crate::fonts::FontStore;
use crate::messages;
use crate::mood::{classify, StateKey};
use crate::network::{matches_prefix, NetworkIdentity};
use crate::panel::{Panel, PanelError};
use crate::renderer::{Diagnostics, Renderer};
use crate::sensor::SensorClient;
use crate::{Reading, ReadingOrigin};
use chrono::Local;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

/// Reasons the loop stops with an error.
#[derive(Error, Debug)]
pub enum LoopError {
    /// The panel failed; nothing else can be shown
    #[error("display failed: {0}")]
    Panel(#[from] PanelError),
}

/// What one poll cycle did.
#[derive(Clone, Debug, PartialEq)]
pub struct CycleReport {
    pub reading: Reading,
    pub ssid: Option<String>,
    pub state: StateKey,
    pub message: Message,
}

/// Owns every collaborator for the lifetime of the process.
pub struct RenderLoop<P, N, S> {
    config: Config,
    panel: P,
    network: N,
    sensor: SensorClient,
    renderer: Renderer<S>,
    synthetic: SyntheticReadings,
    rng: StdRng,
}

impl<P, N, S> RenderLoop<P, N, S>
where
    P: Panel,
    N: NetworkIdentity,
    S: FontStore,
{
    pub fn new(config: Config, panel: P, network: N, sensor: SensorClient, fonts: S) -> Self {
        let renderer = Renderer::new(&config, panel.width(), panel.height(), fonts);
        let synthetic = SyntheticReadings::new(config.synthetic_step);
        Self {
            config,
            panel,
            network,
            sensor,
            renderer,
            synthetic,
            rng: StdRng::from_entropy(),
        }
    }

    /// Replace the message RNG, e.g. with a seeded one.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn panel(&self) -> &P {
        &self.panel
    }

    pub fn into_panel(self) -> P {
        self.panel
    }

    /// Run until `shutdown` turns true, then blank the panel.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), LoopError> {
        info!("🌱 Starting render loop");
        self.panel.init()?;
        self.panel.clear()?;

        if self.config.grid_preview {
            info!("Showing calibration grid");
            let grid = self.renderer.grid();
            self.panel.display(&grid)?;
            let pause = Duration::from_secs(self.config.grid_preview_secs);
            if interrupted_during(&mut shutdown, pause).await {
                return self.shutdown();
            }
        }

        let interval = Duration::from_secs(self.config.update_interval);
        loop {
            if *shutdown.borrow() {
                break;
            }
            self.poll_cycle().await?;
            debug!("Sleeping {}s until next cycle", interval.as_secs());
            if interrupted_during(&mut shutdown, interval).await {
                break;
            }
        }
        self.shutdown()
    }

    /// INIT followed by exactly one poll cycle.
    pub async fn run_once(&mut self) -> Result<CycleReport, LoopError> {
        self.panel.init()?;
        self.poll_cycle().await
    }

    /// [`RenderLoop::run_once`], abandoned at its next await point if
    /// `shutdown` turns true; the panel is then blanked and `None` returned.
    pub async fn run_once_or_shutdown(
        &mut self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<Option<CycleReport>, LoopError> {
        let outcome = tokio::select! {
            biased;
            _ = shutdown_requested(&mut shutdown) => None,
            report = self.run_once() => Some(report),
        };
        match outcome {
            Some(report) => report.map(Some),
            None => {
                self.shutdown()?;
                Ok(None)
            }
        }
    }

    /// One full update of the panel.
    pub async fn poll_cycle(&mut self) -> Result<CycleReport, LoopError> {
        // The panel sleeps between cycles and must be woken first
        self.panel.init()?;

        let ssid = self.network.current();
        let reading = self.acquire_reading(ssid.as_deref()).await;
        let state = classify(reading.moisture, reading.light, &self.config.thresholds);
        let message = messages::select(state, &self.config, &mut self.rng);
        info!(
            "📊 [{}] {} moisture={:.2} light={:.2} -> {} -> {:?}",
            ssid.as_deref().unwrap_or("unknown"),
            reading.origin.label(),
            reading.moisture,
            reading.light,
            state,
            message.text
        );

        let diagnostics = Diagnostics {
            reading,
            ssid: ssid.clone(),
            updated_at: Local::now(),
        };
        let frame = self.renderer.compose(&message, &diagnostics);
        self.panel.display(&frame)?;
        self.panel.sleep()?;

        Ok(CycleReport {
            reading,
            ssid,
            state,
            message,
        })
    }

    /// Blank the panel and leave it asleep.
    pub fn shutdown(&mut self) -> Result<(), LoopError> {
        info!("Shutting down: clearing panel");
        self.panel.init()?;
        self.panel.clear()?;
        self.panel.sleep()?;
        Ok(())
    }

    async fn acquire_reading(&mut self, ssid: Option<&str>) -> Reading {
        if matches_prefix(ssid, &self.config.target_ssid_prefix) {
            if let Some((moisture, light)) = self.sensor.reading().await {
                return Reading {
                    moisture,
                    light,
                    origin: ReadingOrigin::Sensor,
                };
            }
            info!("Sensor unavailable, using synthetic values");
        } else {
            debug!(
                "Network {:?} does not match {:?}, skipping sensor",
                ssid, self.config.target_ssid_prefix
            );
        }
        self.synthetic.next_reading()
    }
}

/// Resolves once shutdown is requested; never if the sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Wait for `period`; true if shutdown was requested before it elapsed.
async fn interrupted_during(shutdown: &mut watch::Receiver<bool>, period: Duration) -> bool {
    let sleep = tokio::time::sleep(period);
    tokio::pin!(sleep);
    loop {
        if *shutdown.borrow_and_update() {
            return true;
        }
        tokio::select! {
            _ = &mut sleep => return false,
            changed = shutdown.changed() => {
                if changed.is_err() {
                    // Nobody can signal any more; just finish the wait
                    (&mut sleep).await;
                    return false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::MemoryFontStore;
    use crate::frame::Frame;
    use crate::network::StaticIdentity;
    use crate::sensor::tests::serve;

    #[derive(Default)]
    struct RecordingPanel {
        calls: Vec<&'static str>,
        frames: Vec<Frame>,
        fail_display: bool,
    }

    impl Panel for RecordingPanel {
        fn init(&mut self) -> Result<(), PanelError> {
            self.calls.push("init");
            Ok(())
        }
        fn clear(&mut self) -> Result<(), PanelError> {
            self.calls.push("clear");
            Ok(())
        }
        fn display(&mut self, frame: &Frame) -> Result<(), PanelError> {
            self.calls.push("display");
            if self.fail_display {
                return Err(PanelError("SPI write failed".to_string()));
            }
            self.frames.push(frame.clone());
            Ok(())
        }
        fn sleep(&mut self) -> Result<(), PanelError> {
            self.calls.push("sleep");
            Ok(())
        }
        fn width(&self) -> u32 {
            400
        }
        fn height(&self) -> u32 {
            300
        }
    }

    const CONFIG: &str = r#"{
        "target_ssid_prefix": "PlantPot",
        "update_interval": 60,
        "grid_preview_secs": 3,
        "messages": {
            "dry_dark": ["Thirsty and sleepy"],
            "normal_bright": [{"text": "Life is good", "font_id": 2}]
        }
    }"#;

    fn render_loop(
        panel: RecordingPanel,
        ssid: Option<&str>,
        sensor_url: &str,
    ) -> RenderLoop<RecordingPanel, StaticIdentity, MemoryFontStore> {
        RenderLoop::new(
            Config::from_json_str(CONFIG).unwrap(),
            panel,
            StaticIdentity(ssid.map(str::to_string)),
            SensorClient::new(sensor_url).unwrap(),
            MemoryFontStore::new(),
        )
        .with_rng(StdRng::seed_from_u64(3))
    }

    #[tokio::test]
    async fn test_off_network_uses_synthetic_values() {
        let mut app = render_loop(RecordingPanel::default(), Some("HomeWiFi"), "http://127.0.0.1:9");
        let first = app.poll_cycle().await.unwrap();
        assert_eq!(first.reading.origin, ReadingOrigin::Synthetic);
        assert_eq!(first.reading.moisture, 0.0);
        assert_eq!(first.state, StateKey::DryDark);
        assert_eq!(first.message.text, "Thirsty and sleepy");
        assert_eq!(first.ssid.as_deref(), Some("HomeWiFi"));

        let second = app.poll_cycle().await.unwrap();
        assert!(second.reading.moisture > first.reading.moisture);
        assert_eq!(app.panel().calls, ["init", "display", "sleep", "init", "display", "sleep"]);
    }

    #[tokio::test]
    async fn test_sensor_error_falls_back_and_counters_advance() {
        let addr = serve(vec![("/sensor/moisture", 500, "{}")]).await;
        let mut app = render_loop(
            RecordingPanel::default(),
            Some("PlantPot-42"),
            &format!("http://{}", addr),
        );
        let first = app.poll_cycle().await.unwrap();
        let second = app.poll_cycle().await.unwrap();
        assert_eq!(first.reading.origin, ReadingOrigin::Synthetic);
        assert_eq!(second.reading.origin, ReadingOrigin::Synthetic);
        assert!((second.reading.moisture - first.reading.moisture - 0.1).abs() < 1e-9);
        assert!((second.reading.light - first.reading.light - 0.1).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_live_reading_drives_state() {
        let addr = serve(vec![
            ("/sensor/moisture", 200, r#"{"value": 2.0}"#),
            ("/sensor/light", 200, r#"{"value": 2.0}"#),
        ])
        .await;
        let mut app = render_loop(
            RecordingPanel::default(),
            Some("PlantPot-42"),
            &format!("http://{}", addr),
        );
        let report = app.poll_cycle().await.unwrap();
        assert_eq!(report.reading.origin, ReadingOrigin::Sensor);
        assert_eq!(report.state, StateKey::NormalBright);
        assert_eq!(
            report.message,
            Message {
                text: "Life is good".to_string(),
                font_id: 2
            }
        );
        assert_eq!(app.panel().frames.len(), 1);
        assert!(app.panel().frames[0].ink_count() > 0);
    }

    #[tokio::test]
    async fn test_unconfigured_state_shows_placeholder() {
        let addr = serve(vec![
            ("/sensor/moisture", 200, r#"{"value": 9.0}"#),
            ("/sensor/light", 200, r#"{"value": 0.0}"#),
        ])
        .await;
        let mut app = render_loop(
            RecordingPanel::default(),
            Some("PlantPot"),
            &format!("http://{}", addr),
        );
        let report = app.poll_cycle().await.unwrap();
        assert_eq!(report.state, StateKey::WetDark);
        assert_eq!(report.message.text, messages::PLACEHOLDER_TEXT);
    }

    #[tokio::test]
    async fn test_shutdown_before_first_cycle() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let mut app = render_loop(RecordingPanel::default(), None, "http://127.0.0.1:9");
        app.run(rx).await.unwrap();
        assert_eq!(
            app.panel().calls,
            ["init", "clear", "display", "init", "clear", "sleep"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_cycles_until_interrupted() {
        let (tx, rx) = watch::channel(false);
        let mut app = render_loop(RecordingPanel::default(), None, "http://127.0.0.1:9");
        let interrupt = async {
            // grid at 0s, cycles at 3s, 63s, 123s
            tokio::time::sleep(Duration::from_secs(150)).await;
            tx.send(true).unwrap();
        };
        let (result, ()) = tokio::join!(app.run(rx), interrupt);
        result.unwrap();

        let calls = &app.panel().calls;
        assert_eq!(calls.iter().filter(|c| **c == "display").count(), 4);
        // Once after INIT, once at SHUTDOWN
        assert_eq!(calls.iter().filter(|c| **c == "clear").count(), 2);
        assert_eq!(&calls[calls.len() - 3..], ["init", "clear", "sleep"]);
    }

    #[tokio::test]
    async fn test_display_error_aborts() {
        let panel = RecordingPanel {
            fail_display: true,
            ..Default::default()
        };
        let (_tx, rx) = watch::channel(false);
        let mut app = render_loop(panel, None, "http://127.0.0.1:9");
        let err = app.run(rx).await.unwrap_err();
        assert!(matches!(err, LoopError::Panel(_)));
        // Nothing is attempted after the failed update
        assert_eq!(app.panel().calls, ["init", "clear", "display"]);
    }

    #[tokio::test]
    async fn test_run_once() {
        let mut app = render_loop(RecordingPanel::default(), None, "http://127.0.0.1:9");
        let report = app.run_once().await.unwrap();
        assert_eq!(report.reading.origin, ReadingOrigin::Synthetic);
        assert_eq!(app.panel().calls, ["init", "init", "display", "sleep"]);
    }

    #[tokio::test]
    async fn test_blank_panel_before_grid() {
        let (tx, rx) = watch::channel(false);
        let mut app = render_loop(RecordingPanel::default(), None, "http://127.0.0.1:9");
        tx.send(true).unwrap();
        app.run(rx).await.unwrap();
        assert_eq!(&app.panel().calls[..3], ["init", "clear", "display"]);
        assert_eq!(app.panel().frames[0].ink_count(), app.renderer.grid().ink_count());
    }

    #[tokio::test]
    async fn test_single_cycle_completes_without_interrupt() {
        let (_tx, rx) = watch::channel(false);
        let mut app = render_loop(RecordingPanel::default(), None, "http://127.0.0.1:9");
        let report = app.run_once_or_shutdown(rx).await.unwrap();
        assert!(report.is_some());
        assert_eq!(app.panel().calls, ["init", "init", "display", "sleep"]);
    }

    #[tokio::test]
    async fn test_single_cycle_interrupted_before_start_blanks_panel() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let mut app = render_loop(RecordingPanel::default(), None, "http://127.0.0.1:9");
        let report = app.run_once_or_shutdown(rx).await.unwrap();
        assert!(report.is_none());
        assert_eq!(app.panel().calls, ["init", "clear", "sleep"]);
    }

    #[tokio::test]
    async fn test_single_cycle_interrupted_during_fetch_blanks_panel() {
        // Accepts connections and never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let (tx, rx) = watch::channel(false);
        let mut app = render_loop(
            RecordingPanel::default(),
            Some("PlantPot-1"),
            &format!("http://{}", addr),
        );
        let interrupt = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            tx.send(true).unwrap();
        };
        let (report, ()) = tokio::join!(app.run_once_or_shutdown(rx), interrupt);
        assert!(report.unwrap().is_none());
        assert_eq!(app.panel().calls, ["init", "init", "init", "clear", "sleep"]);
        assert!(app.panel().frames.is_empty());
    }
}
