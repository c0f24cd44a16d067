use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use tokio::{
    sync::{mpsc::UnboundedSender, Mutex},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use uuid::Uuid;

use crate::{
    audio::{Cue, CuePlayer},
    config::MeterConfig,
    panel::PanelEvent,
    sensing::{GravitySource, GravityWatcher},
};

use super::{MeterState, MeterStatus, TouchPoint};

/// Serializable copy of the session state, for front-ends and the JSON
/// stream.
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MeterSnapshot {
    pub status: MeterStatus,
    pub reading_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub current: f64,
    pub target: f64,
    pub tick_count: u32,
    pub zero_hints: u32,
    pub sensor_present: bool,
}

/// Runs a reading end to end, from finger-down through ticker and gravity
/// watch to the verdict. The state machine itself lives behind one mutex;
/// every panel event is sent while that mutex is held, so the display
/// stream can never interleave a stale readout after a verdict.
#[derive(Clone)]
pub struct MeterController {
    state: Arc<Mutex<MeterState>>,
    config: MeterConfig,
    cues: Arc<dyn CuePlayer>,
    gravity: Option<Arc<dyn GravitySource>>,
    panel: UnboundedSender<PanelEvent>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    watcher: Arc<Mutex<GravityWatcher>>,
}

impl MeterController {
    /// Gravity availability is fixed here, at construction; a controller
    /// built without a source runs the drag heuristic for its whole life.
    pub fn new(
        config: MeterConfig,
        cues: Arc<dyn CuePlayer>,
        gravity: Option<Arc<dyn GravitySource>>,
        panel: UnboundedSender<PanelEvent>,
    ) -> Self {
        let state = MeterState::new(gravity.is_some(), &config);
        Self {
            state: Arc::new(Mutex::new(state)),
            config,
            cues,
            gravity,
            panel,
            ticker: Arc::new(Mutex::new(None)),
            watcher: Arc::new(Mutex::new(GravityWatcher::new())),
        }
    }

    pub async fn snapshot(&self) -> MeterSnapshot {
        let guard = self.state.lock().await;
        MeterSnapshot {
            status: guard.status,
            reading_id: guard.reading_id.clone(),
            started_at: guard.started_at,
            current: guard.current,
            target: guard.target,
            tick_count: guard.tick_count,
            zero_hints: guard.zero_hints,
            sensor_present: guard.sensor_present(),
        }
    }

    /// Finger down: start a reading. An in-flight reading is quietly
    /// cancelled first, with no BAD READ stamped, so the new one starts
    /// from a clean slate.
    pub async fn press(&self) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            if state.is_reading() {
                state.reset();
            }
        }
        self.cancel_ticker().await;
        self.watcher.lock().await.stop_watch().await?;
        self.cues.stop_all();

        let reading_id = Uuid::new_v4().to_string();
        {
            let mut state = self.state.lock().await;
            let opening = state.begin(reading_id.clone(), Utc::now());
            self.emit(PanelEvent::GivenLabel { visible: false });
            self.emit(PanelEvent::Readout { value: opening });
        }
        self.cues.play(Cue::Start);
        info!(
            "reading {} started ({})",
            reading_id,
            if self.gravity.is_some() {
                "gravity sensor"
            } else {
                "drag heuristic"
            }
        );

        if let Some(source) = self.gravity.clone() {
            self.watcher.lock().await.start_watch(
                source,
                self.state.clone(),
                self.config.gravity_poll_interval,
            )?;
        }

        self.spawn_ticker().await;
        Ok(())
    }

    /// Drag gesture while the finger is down. Feeds the down-right
    /// heuristic; harmless at any other time.
    pub async fn drag(&self, point: TouchPoint) {
        let mut state = self.state.lock().await;
        state.observe_drag(point);
    }

    /// Finger lifted. An in-flight reading aborts to BAD READ; calling this
    /// when nothing is running (or twice) does nothing.
    pub async fn release(&self) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            if !state.abort() {
                return Ok(());
            }
            self.emit(PanelEvent::GivenLabel { visible: false });
            self.emit(PanelEvent::BadRead);
        }

        self.watcher.lock().await.stop_watch().await?;
        self.cancel_ticker().await;
        self.cues.stop_all();
        info!("reading aborted: finger lifted early");
        Ok(())
    }

    /// External teardown, the screen-going-away path: stop the ticker, the
    /// gravity watch and all audio no matter what state the reading is in.
    pub async fn shutdown(&self) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            state.reset();
        }
        self.cancel_ticker().await;
        self.watcher.lock().await.stop_watch().await?;
        self.cues.stop_all();
        Ok(())
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let state = self.state.clone();
        let panel = self.panel.clone();
        let cues = self.cues.clone();
        let watcher = self.watcher.clone();
        let tick_interval = self.config.tick_interval;
        let tick_budget = self.config.tick_budget;
        let cue_period = self.config.cue_period_ticks;

        let handle = tokio::spawn(async move {
            // First tick lands one interval after the press, not immediately.
            let mut interval = time::interval_at(time::Instant::now() + tick_interval, tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut ticks: u32 = 0;

            loop {
                interval.tick().await;

                let live = {
                    let mut guard = state.lock().await;
                    match guard.apply_tick() {
                        Some(value) => {
                            let _ = panel.send(PanelEvent::Readout { value });
                            true
                        }
                        // Released or torn down between ticks.
                        None => false,
                    }
                };
                if !live {
                    break;
                }

                ticks += 1;

                if ticks >= tick_budget {
                    let verdict = {
                        let mut guard = state.lock().await;
                        let verdict = guard.complete();
                        if let Some(value) = verdict {
                            let _ = panel.send(PanelEvent::Readout { value });
                            let _ = panel.send(PanelEvent::GivenLabel { visible: true });
                        }
                        verdict
                    };

                    if let Some(value) = verdict {
                        // Reap the single-shot watch so the next press
                        // starts clean.
                        if let Err(err) = watcher.lock().await.stop_watch().await {
                            warn!("failed to stop gravity watch after completion: {:#}", err);
                        }
                        cues.play(Cue::Complete);
                        info!("reading complete: verdict {}", value);
                    }
                    break;
                }

                if cue_period > 0 && ticks % cue_period == 0 {
                    cues.play(Cue::Ongoing);
                }
            }
        });

        *ticker_guard = Some(handle);
    }

    async fn cancel_ticker(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
    }

    fn emit(&self, event: PanelEvent) {
        // The panel may already be gone during teardown; the reading
        // doesn't care.
        let _ = self.panel.send(event);
    }
}
