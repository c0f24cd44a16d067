use std::time::Duration;

/// Tunable knobs for one reading. Defaults give the handheld feel: a
/// half-second tick, a four-tick decision window for the drag heuristic,
/// and a fifteen-tick run capped by the high completion beep.
#[derive(Debug, Clone)]
pub struct MeterConfig {
    /// Interval between readout updates.
    pub tick_interval: Duration,

    /// Ticks after which the reading completes and the target is shown.
    pub tick_budget: u32,

    /// Tick at which accumulated drag hints are evaluated.
    pub decision_point: u32,

    /// Down-right drag hints required to force a near-zero outcome.
    pub hint_threshold: u32,

    /// The ongoing (low) cue replays every this many ticks.
    pub cue_period_ticks: u32,

    /// Poll cadence for the gravity source while a watch is active.
    pub gravity_poll_interval: Duration,

    /// Fixed RNG seed. `None` draws from entropy; set for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(500),
            tick_budget: 15,
            decision_point: 4,
            hint_threshold: 10,
            cue_period_ticks: 8,
            gravity_poll_interval: Duration::from_millis(200),
            seed: None,
        }
    }
}

impl MeterConfig {
    /// Defaults with `FAUXMETER_TICK_MS`, `FAUXMETER_TICK_BUDGET` and
    /// `FAUXMETER_SEED` overrides applied. Unparseable values fall back
    /// silently.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(ms) = env_u64("FAUXMETER_TICK_MS") {
            if ms > 0 {
                config.tick_interval = Duration::from_millis(ms);
            }
        }
        if let Some(budget) = env_u64("FAUXMETER_TICK_BUDGET") {
            if budget > 0 {
                config.tick_budget = budget as u32;
            }
        }
        if let Some(seed) = env_u64("FAUXMETER_SEED") {
            config.seed = Some(seed);
        }

        config
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|value| value.parse().ok())
}
