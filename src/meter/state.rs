use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::config::MeterConfig;
use crate::sensing::GravityVector;

/// Fraction of the remaining gap closed on every tick. Large enough that the
/// readout visibly settles within the tick budget, small enough that it never
/// overshoots.
pub const APPROACH_STEP: f64 = 0.5;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MeterStatus {
    Idle,
    Reading,
    Done,
    BadRead,
}

impl Default for MeterStatus {
    fn default() -> Self {
        MeterStatus::Idle
    }
}

/// Finger position on the touch surface, in surface coordinates growing
/// right and down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    pub x: f32,
    pub y: f32,
}

/// One simulated measurement from finger-down to verdict.
///
/// This is the whole decision machine. It draws the opening and target
/// values and eases the readout toward the target on every tick; a gravity
/// sample or the down-right drag heuristic can force the verdict to (nearly)
/// zero. It performs no I/O; the controller owns it behind a mutex and turns
/// its return values into panel events.
pub struct MeterState {
    pub status: MeterStatus,
    pub reading_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    /// Value currently on the readout, eased toward `target` each tick.
    pub current: f64,
    /// Value the readout settles on if the reading completes.
    pub target: f64,
    /// Ticks elapsed inside the heuristic window. Only counted when no
    /// gravity source exists; the decision fires the moment it reaches
    /// `decision_point`.
    pub tick_count: u32,
    /// Drag moves so far that pointed down-and-right.
    pub zero_hints: u32,
    decision_point: u32,
    hint_threshold: u32,
    last_touch: Option<TouchPoint>,
    sensor_present: bool,
    rng: StdRng,
}

impl MeterState {
    pub fn new(sensor_present: bool, config: &MeterConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            status: MeterStatus::Idle,
            reading_id: None,
            started_at: None,
            current: 0.0,
            target: 0.0,
            tick_count: 0,
            zero_hints: 0,
            decision_point: config.decision_point,
            hint_threshold: config.hint_threshold,
            last_touch: None,
            sensor_present,
            rng,
        }
    }

    pub fn is_reading(&self) -> bool {
        self.status == MeterStatus::Reading
    }

    pub fn sensor_present(&self) -> bool {
        self.sensor_present
    }

    /// Start a fresh reading: draw the opening value and the target, clear
    /// every heuristic counter. Returns the opening value for the panel.
    pub fn begin(&mut self, reading_id: String, started_at: DateTime<Utc>) -> f64 {
        self.status = MeterStatus::Reading;
        self.reading_id = Some(reading_id);
        self.started_at = Some(started_at);
        self.current = self.rng.gen_range(0.8..0.9);
        self.target = self.rng.gen_range(1.0..1.1);
        self.tick_count = 0;
        self.zero_hints = 0;
        self.last_touch = None;
        self.current
    }

    /// One readout update. Without a gravity source this also advances the
    /// heuristic window and, exactly once when the window closes, turns
    /// accumulated drag hints into the zero verdict. Returns the eased value
    /// to display, or `None` when the reading is no longer live.
    pub fn apply_tick(&mut self) -> Option<f64> {
        if !self.is_reading() {
            return None;
        }
        if !self.sensor_present {
            self.tick_count += 1;
            if self.tick_count == self.decision_point && self.zero_hints >= self.hint_threshold {
                self.decide_zero();
            }
        }
        self.current += (self.target - self.current) * APPROACH_STEP;
        Some(self.current)
    }

    /// Record a drag move. A move counts as a hint only when both axes grew
    /// since the previous recorded point; the very first point just seeds the
    /// comparison. Ignored outside a live reading or once the heuristic
    /// window has closed.
    pub fn observe_drag(&mut self, point: TouchPoint) {
        if !self.is_reading() || self.tick_count >= self.decision_point {
            return;
        }
        if let Some(last) = self.last_touch {
            if point.x > last.x && point.y > last.y {
                self.zero_hints += 1;
            }
        }
        self.last_touch = Some(point);
    }

    /// Apply the one gravity sample a reading ever sees. A vector tipping
    /// negative on its primary axis forces the zero verdict. Returns whether
    /// the verdict was forced.
    pub fn observe_gravity(&mut self, sample: GravityVector) -> bool {
        if !self.is_reading() {
            return false;
        }
        if sample.x < 0.0 {
            self.decide_zero();
            true
        } else {
            false
        }
    }

    /// Natural end of a reading. The panel shows `target`, not `current`:
    /// the eased value was only ever theater. Returns the verdict, or `None`
    /// if the reading already ended.
    pub fn complete(&mut self) -> Option<f64> {
        if !self.is_reading() {
            return None;
        }
        self.status = MeterStatus::Done;
        Some(self.target)
    }

    /// Finger lifted before the verdict. Returns `false` when there was
    /// nothing to abort, which makes repeated calls harmless.
    pub fn abort(&mut self) -> bool {
        if !self.is_reading() {
            return false;
        }
        self.status = MeterStatus::BadRead;
        true
    }

    /// External teardown: back to idle no matter what state the reading was
    /// in. The RNG survives so a seeded run stays reproducible.
    pub fn reset(&mut self) {
        self.status = MeterStatus::Idle;
        self.reading_id = None;
        self.started_at = None;
        self.tick_count = 0;
        self.zero_hints = 0;
        self.last_touch = None;
    }

    fn decide_zero(&mut self) {
        self.target = self.rng.gen_range(0.0..0.0001);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(sensor_present: bool, seed: u64) -> MeterState {
        let config = MeterConfig {
            seed: Some(seed),
            ..MeterConfig::default()
        };
        MeterState::new(sensor_present, &config)
    }

    fn begin(state: &mut MeterState) -> f64 {
        state.begin("reading-under-test".into(), Utc::now())
    }

    /// Feed `count` straight down-right moves, plus the seeding first point.
    fn drag_down_right(state: &mut MeterState, count: u32) {
        state.observe_drag(TouchPoint { x: 10.0, y: 10.0 });
        for i in 0..count {
            state.observe_drag(TouchPoint {
                x: 11.0 + i as f32,
                y: 11.0 + i as f32,
            });
        }
    }

    #[test]
    fn draws_land_in_range_for_many_seeds() {
        for seed in 0..200 {
            let mut state = seeded(false, seed);
            let opening = begin(&mut state);
            assert!((0.8..0.9).contains(&opening), "seed {seed}: {opening}");
            assert!((0.8..0.9).contains(&state.current));
            assert!((1.0..1.1).contains(&state.target), "seed {seed}: {}", state.target);
        }
    }

    #[test]
    fn forced_target_lands_in_zero_band() {
        for seed in 0..200 {
            let mut state = seeded(false, seed);
            begin(&mut state);
            state.decide_zero();
            assert!(
                (0.0..0.0001).contains(&state.target),
                "seed {seed}: {}",
                state.target
            );
        }
    }

    #[test]
    fn tick_rule_halves_the_gap() {
        let mut state = seeded(false, 7);
        begin(&mut state);
        state.current = 0.85;
        state.target = 1.05;

        let mut expected = 0.85_f64;
        for _ in 0..6 {
            expected += (1.05 - expected) * APPROACH_STEP;
            let shown = state.apply_tick().expect("reading is live");
            assert!((shown - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn convergence_is_monotonic_without_overshoot() {
        let mut state = seeded(false, 3);
        begin(&mut state);
        state.current = 0.8;
        state.target = 1.1;

        let mut prev = state.current;
        for _ in 0..50 {
            let shown = state.apply_tick().unwrap();
            assert!(shown > prev, "readout went backwards");
            assert!(shown <= state.target, "readout overshot the target");
            prev = shown;
        }
        assert!((state.target - prev).abs() < 1e-9);
    }

    #[test]
    fn hint_flood_forces_zero_exactly_at_the_decision_point() {
        let mut state = seeded(false, 11);
        begin(&mut state);
        drag_down_right(&mut state, 10);
        assert_eq!(state.zero_hints, 10);

        for _ in 0..3 {
            state.apply_tick();
            assert!(state.target >= 1.0, "verdict forced before the window closed");
        }
        state.apply_tick();
        assert!(state.target < 0.0001, "verdict not forced at the decision point");
    }

    #[test]
    fn too_few_hints_never_force_zero() {
        let mut state = seeded(false, 13);
        begin(&mut state);
        drag_down_right(&mut state, 9);

        for _ in 0..15 {
            state.apply_tick();
        }
        assert!((1.0..1.1).contains(&state.target));
    }

    #[test]
    fn first_touch_only_seeds_the_comparison() {
        let mut state = seeded(false, 17);
        begin(&mut state);

        state.observe_drag(TouchPoint { x: 40.0, y: 40.0 });
        assert_eq!(state.zero_hints, 0);

        // Up-left: no hint, but the point is still recorded.
        state.observe_drag(TouchPoint { x: 20.0, y: 20.0 });
        assert_eq!(state.zero_hints, 0);

        state.observe_drag(TouchPoint { x: 21.0, y: 21.0 });
        assert_eq!(state.zero_hints, 1);
    }

    #[test]
    fn one_axis_alone_is_not_a_hint() {
        let mut state = seeded(false, 19);
        begin(&mut state);
        state.observe_drag(TouchPoint { x: 10.0, y: 10.0 });
        state.observe_drag(TouchPoint { x: 15.0, y: 10.0 });
        state.observe_drag(TouchPoint { x: 15.0, y: 15.0 });
        assert_eq!(state.zero_hints, 0);
    }

    #[test]
    fn drags_after_the_window_are_ignored() {
        let mut state = seeded(false, 23);
        begin(&mut state);
        for _ in 0..4 {
            state.apply_tick();
        }
        drag_down_right(&mut state, 20);
        assert_eq!(state.zero_hints, 0);

        for _ in 0..11 {
            state.apply_tick();
        }
        assert!((1.0..1.1).contains(&state.target));
    }

    #[test]
    fn gravity_tip_forces_zero() {
        let mut state = seeded(true, 29);
        begin(&mut state);
        let decided = state.observe_gravity(GravityVector {
            x: -0.3,
            y: 9.7,
            z: 0.4,
        });
        assert!(decided);
        assert!(state.target < 0.0001);
    }

    #[test]
    fn level_gravity_leaves_the_target_alone() {
        let mut state = seeded(true, 31);
        begin(&mut state);
        let before = state.target;
        let decided = state.observe_gravity(GravityVector {
            x: 2.1,
            y: 9.5,
            z: 0.0,
        });
        assert!(!decided);
        assert_eq!(state.target, before);
    }

    #[test]
    fn gravity_after_the_reading_ended_is_inert() {
        let mut state = seeded(true, 37);
        begin(&mut state);
        state.complete();
        let before = state.target;
        assert!(!state.observe_gravity(GravityVector {
            x: -5.0,
            y: 0.0,
            z: 0.0,
        }));
        assert_eq!(state.target, before);
    }

    #[test]
    fn sensor_presence_disables_the_heuristic_window() {
        let mut state = seeded(true, 41);
        begin(&mut state);
        drag_down_right(&mut state, 15);
        for _ in 0..10 {
            state.apply_tick();
        }
        assert_eq!(state.tick_count, 0);
        assert!((1.0..1.1).contains(&state.target));
    }

    #[test]
    fn completion_returns_the_target_and_seals_the_reading() {
        let mut state = seeded(false, 43);
        begin(&mut state);
        let target = state.target;

        assert_eq!(state.complete(), Some(target));
        assert_eq!(state.status, MeterStatus::Done);
        assert_eq!(state.target, target);

        // Sealed: nothing moves the reading any more.
        assert_eq!(state.apply_tick(), None);
        assert_eq!(state.complete(), None);
        assert!(!state.abort());
        assert_eq!(state.status, MeterStatus::Done);
    }

    #[test]
    fn abort_is_idempotent() {
        let mut state = seeded(false, 47);
        begin(&mut state);
        assert!(state.abort());
        assert_eq!(state.status, MeterStatus::BadRead);
        assert!(!state.abort());
        assert_eq!(state.complete(), None);
        assert_eq!(state.status, MeterStatus::BadRead);
    }

    #[test]
    fn forcing_zero_twice_is_harmless() {
        let mut state = seeded(false, 53);
        begin(&mut state);
        state.decide_zero();
        state.decide_zero();
        assert!((0.0..0.0001).contains(&state.target));
    }

    #[test]
    fn a_new_reading_clears_the_previous_one() {
        let mut state = seeded(false, 59);
        begin(&mut state);
        drag_down_right(&mut state, 12);
        state.apply_tick();
        state.abort();
        let first_id = state.reading_id.clone();

        let opening = state.begin("second".into(), Utc::now());
        assert_eq!(state.status, MeterStatus::Reading);
        assert!((0.8..0.9).contains(&opening));
        assert_eq!(state.tick_count, 0);
        assert_eq!(state.zero_hints, 0);
        assert!(state.last_touch.is_none());
        assert_ne!(state.reading_id, first_id);
    }

    #[test]
    fn reset_returns_to_idle_from_any_state() {
        let mut state = seeded(false, 61);
        begin(&mut state);
        state.apply_tick();
        state.reset();
        assert_eq!(state.status, MeterStatus::Idle);
        assert!(state.reading_id.is_none());
        assert!(state.started_at.is_none());

        // Reset while idle is also fine.
        state.reset();
        assert_eq!(state.status, MeterStatus::Idle);
    }
}
