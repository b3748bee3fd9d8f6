//! Simulated track loop: a vehicle circling detector-bounded segments.
//!
//! The vehicle's speed follows a log-linear model (log speed linear in the
//! command value), so travel time vs. command value is exactly the
//! relationship the core interpolates in log space. Optional multiplicative
//! jitter emulates nondeterministic detector latency.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;
use std::time::Duration;

use speedmatch_traits::clock::ManualClock;
use speedmatch_traits::{DetectorBus, Direction, SegmentId, Throttle, WaitOutcome};

use crate::error::HwError;

/// Log-linear speed model: the vehicle moves at `min_in_per_sec` at command
/// value 1 and `max_in_per_sec` at 255, with log speed linear in between.
#[derive(Debug, Clone, Copy)]
pub struct SpeedModel {
    pub min_in_per_sec: f64,
    pub max_in_per_sec: f64,
}

impl SpeedModel {
    pub fn in_per_sec(&self, command: u8) -> f64 {
        if command == 0 {
            return 0.0;
        }
        let k = (self.max_in_per_sec / self.min_in_per_sec).ln() / 254.0;
        self.min_in_per_sec * (k * f64::from(command - 1)).exp()
    }
}

impl Default for SpeedModel {
    fn default() -> Self {
        // Roughly 1..50 scale mph for an HO locomotive.
        Self {
            min_in_per_sec: 0.2,
            max_in_per_sec: 10.0,
        }
    }
}

// xorshift32; deterministic jitter without pulling in a RNG crate
fn next_unit(state: &mut u32) -> f64 {
    let mut x = (*state).max(1);
    x ^= x << 13;
    x ^= x >> 17;
    x ^= x << 5;
    *state = x;
    f64::from(x) / f64::from(u32::MAX)
}

struct LoopState {
    segments: Vec<(SegmentId, f64)>,
    pos: usize,
    command: u8,
    direction: Direction,
    model: SpeedModel,
    jitter: f64,
    rng: u32,
    clock: ManualClock,
}

impl LoopState {
    fn travel_secs(&mut self) -> f64 {
        let (_, length_in) = self.segments[self.pos];
        let base = length_in / self.model.in_per_sec(self.command);
        if self.jitter > 0.0 {
            let u = next_unit(&mut self.rng); // [0, 1]
            base * (1.0 + self.jitter * (2.0 * u - 1.0))
        } else {
            base
        }
    }

    fn step(&mut self) {
        let n = self.segments.len();
        self.pos = match self.direction {
            Direction::Forward => (self.pos + 1) % n,
            Direction::Reverse => (self.pos + n - 1) % n,
        };
    }
}

/// A simulated loop of segments. Hand out one throttle and one detector bus;
/// both share the loop state and the manual clock.
pub struct SimulatedLoop {
    state: Rc<RefCell<LoopState>>,
}

impl SimulatedLoop {
    /// `segments`: ordered (detector, length in inches) around the loop.
    /// A loop of fewer than two segments has no consecutive activations to
    /// time, so it is rejected.
    pub fn new(
        segments: Vec<(SegmentId, f64)>,
        model: SpeedModel,
        clock: ManualClock,
    ) -> Result<Self, HwError> {
        if segments.len() < 2 {
            return Err(HwError::Bus(format!(
                "a loop needs at least two detector-bounded segments, got {}",
                segments.len()
            )));
        }
        Ok(Self {
            state: Rc::new(RefCell::new(LoopState {
                segments,
                pos: 0,
                command: 0,
                direction: Direction::Forward,
                model,
                jitter: 0.0,
                rng: 0,
                clock,
            })),
        })
    }

    /// Multiplicative travel-time jitter in [1 - j, 1 + j], deterministic
    /// per seed.
    pub fn with_jitter(self, jitter: f64, seed: u32) -> Self {
        {
            let mut st = self.state.borrow_mut();
            st.jitter = jitter.clamp(0.0, 0.9);
            st.rng = seed.max(1);
        }
        self
    }

    pub fn throttle(&self) -> SimThrottle {
        SimThrottle {
            state: Rc::clone(&self.state),
        }
    }

    pub fn detectors(&self) -> SimDetectors {
        SimDetectors {
            state: Rc::clone(&self.state),
        }
    }
}

pub struct SimThrottle {
    state: Rc<RefCell<LoopState>>,
}

impl Throttle for SimThrottle {
    fn drive(
        &mut self,
        command: u8,
        direction: Direction,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut st = self.state.borrow_mut();
        st.command = command;
        st.direction = direction;
        tracing::debug!(command, %direction, "sim throttle set");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut st = self.state.borrow_mut();
        st.command = 0;
        tracing::debug!("sim throttle stopped");
        Ok(())
    }
}

pub struct SimDetectors {
    state: Rc<RefCell<LoopState>>,
}

impl DetectorBus for SimDetectors {
    fn active_set(
        &mut self,
    ) -> Result<BTreeSet<SegmentId>, Box<dyn std::error::Error + Send + Sync>> {
        let st = self.state.borrow();
        let mut set = BTreeSet::new();
        set.insert(st.segments[st.pos].0.clone());
        Ok(set)
    }

    fn wait_for_change(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<WaitOutcome, Box<dyn std::error::Error + Send + Sync>> {
        let mut st = self.state.borrow_mut();
        if st.command == 0 {
            // A stopped vehicle never trips a detector; waiting would hang.
            return Err(Box::new(HwError::Bus(
                "vehicle is stopped; no detector changes will arrive".to_owned(),
            )));
        }
        let travel = Duration::from_secs_f64(st.travel_secs());
        if let Some(limit) = timeout {
            if travel > limit {
                st.clock.advance(limit);
                return Ok(WaitOutcome::TimedOut);
            }
        }
        st.clock.advance(travel);
        st.step();
        Ok(WaitOutcome::Changed)
    }
}
