//! Scripted throttle and detector-bus mocks for exercising the acquisition
//! state machine without hardware.

use std::collections::{BTreeSet, VecDeque};
use std::time::Duration;

use speedmatch_traits::clock::ManualClock;
use speedmatch_traits::{DetectorBus, Direction, SegmentId, Throttle, WaitOutcome};

/// Records every command it is given; never fails.
#[derive(Debug, Default)]
pub struct ScriptedThrottle {
    pub commands: Vec<(u8, Direction)>,
    pub stop_count: usize,
}

impl Throttle for ScriptedThrottle {
    fn drive(
        &mut self,
        command: u8,
        direction: Direction,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.commands.push((command, direction));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.stop_count += 1;
        Ok(())
    }
}

/// One scripted wakeup of the detector bus.
#[derive(Debug, Clone)]
pub struct ScriptedEvent {
    /// Simulated time that passes before the wait returns.
    pub advance: Duration,
    /// Occupancy snapshot visible after the wakeup.
    pub active: BTreeSet<SegmentId>,
    /// Whether the wait reports a change or a timeout.
    pub outcome: WaitOutcome,
}

impl ScriptedEvent {
    pub fn change(advance_secs: f64, active: &[&str]) -> Self {
        Self {
            advance: Duration::from_secs_f64(advance_secs),
            active: active.iter().map(|n| SegmentId::from(*n)).collect(),
            outcome: WaitOutcome::Changed,
        }
    }

    pub fn timeout(advance_secs: f64) -> Self {
        Self {
            advance: Duration::from_secs_f64(advance_secs),
            active: BTreeSet::new(),
            outcome: WaitOutcome::TimedOut,
        }
    }
}

/// Replays a fixed sequence of occupancy snapshots, advancing a shared
/// `ManualClock` by each event's duration so travel times are deterministic.
pub struct ScriptedDetectors {
    current: BTreeSet<SegmentId>,
    events: VecDeque<ScriptedEvent>,
    clock: Option<ManualClock>,
}

impl ScriptedDetectors {
    pub fn new(events: Vec<ScriptedEvent>) -> Self {
        Self {
            current: BTreeSet::new(),
            events: events.into(),
            clock: None,
        }
    }

    pub fn with_initial(mut self, active: &[&str]) -> Self {
        self.current = active.iter().map(|n| SegmentId::from(*n)).collect();
        self
    }

    pub fn with_clock(mut self, clock: ManualClock) -> Self {
        self.clock = Some(clock);
        self
    }
}

impl DetectorBus for ScriptedDetectors {
    fn active_set(
        &mut self,
    ) -> Result<BTreeSet<SegmentId>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.current.clone())
    }

    fn wait_for_change(
        &mut self,
        _timeout: Option<Duration>,
    ) -> Result<WaitOutcome, Box<dyn std::error::Error + Send + Sync>> {
        let Some(event) = self.events.pop_front() else {
            return Err("detector script exhausted".into());
        };
        if let Some(clock) = &self.clock {
            clock.advance(event.advance);
        }
        if event.outcome == WaitOutcome::Changed {
            self.current = event.active;
        }
        Ok(event.outcome)
    }
}
