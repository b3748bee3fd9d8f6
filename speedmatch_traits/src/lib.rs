pub mod clock;

pub use clock::{Clock, MonotonicClock};

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

/// Name of a track segment, identified by its occupancy detector
/// (e.g. `"LS235"`). Segment identifiers sort and compare by name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentId(String);

impl SegmentId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SegmentId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Direction of travel around the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Direction {
    Forward,
    Reverse,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => f.write_str("fwd"),
            Direction::Reverse => f.write_str("rev"),
        }
    }
}

/// Result of waiting on the detector bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// At least one monitored detector changed occupancy state.
    Changed,
    /// The optional timeout elapsed with no change.
    TimedOut,
}

/// Motion-control collaborator: drives the vehicle at a raw command value.
pub trait Throttle {
    fn drive(
        &mut self,
        command: u8,
        direction: Direction,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn stop(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Sensing collaborator: a set of occupancy detectors on the monitored loop.
///
/// `wait_for_change` suspends the caller until any monitored detector flips
/// state in either direction; activation-only filtering is done by the caller
/// by diffing `active_set` snapshots.
pub trait DetectorBus {
    fn active_set(
        &mut self,
    ) -> Result<BTreeSet<SegmentId>, Box<dyn std::error::Error + Send + Sync>>;

    fn wait_for_change(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<WaitOutcome, Box<dyn std::error::Error + Send + Sync>>;
}

impl<T: Throttle + ?Sized> Throttle for &mut T {
    fn drive(
        &mut self,
        command: u8,
        direction: Direction,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).drive(command, direction)
    }

    fn stop(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).stop()
    }
}

impl<D: DetectorBus + ?Sized> DetectorBus for &mut D {
    fn active_set(
        &mut self,
    ) -> Result<BTreeSet<SegmentId>, Box<dyn std::error::Error + Send + Sync>> {
        (**self).active_set()
    }

    fn wait_for_change(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<WaitOutcome, Box<dyn std::error::Error + Send + Sync>> {
        (**self).wait_for_change(timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_ids_order_by_name() {
        let a = SegmentId::from("LS1");
        let b = SegmentId::from("LS2");
        assert!(a < b);
        assert_eq!(a.as_str(), "LS1");
        assert_eq!(format!("{a}"), "LS1");
    }
}
