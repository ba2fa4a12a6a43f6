//! Mandatory stop times.

use crate::error::{Result, TiaError};

/// Sorted set of future breakpoints.
///
/// Points closer than `tolerance` are merged.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakpointSchedule {
    points: Vec<f64>,
    tolerance: f64,
}

impl BreakpointSchedule {
    /// Empty schedule merging points closer than `tolerance`.
    pub fn new(tolerance: f64) -> Self {
        Self {
            points: Vec::new(),
            tolerance: tolerance.abs(),
        }
    }

    /// Merge tolerance.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Number of scheduled points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True if nothing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Scheduled points in increasing order.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().copied()
    }

    /// Schedule `time`.
    ///
    /// A breakpoint earlier than `current_time` is a caller error.
    pub fn add(&mut self, time: f64, current_time: f64) -> Result<()> {
        if time < current_time - self.tolerance {
            return Err(TiaError::BreakpointInPast {
                breakpoint: time,
                current_time,
            });
        }
        let idx = self.points.partition_point(|&p| p < time);
        let near_prev = idx > 0 && time - self.points[idx - 1] <= self.tolerance;
        let near_next = idx < self.points.len() && self.points[idx] - time <= self.tolerance;
        if !near_prev && !near_next {
            self.points.insert(idx, time);
        }
        Ok(())
    }

    /// Schedule every time in `times`.
    pub fn extend<I>(&mut self, times: I, current_time: f64) -> Result<()>
    where
        I: IntoIterator<Item = f64>,
    {
        for t in times {
            self.add(t, current_time)?;
        }
        Ok(())
    }

    /// First breakpoint strictly after `time` (beyond the tolerance).
    pub fn next_after(&self, time: f64) -> Option<f64> {
        let idx = self.points.partition_point(|&p| p <= time + self.tolerance);
        self.points.get(idx).copied()
    }

    /// Nearest stop time after `current_time`, capped by `final_time`.
    pub fn stop_time(&self, current_time: f64, final_time: f64) -> f64 {
        self.next_after(current_time)
            .map_or(final_time, |bp| bp.min(final_time))
    }

    /// True if `time` lies on a breakpoint.
    pub fn contains(&self, time: f64) -> bool {
        let idx = self.points.partition_point(|&p| p < time - self.tolerance);
        self.points
            .get(idx)
            .is_some_and(|&p| (p - time).abs() <= self.tolerance)
    }

    /// Drop every point at or before `time`.
    pub fn prune(&mut self, time: f64) {
        let idx = self.points.partition_point(|&p| p <= time + self.tolerance);
        self.points.drain(..idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_and_merged() {
        let mut bp = BreakpointSchedule::new(1e-12);
        bp.extend([3.0, 1.0, 2.0, 1.0 + 1e-14, 2.0], 0.0).unwrap();
        assert_eq!(bp.iter().collect::<Vec<_>>(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_past_breakpoint_rejected() {
        let mut bp = BreakpointSchedule::new(1e-12);
        assert!(matches!(
            bp.add(0.5, 1.0),
            Err(TiaError::BreakpointInPast { .. })
        ));
        assert!(bp.is_empty());
    }

    #[test]
    fn test_stop_time() {
        let mut bp = BreakpointSchedule::new(1e-12);
        bp.extend([1.0, 2.0, 5.0], 0.0).unwrap();
        assert_eq!(bp.stop_time(0.0, 4.0), 1.0);
        // Sitting on a breakpoint selects the next one.
        assert_eq!(bp.stop_time(1.0, 4.0), 2.0);
        assert_eq!(bp.stop_time(2.0, 4.0), 4.0);
        assert!(bp.contains(2.0));
        assert!(!bp.contains(2.5));
    }

    #[test]
    fn test_prune() {
        let mut bp = BreakpointSchedule::new(1e-12);
        bp.extend([1.0, 2.0, 3.0], 0.0).unwrap();
        bp.prune(2.0);
        assert_eq!(bp.iter().collect::<Vec<_>>(), vec![3.0]);
    }
}
