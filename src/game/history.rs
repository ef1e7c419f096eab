//! Recent crash points.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::game::round::RoundId;

/// Colour band a crash point is shown in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrashBand {
    /// 2.00x and above.
    High,
    /// 1.50x up to 2.00x.
    Medium,
    /// Below 1.50x.
    Low,
}

impl CrashBand {
    /// Band for a crash point.
    pub fn of(crash_point: f64) -> Self {
        if crash_point >= 2.0 {
            CrashBand::High
        } else if crash_point >= 1.5 {
            CrashBand::Medium
        } else {
            CrashBand::Low
        }
    }
}

/// One crashed round.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Round that crashed.
    pub round_id: RoundId,
    /// Final multiplier.
    pub crash_point: f64,
    /// Crash time.
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    /// Display band.
    pub fn band(&self) -> CrashBand {
        CrashBand::of(self.crash_point)
    }
}

/// Fixed-capacity ring of crash points, most recent first.
#[derive(Clone, Debug)]
pub struct HistoryLog {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl HistoryLog {
    /// Empty log holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a crash, evicting the oldest entry once full.
    pub fn append(&mut self, entry: HistoryEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_back();
        }
        self.entries.push_front(entry);
    }

    /// Entries, most recent first.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Copy of the entries, most recent first.
    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.entries.iter().copied().collect()
    }

    /// Crash points, most recent first.
    pub fn crash_points(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.crash_point).collect()
    }

    /// Most recent entry.
    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }

    /// Mean crash point of the retained entries.
    pub fn average(&self) -> Option<f64> {
        if self.entries.is_empty() {
            return None;
        }
        let sum: f64 = self.entries.iter().map(|e| e.crash_point).sum();
        Some(sum / self.entries.len() as f64)
    }

    /// Highest retained crash point.
    pub fn best(&self) -> Option<f64> {
        self.entries.iter().map(|e| e.crash_point).reduce(f64::max)
    }

    /// Lowest retained crash point.
    pub fn worst(&self) -> Option<f64> {
        self.entries.iter().map(|e| e.crash_point).reduce(f64::min)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No entries yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum entries retained.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(round_id: RoundId, crash_point: f64) -> HistoryEntry {
        HistoryEntry {
            round_id,
            crash_point,
            timestamp: DateTime::<Utc>::default(),
        }
    }

    #[test]
    fn test_keeps_most_recent() {
        let mut log = HistoryLog::new(7);
        for i in 1..=10u64 {
            log.append(entry(i, i as f64));
        }

        assert_eq!(log.len(), 7);
        assert_eq!(log.crash_points(), vec![10.0, 9.0, 8.0, 7.0, 6.0, 5.0, 4.0]);
        assert_eq!(log.last().map(|e| e.round_id), Some(10));
    }

    #[test]
    fn test_average() {
        let mut log = HistoryLog::new(3);
        assert_eq!(log.average(), None);

        log.append(entry(1, 1.5));
        log.append(entry(2, 2.5));
        assert_eq!(log.average(), Some(2.0));

        // 1.5 evicted
        log.append(entry(3, 3.5));
        log.append(entry(4, 4.5));
        assert_eq!(log.average(), Some(3.5));
    }

    #[test]
    fn test_best_and_worst() {
        let mut log = HistoryLog::new(3);
        assert_eq!(log.best(), None);
        assert_eq!(log.worst(), None);

        log.append(entry(1, 42.0));
        assert_eq!(log.best(), Some(42.0));
        assert_eq!(log.worst(), Some(42.0));

        log.append(entry(2, 1.0));
        log.append(entry(3, 3.2));
        assert_eq!(log.best(), Some(42.0));
        assert_eq!(log.worst(), Some(1.0));

        // 42.0 evicted, then 1.0
        log.append(entry(4, 2.1));
        assert_eq!(log.best(), Some(3.2));
        assert_eq!(log.worst(), Some(1.0));
        log.append(entry(5, 1.8));
        assert_eq!(log.best(), Some(3.2));
        assert_eq!(log.worst(), Some(1.8));
    }

    #[test]
    fn test_bands() {
        assert_eq!(CrashBand::of(1.0), CrashBand::Low);
        assert_eq!(CrashBand::of(1.49), CrashBand::Low);
        assert_eq!(CrashBand::of(1.5), CrashBand::Medium);
        assert_eq!(CrashBand::of(1.99), CrashBand::Medium);
        assert_eq!(CrashBand::of(2.0), CrashBand::High);
        assert_eq!(entry(1, 57.0).band(), CrashBand::High);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut log = HistoryLog::new(0);
        log.append(entry(1, 2.0));
        log.append(entry(2, 3.0));
        assert_eq!(log.capacity(), 1);
        assert_eq!(log.crash_points(), vec![3.0]);
    }
}
