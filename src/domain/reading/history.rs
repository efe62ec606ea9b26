//! Bounded trend history.

use super::MergedPoint;
use std::collections::VecDeque;

/// Observed default window: 48 points.
pub const DEFAULT_HISTORY_CAPACITY: usize = 48;

/// Rolling window of merged points, oldest first.
///
/// Append-only: the oldest point is evicted once `capacity` is reached.
/// Readers get copies via [`snapshot`](Self::snapshot); the backing store is
/// never handed out mutably.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    points: VecDeque<MergedPoint>,
    capacity: usize,
}

impl HistoryBuffer {
    /// `capacity` is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a point, evicting the oldest if at capacity.
    ///
    /// A point stamped before the latest one takes the latest timestamp, so
    /// the window stays non-decreasing.
    pub fn append(&mut self, mut point: MergedPoint) {
        if let Some(last) = self.points.back() {
            if point.timestamp < last.timestamp {
                point.timestamp = last.timestamp;
            }
        }
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    /// Ordered copy of the retained window.
    pub fn snapshot(&self) -> Vec<MergedPoint> {
        self.points.iter().copied().collect()
    }

    /// Points for a trend chart: the snapshot, or a single zeroed placeholder
    /// while nothing has been recorded.
    pub fn chart_points(&self) -> Vec<MergedPoint> {
        if self.points.is_empty() {
            vec![MergedPoint::placeholder()]
        } else {
            self.snapshot()
        }
    }

    pub fn latest(&self) -> Option<&MergedPoint> {
        self.points.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MergedPoint> {
        self.points.iter()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
