//! Monitored regions and pointer-down throttling

use std::time::{Duration, Instant};

use crate::domain::core::{Point, Rect};

/// A rectangle watched for pointer-down events
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredRegion {
    pub id: String,
    pub rect: Rect,
}

/// Ordered set of monitored regions
///
/// Insertion order is the hit-test order: when regions overlap, the oldest
/// registration wins.
#[derive(Debug, Clone, Default)]
pub struct RegionSet {
    regions: Vec<MonitoredRegion>,
}

impl RegionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a region, replacing the rect in place if the id already exists
    pub fn insert(&mut self, id: impl Into<String>, rect: Rect) {
        let id = id.into();
        match self.regions.iter_mut().find(|r| r.id == id) {
            Some(existing) => existing.rect = rect,
            None => self.regions.push(MonitoredRegion { id, rect }),
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<MonitoredRegion> {
        let index = self.regions.iter().position(|r| r.id == id)?;
        Some(self.regions.remove(index))
    }

    pub fn clear(&mut self) {
        self.regions.clear();
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// First region containing `point`
    pub fn hit_test(&self, point: Point) -> Option<&MonitoredRegion> {
        self.regions
            .iter()
            .find(|r| r.rect.contains_point(point.x, point.y))
    }
}

/// Drops pointer-downs arriving too soon after the last processed one
///
/// Discarded clicks are neither queued nor delayed, and they do not extend
/// the quiet period.
#[derive(Debug, Clone)]
pub struct ClickThrottle {
    interval: Duration,
    last_processed: Option<Instant>,
}

impl ClickThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_processed: None,
        }
    }

    /// Returns true if the click at `at` should be processed
    pub fn admit(&mut self, at: Instant) -> bool {
        if let Some(last) = self.last_processed {
            if at.saturating_duration_since(last) < self.interval {
                return false;
            }
        }
        self.last_processed = Some(at);
        true
    }

    pub fn reset(&mut self) {
        self.last_processed = None;
    }
}
