//! Region click monitoring
//!
//! Threading model:
//! - the pointer hook calls `pointer_down` on whatever thread drives the OS
//!   subscription, never the UI thread
//! - the region set and throttle live behind one mutex, so a hit test always
//!   sees a consistent snapshot of the regions
//! - hits leave through the outbound channel; the hook never touches
//!   coordinator state
//! - the hook only holds a weak reference to the shared state

use std::rc::Rc;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

use crate::domain::core::{Point, Rect};
use crate::domain::region::{ClickThrottle, RegionSet};
use crate::platform::{HookError, PermissionGate, PointerHook, PointerSink};
use crate::protocol::{Event, Outbound, now_ms};

struct MonitorState {
    regions: RegionSet,
    throttle: ClickThrottle,
}

/// State shared between the UI thread and the hook thread
struct MonitorShared {
    state: Mutex<MonitorState>,
    events: Sender<Outbound>,
}

impl MonitorShared {
    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PointerSink for MonitorShared {
    fn pointer_down(&self, point: Point, at: Instant) {
        let hit = {
            let mut state = self.lock();
            if !state.throttle.admit(at) {
                tracing::trace!(?point, "click throttled");
                return;
            }
            state.regions.hit_test(point).map(|region| region.id.clone())
        };

        if let Some(rect_id) = hit {
            tracing::debug!(%rect_id, ?point, "click inside region");
            let event = Event::ClickInside { rect_id, ts: now_ms() };
            if self.events.send(event.into()).is_err() {
                tracing::warn!("outbound channel closed, dropping click event");
            }
        }
    }
}

pub struct ClickMonitor {
    shared: Arc<MonitorShared>,
    hook: Box<dyn PointerHook>,
    permissions: Rc<dyn PermissionGate>,
    active: bool,
}

impl ClickMonitor {
    pub fn new(
        hook: Box<dyn PointerHook>,
        permissions: Rc<dyn PermissionGate>,
        throttle: Duration,
        events: Sender<Outbound>,
    ) -> Self {
        Self {
            shared: Arc::new(MonitorShared {
                state: Mutex::new(MonitorState {
                    regions: RegionSet::new(),
                    throttle: ClickThrottle::new(throttle),
                }),
                events,
            }),
            hook,
            permissions,
            active: false,
        }
    }

    /// Installs the global pointer subscription; no-op when already active
    ///
    /// On failure the monitor stays inactive.
    pub fn start(&mut self) -> Result<(), HookError> {
        if self.active {
            return Ok(());
        }
        if !self.permissions.is_input_monitoring_granted() {
            tracing::warn!("input monitoring not granted, click monitor stays inactive");
            return Err(HookError::InstallFailed("input monitoring permission not granted".into()));
        }

        self.shared.lock().throttle.reset();
        let sink: Arc<dyn PointerSink> = self.shared.clone();
        let weak: Weak<dyn PointerSink> = Arc::downgrade(&sink);
        if let Err(e) = self.hook.install(weak) {
            tracing::warn!(error = %e, "click monitor unavailable");
            return Err(e);
        }

        self.active = true;
        tracing::info!("click monitor started");
        Ok(())
    }

    /// Removes the subscription; no-op when inactive
    pub fn stop(&mut self) {
        if !self.active {
            return;
        }
        self.hook.uninstall();
        self.active = false;
        tracing::info!("click monitor stopped");
    }

    pub fn is_active(&self) -> bool {
        self.active && self.hook.is_installed()
    }

    pub fn add_region(&self, id: &str, rect: Rect) {
        self.shared.lock().regions.insert(id, rect);
        tracing::debug!(id, ?rect, "region added");
    }

    pub fn remove_region(&self, id: &str) -> bool {
        self.shared.lock().regions.remove(id).is_some()
    }

    pub fn clear_regions(&self) {
        self.shared.lock().regions.clear();
    }

    pub fn region_count(&self) -> usize {
        self.shared.lock().regions.len()
    }
}

impl Drop for ClickMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::headless::HeadlessPlatform;
    use std::sync::mpsc::{self, Receiver};

    fn monitor(headless: &HeadlessPlatform) -> (ClickMonitor, Receiver<Outbound>) {
        let platform = headless.platform();
        let (tx, rx) = mpsc::channel();
        let monitor = ClickMonitor::new(platform.pointer, platform.permissions, Duration::from_millis(300), tx);
        (monitor, rx)
    }

    fn hits(rx: &Receiver<Outbound>) -> Vec<String> {
        rx.try_iter()
            .map(|outbound| match outbound {
                Outbound::Event(Event::ClickInside { rect_id, .. }) => rect_id,
                other => panic!("unexpected outbound {other:?}"),
            })
            .collect()
    }

    #[test]
    fn click_inside_region_emits_one_event() {
        let headless = HeadlessPlatform::new();
        let (mut monitor, rx) = monitor(&headless);
        monitor.start().unwrap();
        monitor.add_region("r1", Rect::new(500, 600, 200, 150));

        let t0 = Instant::now();
        headless.click(Point::new(550, 650), t0);
        headless.click(Point::new(10, 10), t0 + Duration::from_secs(1));

        assert_eq!(hits(&rx), vec!["r1".to_string()]);
    }

    #[test]
    fn rapid_clicks_are_throttled() {
        let headless = HeadlessPlatform::new();
        let (mut monitor, rx) = monitor(&headless);
        monitor.start().unwrap();
        monitor.add_region("r1", Rect::new(0, 0, 100, 100));

        let t0 = Instant::now();
        headless.click(Point::new(50, 50), t0);
        headless.click(Point::new(50, 50), t0 + Duration::from_millis(120));
        headless.click(Point::new(50, 50), t0 + Duration::from_millis(299));
        headless.click(Point::new(50, 50), t0 + Duration::from_millis(300));

        assert_eq!(hits(&rx).len(), 2);
    }

    #[test]
    fn throttle_applies_to_misses_too() {
        let headless = HeadlessPlatform::new();
        let (mut monitor, rx) = monitor(&headless);
        monitor.start().unwrap();
        monitor.add_region("r1", Rect::new(0, 0, 100, 100));

        let t0 = Instant::now();
        headless.click(Point::new(500, 500), t0);
        headless.click(Point::new(50, 50), t0 + Duration::from_millis(100));
        assert!(hits(&rx).is_empty());
    }

    #[test]
    fn disjoint_regions_report_only_the_clicked_one() {
        let headless = HeadlessPlatform::new();
        let (mut monitor, rx) = monitor(&headless);
        monitor.start().unwrap();
        monitor.add_region("left", Rect::new(0, 0, 100, 100));
        monitor.add_region("right", Rect::new(200, 0, 100, 100));

        headless.click(Point::new(250, 50), Instant::now());
        assert_eq!(hits(&rx), vec!["right".to_string()]);
    }

    #[test]
    fn no_events_once_stopped() {
        let headless = HeadlessPlatform::new();
        let (mut monitor, rx) = monitor(&headless);
        monitor.start().unwrap();
        monitor.add_region("r1", Rect::new(0, 0, 100, 100));
        monitor.stop();
        monitor.stop();

        headless.click(Point::new(50, 50), Instant::now());
        assert!(hits(&rx).is_empty());
        assert!(!monitor.is_active());
        assert!(!headless.hook_installed());
    }

    #[test]
    fn start_is_idempotent() {
        let headless = HeadlessPlatform::new();
        let (mut monitor, _rx) = monitor(&headless);
        monitor.start().unwrap();
        monitor.start().unwrap();
        assert!(monitor.is_active());
    }

    #[test]
    fn start_without_permission_stays_inactive() {
        let headless = HeadlessPlatform::new();
        headless.set_input_monitoring(false);
        let (mut monitor, _rx) = monitor(&headless);
        assert!(monitor.start().is_err());
        assert!(!monitor.is_active());
    }

    #[test]
    fn hook_failure_stays_inactive() {
        let headless = HeadlessPlatform::new();
        headless.fail_pointer_hook(true);
        let (mut monitor, _rx) = monitor(&headless);
        assert!(monitor.start().is_err());
        assert!(!monitor.is_active());
    }

    #[test]
    fn region_bookkeeping() {
        let headless = HeadlessPlatform::new();
        let (monitor, _rx) = monitor(&headless);
        monitor.add_region("a", Rect::new(0, 0, 10, 10));
        monitor.add_region("b", Rect::new(0, 0, 10, 10));
        monitor.add_region("a", Rect::new(5, 5, 10, 10));
        assert_eq!(monitor.region_count(), 2);
        assert!(monitor.remove_region("a"));
        assert!(!monitor.remove_region("a"));
        assert_eq!(monitor.region_count(), 1);
        monitor.clear_regions();
        assert_eq!(monitor.region_count(), 0);
    }

    #[test]
    fn dropped_monitor_releases_the_hook() {
        let headless = HeadlessPlatform::new();
        let (mut monitor, _rx) = monitor(&headless);
        monitor.start().unwrap();
        assert!(headless.hook_installed());
        drop(monitor);
        assert!(!headless.hook_installed());
        // A click after drop has no live sink to reach
        headless.click(Point::new(1, 1), Instant::now());
    }

    #[test]
    fn hook_thread_sees_whole_region_updates() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let headless = HeadlessPlatform::new();
        let platform = headless.platform();
        let (tx, rx) = mpsc::channel();
        let monitor = ClickMonitor::new(platform.pointer, platform.permissions, Duration::ZERO, tx);

        let shared = Arc::clone(&monitor.shared);
        let done = Arc::new(AtomicBool::new(false));
        let clicker = {
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    shared.pointer_down(Point::new(5, 5), Instant::now());
                }
            })
        };

        // "a" is always registered before "b" and both leave together, so
        // every consistent view of the set resolves a click to "a"
        for _ in 0..500 {
            monitor.add_region("a", Rect::new(0, 0, 10, 10));
            monitor.add_region("b", Rect::new(0, 0, 10, 10));
            monitor.clear_regions();
        }
        done.store(true, Ordering::Relaxed);
        clicker.join().unwrap();

        let ids = hits(&rx);
        assert!(ids.iter().all(|id| id == "a"), "unexpected hits {ids:?}");
    }
}
