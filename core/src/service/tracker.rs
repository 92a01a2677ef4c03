//! Service tracker: a convenience wrapper that keeps a
//! bundle's view of matching services current by subscribing to
//! registry events rather than requiring the caller to poll.

use std::sync::{Arc, Mutex, Weak};

use super::event::{ServiceEvent, ServiceEventKind, ServiceListener};
use super::filter::Filter;
use super::reference::ServiceReference;
use super::registry::Registry;

/// Callbacks invoked as tracked services come and go. Mirrors the
/// registry's own add/modify/remove vocabulary.
pub trait ServiceTrackerCustomizer: Send + Sync {
    fn adding(&self, reference: &ServiceReference);
    fn modified(&self, reference: &ServiceReference) {
        let _ = reference;
    }
    fn removed(&self, reference: &ServiceReference);
}

struct Inner {
    interface: String,
    filter: Option<Filter>,
    customizer: Arc<dyn ServiceTrackerCustomizer>,
    tracked: Mutex<Vec<ServiceReference>>,
}

impl Inner {
    fn on_event(&self, event: &ServiceEvent) {
        let reference = &event.reference;
        let mut tracked = self.tracked.lock().unwrap();
        match event.kind {
            ServiceEventKind::Registered => {
                if !tracked.iter().any(|t| t.service_id == reference.service_id) {
                    drop(tracked);
                    self.customizer.adding(reference);
                    self.tracked.lock().unwrap().push(reference.clone());
                }
            }
            ServiceEventKind::Modified => {
                if let Some(slot) = tracked.iter_mut().find(|t| t.service_id == reference.service_id) {
                    *slot = reference.clone();
                    drop(tracked);
                    self.customizer.modified(reference);
                } else {
                    // Entered the match set via a property change rather
                    // than a fresh registration: treat as an arrival.
                    drop(tracked);
                    self.customizer.adding(reference);
                    self.tracked.lock().unwrap().push(reference.clone());
                }
            }
            ServiceEventKind::ModifiedEndmatch | ServiceEventKind::Unregistering => {
                let before = tracked.len();
                tracked.retain(|t| t.service_id != reference.service_id);
                let left = tracked.len() != before;
                drop(tracked);
                if left {
                    self.customizer.removed(reference);
                }
            }
        }
    }
}

struct TrackerListener(Weak<Inner>);

impl ServiceListener for TrackerListener {
    fn service_changed(&self, event: &ServiceEvent) {
        if let Some(inner) = self.0.upgrade() {
            inner.on_event(event);
        }
    }
}

/// Tracks every reference implementing `interface` that matches an
/// optional filter by subscribing to registry events. `open` takes a
/// snapshot and fires `adding` for each match already present, then
/// registers for live updates; no further polling is needed.
pub struct ServiceTracker {
    registry: Arc<Registry>,
    inner: Arc<Inner>,
    /// Keeps the listener adapter alive for as long as the tracker is;
    /// the registry only holds a `Weak` reference to it.
    listener: Arc<TrackerListener>,
}

impl ServiceTracker {
    pub fn new(
        registry: Arc<Registry>,
        interface: impl Into<String>,
        filter: Option<Filter>,
        customizer: Arc<dyn ServiceTrackerCustomizer>,
    ) -> Self {
        let inner = Arc::new(Inner {
            interface: interface.into(),
            filter,
            customizer,
            tracked: Mutex::new(Vec::new()),
        });
        let listener = Arc::new(TrackerListener(Arc::downgrade(&inner)));
        Self {
            registry,
            inner,
            listener,
        }
    }

    /// Takes a snapshot of currently-matching services, firing `adding`
    /// for each, then subscribes for live registry events.
    pub fn open(&self) {
        let matches = self.registry.find(&self.inner.interface, self.inner.filter.as_ref());
        for reference in &matches {
            self.inner.customizer.adding(reference);
        }
        *self.inner.tracked.lock().unwrap() = matches;

        self.registry.add_listener(
            self.inner.interface.clone(),
            self.inner.filter.clone(),
            Arc::downgrade(&self.listener) as Weak<dyn ServiceListener>,
        );
    }

    pub fn close(&self) {
        let mut tracked = self.inner.tracked.lock().unwrap();
        for reference in tracked.iter() {
            self.inner.customizer.removed(reference);
        }
        tracked.clear();
    }

    pub fn tracked(&self) -> Vec<ServiceReference> {
        self.inner.tracked.lock().unwrap().clone()
    }

    pub fn best(&self) -> Option<ServiceReference> {
        self.inner.tracked.lock().unwrap().first().cloned()
    }
}
