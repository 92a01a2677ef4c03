//! Service events and the listener contract they are delivered through.

use super::reference::ServiceReference;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceEventKind {
    Registered,
    Modified,
    /// Delivered instead of `Modified` to a listener whose filter matched
    /// the service's properties before the update but no longer does.
    ModifiedEndmatch,
    Unregistering,
}

#[derive(Debug, Clone)]
pub struct ServiceEvent {
    pub kind: ServiceEventKind,
    pub reference: ServiceReference,
}

/// Receives service events for a `(interface, filter)` subscription
/// registered via [`super::Registry::add_listener`]. Invoked after the
/// registry state change has been applied and with no registry lock
/// held, so callbacks may freely re-enter the registry.
pub trait ServiceListener: Send + Sync {
    fn service_changed(&self, event: &ServiceEvent);
}
