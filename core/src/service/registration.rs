//! The handle returned to a registering bundle.

use std::sync::Arc;

use forge_abi::Properties;

use super::registry::Registry;
use super::ServiceId;

/// Returned by [`Registry::register`]. Dropping it does *not* unregister
/// the service — bundles (and tests) unregister explicitly, or rely on
/// [`crate::bundle::LifecycleController::stop`] withdrawing everything
/// registered on their behalf.
pub struct ServiceRegistration {
    pub(crate) service_id: ServiceId,
    pub(crate) registry: Arc<Registry>,
}

impl ServiceRegistration {
    pub fn service_id(&self) -> ServiceId {
        self.service_id
    }

    /// Replaces the service's property bag, re-ranking it in every
    /// interface index it participates in.
    pub fn set_properties(&self, properties: Properties) {
        self.registry.set_properties(self.service_id, properties);
    }

    pub fn unregister(&self) {
        self.registry.unregister(self.service_id);
    }
}
