//! The activator contract a bundle shared library exports.
//!
//! Everything crossing the dylib boundary is erased: service instances
//! are `Arc<dyn Any + Send + Sync>` plus a declared interface-name set,
//! never a concrete Rust type the framework would need to know about.
//! `forge-core`'s richer, typed `BundleContext` (used by in-process,
//! non-dylib code and by tests) implements this trait.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use crate::manifest::HeaderValue;

/// An opaque, reference-counted service instance.
pub type ErasedService = Arc<dyn Any + Send + Sync>;

/// Service/component property bag.
pub type Properties = HashMap<String, HeaderValue>;

/// A lightweight, copyable handle standing in for a registered service
///.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceReferenceHandle {
    pub service_id: u64,
}

/// A source of service instances handed to `register_service_factory`:
/// invoked once per distinct consumer bundle, outside any registry lock.
pub trait ServiceFactory: Send + Sync {
    fn get_service(&self, consumer_bundle: u64) -> Option<ErasedService>;

    /// Fired when a consumer's use-count for this factory's registration
    /// reaches zero. No-op by default.
    fn unget_service(&self, consumer_bundle: u64, service: ErasedService) {
        let _ = (consumer_bundle, service);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceEventKind {
    Registered,
    Modified,
    ModifiedEndmatch,
    Unregistering,
}

#[derive(Debug, Clone, Copy)]
pub struct ServiceEvent {
    pub kind: ServiceEventKind,
    pub reference: ServiceReferenceHandle,
}

/// Subscribed via `BundleContext::add_service_listener`. Held weakly: a
/// listener that has otherwise dropped out of use is silently skipped.
pub trait ServiceListener: Send + Sync {
    fn service_changed(&self, event: &ServiceEvent);
}

/// The erased surface a bundle activator uses to interact with the
/// framework.
pub trait BundleContext: Send + Sync {
    fn register_service(
        &self,
        interfaces: &[&str],
        service: ErasedService,
        properties: Properties,
    ) -> ServiceReferenceHandle;

    /// Registers a factory rather than a fixed instance: `get_service` is
    /// invoked once per distinct consumer bundle.
    fn register_service_factory(
        &self,
        interfaces: &[&str],
        factory: Arc<dyn ServiceFactory>,
        properties: Properties,
    ) -> ServiceReferenceHandle;

    fn unregister_service(&self, reference: ServiceReferenceHandle);

    fn get_service_reference(
        &self,
        interface: &str,
        filter: Option<&str>,
    ) -> Option<ServiceReferenceHandle>;

    fn get_service_references(
        &self,
        interface: &str,
        filter: Option<&str>,
    ) -> Vec<ServiceReferenceHandle>;

    fn get_service(&self, reference: ServiceReferenceHandle) -> Option<ErasedService>;

    /// Releases this bundle's use-count borrow on `reference`. Reaching
    /// zero fires the owning factory's `unget_service`, if any.
    fn unget_service(&self, reference: ServiceReferenceHandle);

    /// Subscribes `listener` to REGISTERED/MODIFIED/UNREGISTERING/
    /// MODIFIED_ENDMATCH events for references implementing `interface`
    /// and matching the optional filter.
    fn add_service_listener(
        &self,
        interface: &str,
        filter: Option<&str>,
        listener: Weak<dyn ServiceListener>,
    );
}

/// Error returned by `start`/`stop`, wrapped as `BUNDLE_ACTIVATION` by the
/// lifecycle controller.
#[derive(Debug, Clone)]
pub struct ActivationError(pub String);

impl std::fmt::Display for ActivationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ActivationError {}

/// The single exported entry point of a bundle shared library
///.
pub trait Activator: Send + Sync {
    fn start(&mut self, context: &dyn BundleContext) -> Result<(), ActivationError>;
    fn stop(&mut self, context: &dyn BundleContext) -> Result<(), ActivationError>;
}
