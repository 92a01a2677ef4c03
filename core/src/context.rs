//! Implements the erased [`forge_abi::BundleContext`] bundle activators
//! see, backed by this crate's richer, typed registries.

use std::sync::{Arc, Mutex, Weak};

use forge_abi::{
    BundleContext, ErasedService, Properties, ServiceEvent as AbiServiceEvent,
    ServiceEventKind as AbiServiceEventKind, ServiceFactory, ServiceListener as AbiServiceListener,
    ServiceReferenceHandle,
};

use crate::bundle::BundleId;
use crate::dcr::Runtime as DcrRuntime;
use crate::service::{Filter, Registry as ServiceRegistry, ServiceEvent, ServiceEventKind, ServiceListener};

/// One per bundle, handed to its activator's `start`/`stop`.
pub struct BundleContextImpl {
    bundle_id: BundleId,
    services: Arc<ServiceRegistry>,
    dcr: Option<Arc<DcrRuntime>>,
    /// Keeps this bundle's listener adapters alive for as long as the
    /// context is; the registry only holds a `Weak` reference to each.
    listener_bridges: Mutex<Vec<Arc<dyn ServiceListener>>>,
}

impl BundleContextImpl {
    pub fn new(bundle_id: BundleId, services: Arc<ServiceRegistry>) -> Self {
        Self {
            bundle_id,
            services,
            dcr: None,
            listener_bridges: Mutex::new(Vec::new()),
        }
    }

    /// Threads a handle to the declarative component runtime through so
    /// that `get_service_reference(s)` can lazily activate a
    /// consumer-requested, non-`immediate` component before looking it
    /// up.
    pub fn with_dcr(mut self, dcr: Arc<DcrRuntime>) -> Self {
        self.dcr = Some(dcr);
        self
    }
}

/// Bridges a core-native [`ServiceListener`] subscription back out to
/// the ABI-level listener a bundle activator registered.
struct ListenerBridge(Weak<dyn AbiServiceListener>);

impl ServiceListener for ListenerBridge {
    fn service_changed(&self, event: &ServiceEvent) {
        let Some(listener) = self.0.upgrade() else {
            return;
        };
        let kind = match event.kind {
            ServiceEventKind::Registered => AbiServiceEventKind::Registered,
            ServiceEventKind::Modified => AbiServiceEventKind::Modified,
            ServiceEventKind::ModifiedEndmatch => AbiServiceEventKind::ModifiedEndmatch,
            ServiceEventKind::Unregistering => AbiServiceEventKind::Unregistering,
        };
        listener.service_changed(&AbiServiceEvent {
            kind,
            reference: ServiceReferenceHandle {
                service_id: event.reference.service_id,
            },
        });
    }
}

impl BundleContext for BundleContextImpl {
    fn register_service(
        &self,
        interfaces: &[&str],
        service: ErasedService,
        properties: Properties,
    ) -> ServiceReferenceHandle {
        let registration = self.services.register(
            self.bundle_id,
            interfaces.iter().map(|s| s.to_string()).collect(),
            service,
            properties,
        );
        ServiceReferenceHandle {
            service_id: registration.service_id(),
        }
    }

    fn register_service_factory(
        &self,
        interfaces: &[&str],
        factory: Arc<dyn ServiceFactory>,
        properties: Properties,
    ) -> ServiceReferenceHandle {
        let registration = self.services.register_factory(
            self.bundle_id,
            interfaces.iter().map(|s| s.to_string()).collect(),
            factory,
            properties,
        );
        ServiceReferenceHandle {
            service_id: registration.service_id(),
        }
    }

    fn unregister_service(&self, reference: ServiceReferenceHandle) {
        self.services.unregister(reference.service_id);
    }

    fn get_service_reference(
        &self,
        interface: &str,
        filter: Option<&str>,
    ) -> Option<ServiceReferenceHandle> {
        if let Some(dcr) = &self.dcr {
            dcr.request_interface(interface);
        }
        let parsed = filter.and_then(|f| Filter::parse(f).ok());
        self.services
            .find_best(interface, parsed.as_ref())
            .map(|r| ServiceReferenceHandle {
                service_id: r.service_id,
            })
    }

    fn get_service_references(
        &self,
        interface: &str,
        filter: Option<&str>,
    ) -> Vec<ServiceReferenceHandle> {
        if let Some(dcr) = &self.dcr {
            dcr.request_interface(interface);
        }
        let parsed = filter.and_then(|f| Filter::parse(f).ok());
        self.services
            .find(interface, parsed.as_ref())
            .into_iter()
            .map(|r| ServiceReferenceHandle {
                service_id: r.service_id,
            })
            .collect()
    }

    fn get_service(&self, reference: ServiceReferenceHandle) -> Option<ErasedService> {
        self.services.get_service(self.bundle_id, reference.service_id)
    }

    fn unget_service(&self, reference: ServiceReferenceHandle) {
        self.services.unget_service(self.bundle_id, reference.service_id);
    }

    fn add_service_listener(
        &self,
        interface: &str,
        filter: Option<&str>,
        listener: Weak<dyn AbiServiceListener>,
    ) {
        let parsed = filter.and_then(|f| Filter::parse(f).ok());
        let bridge: Arc<dyn ServiceListener> = Arc::new(ListenerBridge(listener));
        self.services
            .add_listener(interface.to_owned(), parsed, Arc::downgrade(&bridge));
        // The registry only keeps a `Weak` reference; hold the sole
        // strong one here so the listener survives until this bundle
        // stops, not just until `add_service_listener` returns.
        self.listener_bridges.lock().unwrap().push(bridge);
    }
}
