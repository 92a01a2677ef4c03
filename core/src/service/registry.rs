//! The service registry proper: register/unregister, get_service with
//! factory and use-count semantics, listener fan-out, lookup by
//! interface and filter, ranking order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use forge_abi::{ErasedService, Properties};
use trace_err::TraceErrResult;

use super::event::{ServiceEvent, ServiceEventKind, ServiceListener};
use super::filter::Filter;
use super::reference::ServiceReference;
use super::registration::ServiceRegistration;
use super::{ServiceId, RANKING_KEY};
use crate::bundle::BundleId;

/// Where a registration's instances come from.
enum Source {
    Instance(ErasedService),
    Factory(Arc<dyn forge_abi::ServiceFactory>),
}

/// Per-consumer-bundle borrow bookkeeping for one registration.
struct Consumer {
    count: u64,
    instance: ErasedService,
}

struct Entry {
    reference: ServiceReference,
    source: Source,
    /// Set by `unregister`. A withdrawn entry is invisible to `find`/
    /// `find_best` but stays in the table until every consumer has
    /// released its borrow, per the "invisible to lookups but may still
    /// be held by existing borrows" registration invariant.
    withdrawn: bool,
    consumers: HashMap<BundleId, Consumer>,
}

struct ListenerEntry {
    interface: String,
    filter: Option<Filter>,
    listener: Weak<dyn ServiceListener>,
}

impl ListenerEntry {
    fn matches(&self, reference: &ServiceReference) -> bool {
        reference.implements(&self.interface)
            && self
                .filter
                .as_ref()
                .map(|f| f.matches(&reference.properties))
                .unwrap_or(true)
    }
}

/// Table of registered services.
///
/// Reads and writes both take the single `RwLock`; entries are looked up
/// by interface name via a linear scan, which is appropriate for the
/// handful-to-low-hundreds of services a component runtime typically
/// hosts.
pub struct Registry {
    next_id: AtomicU64,
    entries: RwLock<HashMap<ServiceId, Entry>>,
    listeners: RwLock<Vec<ListenerEntry>>,
}

impl Registry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicU64::new(1),
            entries: RwLock::new(HashMap::new()),
            listeners: RwLock::new(Vec::new()),
        })
    }

    fn ranking_of(properties: &Properties) -> i64 {
        properties
            .get(RANKING_KEY)
            .and_then(|v| v.as_integer())
            .unwrap_or(0)
    }

    fn insert_entry(
        self: &Arc<Self>,
        bundle_id: BundleId,
        interfaces: Vec<String>,
        source: Source,
        properties: Properties,
    ) -> ServiceRegistration {
        let service_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let ranking = Self::ranking_of(&properties);
        let reference = ServiceReference {
            service_id,
            bundle_id,
            ranking,
            interfaces: Arc::new(interfaces.clone()),
            properties: Arc::new(properties),
        };

        self.entries.write().trace_expect("service registry lock poisoned").insert(
            service_id,
            Entry {
                reference: reference.clone(),
                source,
                withdrawn: false,
                consumers: HashMap::new(),
            },
        );

        tracing::debug!(service_id, interfaces = ?interfaces, "registered service");

        // Listener atomicity: REGISTERED is delivered to every matching
        // listener before `register` returns.
        self.fire(ServiceEventKind::Registered, reference);

        ServiceRegistration {
            service_id,
            registry: self.clone(),
        }
    }

    /// Registers a fixed service instance under one or more interface
    /// names. Returns a registration handle the caller uses to update
    /// properties or unregister.
    pub fn register(
        self: &Arc<Self>,
        bundle_id: BundleId,
        interfaces: Vec<String>,
        instance: ErasedService,
        properties: Properties,
    ) -> ServiceRegistration {
        self.insert_entry(bundle_id, interfaces, Source::Instance(instance), properties)
    }

    /// Registers a factory: `get_service` is invoked once per distinct
    /// consumer bundle, outside any registry lock.
    pub fn register_factory(
        self: &Arc<Self>,
        bundle_id: BundleId,
        interfaces: Vec<String>,
        factory: Arc<dyn forge_abi::ServiceFactory>,
        properties: Properties,
    ) -> ServiceRegistration {
        self.insert_entry(bundle_id, interfaces, Source::Factory(factory), properties)
    }

    /// Snapshot of every currently-registered listener whose subscription
    /// matches `reference`, taken under the lock then released: callbacks
    /// below are always invoked lock-free.
    fn matching_listeners(&self, reference: &ServiceReference) -> Vec<Arc<dyn ServiceListener>> {
        let mut listeners = self.listeners.write().trace_expect("listener lock poisoned");
        listeners.retain(|l| l.listener.strong_count() > 0);
        listeners
            .iter()
            .filter(|l| l.matches(reference))
            .filter_map(|l| l.listener.upgrade())
            .collect()
    }

    fn fire(&self, kind: ServiceEventKind, reference: ServiceReference) {
        for listener in self.matching_listeners(&reference) {
            listener.service_changed(&ServiceEvent {
                kind,
                reference: reference.clone(),
            });
        }
    }

    /// Subscribes to REGISTERED/MODIFIED/UNREGISTERING/MODIFIED_ENDMATCH
    /// events for references implementing `interface` and matching the
    /// optional filter.
    pub fn add_listener(&self, interface: impl Into<String>, filter: Option<Filter>, listener: Weak<dyn ServiceListener>) {
        self.listeners.write().trace_expect("listener lock poisoned").push(ListenerEntry {
            interface: interface.into(),
            filter,
            listener,
        });
    }

    pub fn set_properties(&self, service_id: ServiceId, properties: Properties) {
        let (old_reference, new_reference) = {
            let mut entries = self.entries.write().trace_expect("service registry lock poisoned");
            let Some(entry) = entries.get_mut(&service_id) else {
                return;
            };
            let old = entry.reference.clone();
            entry.reference.ranking = Self::ranking_of(&properties);
            entry.reference.properties = Arc::new(properties);
            (old, entry.reference.clone())
        };

        for listener in self.matching_listeners_for_update(&old_reference, &new_reference) {
            let (listener, matched_after) = listener;
            let kind = if matched_after {
                ServiceEventKind::Modified
            } else {
                ServiceEventKind::ModifiedEndmatch
            };
            listener.service_changed(&ServiceEvent {
                kind,
                reference: new_reference.clone(),
            });
        }
    }

    /// Every listener that matched `old` or matches `new`, paired with
    /// whether it still matches `new` — used to tell `MODIFIED` apart
    /// from `MODIFIED_ENDMATCH` recipients.
    fn matching_listeners_for_update(
        &self,
        old: &ServiceReference,
        new: &ServiceReference,
    ) -> Vec<(Arc<dyn ServiceListener>, bool)> {
        let mut listeners = self.listeners.write().trace_expect("listener lock poisoned");
        listeners.retain(|l| l.listener.strong_count() > 0);
        listeners
            .iter()
            .filter(|l| l.matches(old) || l.matches(new))
            .filter_map(|l| l.listener.upgrade().map(|listener| (listener, l.matches(new))))
            .collect()
    }

    pub fn unregister(&self, service_id: ServiceId) {
        let reference = {
            let mut entries = self.entries.write().trace_expect("service registry lock poisoned");
            let Some(entry) = entries.get_mut(&service_id) else {
                return;
            };
            entry.withdrawn = true;
            entry.reference.clone()
        };

        self.fire(ServiceEventKind::Unregistering, reference);
        tracing::debug!(service_id, "unregistered service");

        self.drop_if_orphaned(service_id);
    }

    /// Removes the entry outright once it is withdrawn and no consumer
    /// still holds a borrow on it.
    fn drop_if_orphaned(&self, service_id: ServiceId) {
        let mut entries = self.entries.write().trace_expect("service registry lock poisoned");
        if let Some(entry) = entries.get(&service_id) {
            if entry.withdrawn && entry.consumers.is_empty() {
                entries.remove(&service_id);
            }
        }
    }

    /// Withdraws every service registered by `bundle_id` and releases
    /// every borrow held on its behalf, unconditionally.
    pub async fn unregister_all_for_bundle(&self, bundle_id: BundleId) {
        let ids: Vec<ServiceId> = {
            self.entries
                .read()
                .trace_expect("service registry lock poisoned")
                .iter()
                .filter(|(_, e)| e.reference.bundle_id == bundle_id)
                .map(|(id, _)| *id)
                .collect()
        };
        for id in &ids {
            self.unregister(*id);
        }
        // Force-release every consumer borrow this bundle held on
        // anyone else's registration, bundle stop does not wait for the
        // consumer to call `unget_service` itself.
        let affected: Vec<ServiceId> = {
            self.entries
                .read()
                .trace_expect("service registry lock poisoned")
                .iter()
                .filter(|(_, e)| e.consumers.contains_key(&bundle_id))
                .map(|(id, _)| *id)
                .collect()
        };
        for id in affected {
            self.release_all_consumed_by(id, bundle_id);
        }
        if !ids.is_empty() {
            tracing::debug!(bundle_id, removed = ids.len(), "withdrew services for stopped bundle");
        }
    }

    fn release_all_consumed_by(&self, service_id: ServiceId, consumer_bundle: BundleId) {
        loop {
            let used = {
                self.entries
                    .read()
                    .trace_expect("service registry lock poisoned")
                    .get(&service_id)
                    .map(|e| e.consumers.contains_key(&consumer_bundle))
                    .unwrap_or(false)
            };
            if !used {
                return;
            }
            self.unget_service(consumer_bundle, service_id);
        }
    }

    /// Borrows the service instance for `consumer_bundle`, incrementing
    /// its use-count. If the registration holds a factory, the factory is
    /// invoked outside any registry lock and the resulting instance is
    /// cached per consumer; a factory that declines (`None`) leaves the
    /// use-count untouched.
    pub fn get_service(&self, consumer_bundle: BundleId, service_id: ServiceId) -> Option<ErasedService> {
        // Fast path: consumer already holds a borrow.
        {
            let mut entries = self.entries.write().trace_expect("service registry lock poisoned");
            if let Some(entry) = entries.get_mut(&service_id) {
                if entry.withdrawn {
                    return None;
                }
                if let Some(consumer) = entry.consumers.get_mut(&consumer_bundle) {
                    consumer.count += 1;
                    return Some(consumer.instance.clone());
                }
            } else {
                return None;
            }
        }

        // First borrow for this consumer: resolve the instance outside
        // the lock (factories may run arbitrary user code).
        let source_instance = {
            let entries = self.entries.read().trace_expect("service registry lock poisoned");
            match entries.get(&service_id) {
                Some(entry) if !entry.withdrawn => match &entry.source {
                    Source::Instance(instance) => Some(instance.clone()),
                    Source::Factory(factory) => {
                        let factory = factory.clone();
                        drop(entries);
                        return match factory.get_service(consumer_bundle) {
                            Some(instance) => {
                                self.record_borrow(service_id, consumer_bundle, instance.clone());
                                Some(instance)
                            }
                            None => None,
                        };
                    }
                },
                _ => None,
            }
        };

        let instance = source_instance?;
        self.record_borrow(service_id, consumer_bundle, instance.clone());
        Some(instance)
    }

    fn record_borrow(&self, service_id: ServiceId, consumer_bundle: BundleId, instance: ErasedService) {
        let mut entries = self.entries.write().trace_expect("service registry lock poisoned");
        if let Some(entry) = entries.get_mut(&service_id) {
            entry
                .consumers
                .entry(consumer_bundle)
                .and_modify(|c| c.count += 1)
                .or_insert(Consumer { count: 1, instance });
        }
    }

    /// Releases one borrow of `service_id` held by `consumer_bundle`.
    /// When the consumer's use-count reaches zero, fires the owning
    /// factory's `unget_service`, if any, outside any registry lock.
    pub fn unget_service(&self, consumer_bundle: BundleId, service_id: ServiceId) {
        let released = {
            let mut entries = self.entries.write().trace_expect("service registry lock poisoned");
            let Some(entry) = entries.get_mut(&service_id) else {
                return;
            };
            let Some(consumer) = entry.consumers.get_mut(&consumer_bundle) else {
                return;
            };
            consumer.count = consumer.count.saturating_sub(1);
            if consumer.count > 0 {
                return;
            }
            let consumer = entry.consumers.remove(&consumer_bundle).expect("just looked up");
            let factory = match &entry.source {
                Source::Factory(factory) => Some(factory.clone()),
                Source::Instance(_) => None,
            };
            (factory, consumer.instance)
        };

        if let (Some(factory), instance) = released {
            factory.unget_service(consumer_bundle, instance);
        }

        self.drop_if_orphaned(service_id);
    }

    pub fn get_reference(&self, service_id: ServiceId) -> Option<ServiceReference> {
        self.entries
            .read()
            .trace_expect("service registry lock poisoned")
            .get(&service_id)
            .map(|e| e.reference.clone())
    }

    /// Returns every reference implementing `interface` and matching the
    /// optional filter, sorted highest-ranked first. Withdrawn
    /// registrations are invisible here regardless of outstanding
    /// borrows.
    pub fn find(&self, interface: &str, filter: Option<&Filter>) -> Vec<ServiceReference> {
        let mut matches: Vec<ServiceReference> = self
            .entries
            .read()
            .trace_expect("service registry lock poisoned")
            .values()
            .filter(|e| !e.withdrawn)
            .filter(|e| e.reference.implements(interface))
            .filter(|e| filter.map(|f| f.matches(&e.reference.properties)).unwrap_or(true))
            .map(|e| e.reference.clone())
            .collect();
        matches.sort_by(|a, b| b.cmp(a));
        matches
    }

    pub fn find_best(&self, interface: &str, filter: Option<&Filter>) -> Option<ServiceReference> {
        self.find(interface, filter).into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc as StdArc;

    #[derive(Debug)]
    struct Dummy;

    fn props(ranking: i64) -> Properties {
        let mut p = Properties::new();
        p.insert(RANKING_KEY.to_owned(), forge_abi::HeaderValue::Integer(ranking));
        p
    }

    #[test]
    fn find_orders_by_ranking_then_id() {
        let registry = Registry::new();
        let low = registry.register(1, vec!["iface".into()], StdArc::new(Dummy), props(0));
        let high = registry.register(1, vec!["iface".into()], StdArc::new(Dummy), props(10));
        let tied_older = registry.register(1, vec!["iface".into()], StdArc::new(Dummy), props(5));
        let tied_newer = registry.register(1, vec!["iface".into()], StdArc::new(Dummy), props(5));

        let found = registry.find("iface", None);
        let ids: Vec<_> = found.iter().map(|r| r.service_id).collect();
        assert_eq!(
            ids,
            vec![
                high.service_id(),
                tied_older.service_id(),
                tied_newer.service_id(),
                low.service_id(),
            ]
        );
    }

    #[test]
    fn unregister_removes_entry() {
        let registry = Registry::new();
        let reg = registry.register(1, vec!["iface".into()], StdArc::new(Dummy), Properties::new());
        reg.unregister();
        assert!(registry.find("iface", None).is_empty());
    }

    #[tokio::test]
    async fn unregister_all_for_bundle_only_touches_that_bundle() {
        let registry = Registry::new();
        registry.register(1, vec!["iface".into()], StdArc::new(Dummy), Properties::new());
        registry.register(2, vec!["iface".into()], StdArc::new(Dummy), Properties::new());

        registry.unregister_all_for_bundle(1).await;

        let remaining = registry.find("iface", None);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].bundle_id, 2);
    }

    #[test]
    fn get_service_increments_use_count_and_caches_instance() {
        let registry = Registry::new();
        let reg = registry.register(1, vec!["iface".into()], StdArc::new(42u32), Properties::new());

        let first = registry.get_service(2, reg.service_id()).unwrap();
        let second = registry.get_service(2, reg.service_id()).unwrap();
        assert!(StdArc::ptr_eq(&first, &second));

        registry.unget_service(2, reg.service_id());
        // one outstanding borrow remains
        assert!(registry.get_service(2, reg.service_id()).is_some());
    }

    #[test]
    fn unregister_keeps_entry_alive_until_borrows_release() {
        let registry = Registry::new();
        let reg = registry.register(1, vec!["iface".into()], StdArc::new(Dummy), Properties::new());
        let service_id = reg.service_id();

        let borrowed = registry.get_service(2, service_id).unwrap();
        reg.unregister();

        assert!(registry.find("iface", None).is_empty());
        assert!(registry.get_reference(service_id).is_some());

        drop(borrowed);
        registry.unget_service(2, service_id);
        assert!(registry.get_reference(service_id).is_none());
    }

    struct CountingFactory {
        calls: AtomicUsize,
        unget_calls: AtomicUsize,
    }

    impl forge_abi::ServiceFactory for CountingFactory {
        fn get_service(&self, consumer_bundle: BundleId) -> Option<ErasedService> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Some(StdArc::new(consumer_bundle))
        }

        fn unget_service(&self, _consumer_bundle: BundleId, _service: ErasedService) {
            self.unget_calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn factory_is_invoked_once_per_distinct_consumer() {
        let registry = Registry::new();
        let factory = StdArc::new(CountingFactory {
            calls: AtomicUsize::new(0),
            unget_calls: AtomicUsize::new(0),
        });
        let reg = registry.register_factory(1, vec!["iface".into()], factory.clone(), Properties::new());

        let for_b = registry.get_service(2, reg.service_id()).unwrap();
        let for_c = registry.get_service(3, reg.service_id()).unwrap();
        assert_eq!(factory.calls.load(Ordering::SeqCst), 2);
        assert!(!StdArc::ptr_eq(&for_b, &for_c));

        registry.unget_service(2, reg.service_id());
        registry.unget_service(3, reg.service_id());
        assert_eq!(factory.unget_calls.load(Ordering::SeqCst), 2);
    }

    struct RecordingListener {
        events: std::sync::Mutex<Vec<ServiceEventKind>>,
    }

    impl ServiceListener for RecordingListener {
        fn service_changed(&self, event: &ServiceEvent) {
            self.events.lock().unwrap().push(event.kind);
        }
    }

    #[test]
    fn listener_receives_registered_modified_and_unregistering() {
        let registry = Registry::new();
        let listener = StdArc::new(RecordingListener {
            events: std::sync::Mutex::new(Vec::new()),
        });
        registry.add_listener("iface", None, StdArc::downgrade(&listener) as Weak<dyn ServiceListener>);

        let reg = registry.register(1, vec!["iface".into()], StdArc::new(Dummy), Properties::new());
        reg.set_properties(props(5));
        reg.unregister();

        let events = listener.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                ServiceEventKind::Registered,
                ServiceEventKind::Modified,
                ServiceEventKind::Unregistering,
            ]
        );
    }

    #[test]
    fn modified_endmatch_fires_when_filter_stops_matching() {
        let registry = Registry::new();
        let listener = StdArc::new(RecordingListener {
            events: std::sync::Mutex::new(Vec::new()),
        });
        let filter = Filter::parse("(service.ranking>=5)").unwrap();
        registry.add_listener("iface", Some(filter), StdArc::downgrade(&listener) as Weak<dyn ServiceListener>);

        let reg = registry.register(1, vec!["iface".into()], StdArc::new(Dummy), props(10));
        reg.set_properties(props(0));

        let events = listener.events.lock().unwrap().clone();
        assert_eq!(events, vec![ServiceEventKind::Registered, ServiceEventKind::ModifiedEndmatch]);
    }
}
