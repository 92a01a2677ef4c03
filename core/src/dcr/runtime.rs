//! The Declarative Component Runtime engine proper.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use forge_abi::manifest::{BindingPolicy, ComponentDescription, ConfigurationPolicy, PolicyOption};
use trace_err::TraceErrResult;

use super::config_admin::{ConfigurationAdmin, ConfigurationListener};
use super::{activation, reference_manager, ComponentEntry, ComponentState};
use crate::bundle::BundleId;
use crate::error::{Error, Result};
use crate::service::{
    Registry as ServiceRegistry, ServiceEvent, ServiceEventKind, ServiceId, ServiceListener, ServiceReference,
};

/// Opaque instance registered on a component's behalf so the service
/// registry has something to hand out; the DCR itself never downcasts
/// this back to a concrete implementation type.
#[derive(Debug)]
struct ComponentMarker(#[allow(dead_code)] String);

/// Coordinates component activation across every installed bundle.
/// One instance per framework.
pub struct Runtime {
    services: Arc<ServiceRegistry>,
    config_admin: Arc<dyn ConfigurationAdmin>,
    components: RwLock<HashMap<String, ComponentEntry>>,
    /// Reverse lookup from a DCR-published service id to the component
    /// that owns it, so activating a consumer can recursively ensure its
    /// mandatory references' supplying configurations are `ACTIVE` too.
    service_to_component: RwLock<HashMap<ServiceId, String>>,
    /// Interfaces the runtime has already subscribed to on the registry,
    /// so rebinding reacts to arrivals/departures without polling.
    subscribed_interfaces: RwLock<HashSet<String>>,
    /// Cycles already reported by the offline diagnostic scan, keyed by
    /// their sorted member set, so a deadlock that outlives many
    /// `reconcile` passes is logged exactly once.
    logged_cycles: RwLock<HashSet<Vec<String>>>,
    next_component_id: AtomicU64,
}

impl Runtime {
    pub fn new(services: Arc<ServiceRegistry>, config_admin: Arc<dyn ConfigurationAdmin>) -> Arc<Self> {
        Arc::new_cyclic(|weak_self: &Weak<Runtime>| {
            config_admin.add_listener(weak_self.clone() as Weak<dyn ConfigurationListener>);
            Self {
                services,
                config_admin,
                components: RwLock::new(HashMap::new()),
                service_to_component: RwLock::new(HashMap::new()),
                subscribed_interfaces: RwLock::new(HashSet::new()),
                logged_cycles: RwLock::new(HashSet::new()),
                next_component_id: AtomicU64::new(1),
            }
        })
    }

    /// Declares every component a just-started bundle's manifest lists
    /// and attempts to bring whichever are targeted for activation to
    /// `ACTIVE`.
    pub fn register_bundle(self: &Arc<Self>, bundle_id: BundleId, descriptions: Vec<ComponentDescription>) -> Result<()> {
        self.subscribe_to_reference_interfaces(&descriptions);

        {
            let mut components = self.components.write().trace_expect("dcr component table lock poisoned");
            for description in descriptions {
                if !description.enabled {
                    continue;
                }
                let component_id = self.next_component_id.fetch_add(1, Ordering::SeqCst);
                components.insert(
                    description.name.clone(),
                    ComponentEntry {
                        bundle_id,
                        description,
                        state: ComponentState::Unsatisfied,
                        service_id: None,
                        component_id,
                        requested: false,
                        bound: HashMap::new(),
                    },
                );
            }
        }

        self.reconcile()
    }

    fn subscribe_to_reference_interfaces(self: &Arc<Self>, descriptions: &[ComponentDescription]) {
        let weak_self: Weak<Runtime> = Arc::downgrade(self);
        let mut subscribed = self.subscribed_interfaces.write().trace_expect("dcr subscription lock poisoned");
        for description in descriptions {
            for reference in &description.references {
                if subscribed.insert(reference.interface.clone()) {
                    self.services
                        .add_listener(reference.interface.clone(), None, weak_self.clone() as Weak<dyn ServiceListener>);
                }
            }
        }
    }

    /// Deactivates and forgets every component a stopped bundle declared,
    /// then re-checks everyone else: another bundle's component may have
    /// depended on a service this one provided.
    pub fn unregister_bundle(&self, bundle_id: BundleId) {
        let names: Vec<String> = {
            let components = self.components.read().trace_expect("dcr component table lock poisoned");
            components
                .iter()
                .filter(|(_, e)| e.bundle_id == bundle_id)
                .map(|(name, _)| name.clone())
                .collect()
        };

        for name in &names {
            self.deactivate(name);
        }

        {
            let mut components = self.components.write().trace_expect("dcr component table lock poisoned");
            for name in &names {
                components.remove(name);
            }
        }

        let _ = self.reconcile();
    }

    /// Withdraws a component's published service, releases every bound
    /// reference's use-count borrow, and resets it to `UNSATISFIED_REFERENCE`.
    /// Reentrancy-safe: deactivating an already-inactive component is a no-op.
    fn deactivate(&self, name: &str) {
        let (bundle_id, service_id, bound) = {
            let mut components = self.components.write().trace_expect("dcr component table lock poisoned");
            let Some(entry) = components.get_mut(name) else {
                return;
            };
            if entry.state != ComponentState::Active && entry.state != ComponentState::FailedActivation {
                return;
            }
            let bundle_id = entry.bundle_id;
            let service_id = entry.service_id.take();
            let bound = std::mem::take(&mut entry.bound);
            entry.state = ComponentState::Unsatisfied;
            (bundle_id, service_id, bound)
        };

        if let Some(service_id) = service_id {
            self.service_to_component.write().trace_expect("dcr reverse map lock poisoned").remove(&service_id);
            self.services.unregister(service_id);
        }
        for candidates in bound.values() {
            for candidate in candidates {
                self.services.unget_service(bundle_id, candidate.service_id);
            }
        }

        tracing::debug!(component = name, "deactivated component");
    }

    /// Re-evaluates every declared component to a fixed point, activating
    /// whichever have become satisfied and targeted. Intentionally
    /// O(components^2) in the worst case: DCR graphs are small and
    /// correctness of the fixed point matters more than a second pass.
    pub fn reconcile(&self) -> Result<()> {
        let mut cycle_suppressed: HashSet<String> = HashSet::new();
        loop {
            let names: Vec<String> = self
                .components
                .read()
                .trace_expect("dcr component table lock poisoned")
                .keys()
                .cloned()
                .collect();

            let mut changed = false;
            for name in names {
                if cycle_suppressed.contains(&name) {
                    continue;
                }
                match self.evaluate(&name) {
                    Ok(did_change) => changed |= did_change,
                    Err(Error::CircularReference(cycle)) => {
                        changed = true;
                        cycle_suppressed.extend(cycle);
                    }
                    Err(e) => return Err(e),
                }
            }
            if !changed {
                self.log_new_deadlock_cycles();
                return Ok(());
            }
        }
    }

    /// Scans declared components for mandatory-reference cycles once the
    /// fixed point settles, purely to produce a diagnostic: by this point
    /// any cycle here has already left its members `UNSATISFIED_REFERENCE`
    /// through ordinary registry lookups finding no candidate, not through
    /// the thread-local activation stack, since a pure satisfaction
    /// deadlock never reaches an activation attempt at all. Each distinct
    /// cycle is logged once for the life of the runtime.
    fn log_new_deadlock_cycles(&self) {
        let descriptions: Vec<ComponentDescription> = self
            .components
            .read()
            .trace_expect("dcr component table lock poisoned")
            .values()
            .map(|e| e.description.clone())
            .collect();
        for cycle in reference_manager::detect_cycles(&descriptions) {
            let mut key = cycle.clone();
            key.sort();
            key.dedup();
            let mut logged = self.logged_cycles.write().trace_expect("dcr cycle log lock poisoned");
            if logged.insert(key) {
                tracing::error!(cycle = ?cycle, "Circular Reference: mandatory-reference deadlock among components");
            }
        }
    }

    /// Marks a component's service as having been requested by a
    /// consumer, which targets it for activation even when it is not
    /// `immediate`, then re-evaluates.
    pub fn request_interface(&self, interface: &str) {
        let names: Vec<String> = {
            let mut components = self.components.write().trace_expect("dcr component table lock poisoned");
            let mut touched = Vec::new();
            for (name, entry) in components.iter_mut() {
                if entry.state != ComponentState::Active && entry.description.interfaces.iter().any(|i| i == interface) {
                    entry.requested = true;
                    touched.push(name.clone());
                }
            }
            touched
        };
        if !names.is_empty() {
            let _ = self.reconcile();
        }
    }

    fn compute_satisfaction(&self, description: &ComponentDescription) -> (bool, HashMap<String, Vec<ServiceReference>>) {
        let config_ok = match description.configuration_policy {
            ConfigurationPolicy::Require => self.config_admin.get(&description.name).is_some(),
            ConfigurationPolicy::Optional | ConfigurationPolicy::Ignore => true,
        };
        if !config_ok {
            return (false, HashMap::new());
        }
        let bound = reference_manager::candidate_bindings(description, &self.services);
        let refs_ok = description
            .references
            .iter()
            .filter(|r| r.cardinality.is_mandatory())
            .all(|r| bound.get(&r.name).map(|c| !c.is_empty()).unwrap_or(false));
        (refs_ok, bound)
    }

    /// Brings a single component one step forward: `Unsatisfied` →
    /// `Satisfied` → (if targeted) fully `Active`. Returns `Ok(true)` if
    /// this call changed the component's observable state.
    fn evaluate(&self, name: &str) -> Result<bool> {
        let (description, prior_state, requested) = {
            let components = self.components.read().trace_expect("dcr component table lock poisoned");
            let Some(entry) = components.get(name) else {
                return Ok(false);
            };
            if entry.state == ComponentState::Active || entry.state == ComponentState::FailedActivation {
                return Ok(false);
            }
            (entry.description.clone(), entry.state, entry.requested)
        };

        let (satisfied, bound) = self.compute_satisfaction(&description);
        if !satisfied {
            let changed = prior_state != ComponentState::Unsatisfied;
            let mut components = self.components.write().trace_expect("dcr component table lock poisoned");
            if let Some(entry) = components.get_mut(name) {
                entry.state = ComponentState::Unsatisfied;
                entry.bound = bound;
            }
            return Ok(changed);
        }

        let targeted = description.immediate || requested;
        if !targeted {
            let changed = prior_state != ComponentState::Satisfied;
            let mut components = self.components.write().trace_expect("dcr component table lock poisoned");
            if let Some(entry) = components.get_mut(name) {
                entry.state = ComponentState::Satisfied;
                entry.bound = bound;
            }
            return Ok(changed);
        }

        self.activate_component(name, &description, bound)
    }

    /// Steps 3–7 of the activation algorithm: enters the thread-local
    /// activation stack (the sole cycle-detection mechanism), recursively
    /// ensures every mandatory reference's supplying configuration is
    /// `ACTIVE`, then constructs and publishes this one.
    fn activate_component(
        &self,
        name: &str,
        description: &ComponentDescription,
        bound: HashMap<String, Vec<ServiceReference>>,
    ) -> Result<bool> {
        {
            let mut components = self.components.write().trace_expect("dcr component table lock poisoned");
            if let Some(entry) = components.get_mut(name) {
                entry.state = ComponentState::Satisfied;
                entry.bound = bound.clone();
            }
        }

        let _guard = match activation::enter(name) {
            Ok(guard) => guard,
            Err(cycle) => {
                tracing::error!(cycle = ?cycle, "Circular Reference: component activation order cannot be resolved");
                let mut components = self.components.write().trace_expect("dcr component table lock poisoned");
                for member in &cycle {
                    if let Some(entry) = components.get_mut(member) {
                        entry.state = ComponentState::Unsatisfied;
                    }
                }
                return Err(Error::CircularReference(cycle));
            }
        };

        for reference in &description.references {
            if !reference.cardinality.is_mandatory() {
                continue;
            }
            let Some(best) = bound.get(&reference.name).and_then(|c| c.first()) else {
                continue;
            };
            let owner = self
                .service_to_component
                .read()
                .trace_expect("dcr reverse map lock poisoned")
                .get(&best.service_id)
                .cloned();
            if let Some(owner) = owner {
                if owner != name {
                    if !self.ensure_active(&owner)? {
                        // Dependency could not reach ACTIVE: remain SATISFIED.
                        return Ok(true);
                    }
                }
            }
        }

        let bundle_id = {
            let components = self.components.read().trace_expect("dcr component table lock poisoned");
            components.get(name).map(|e| e.bundle_id)
        };
        let Some(bundle_id) = bundle_id else {
            return Ok(false);
        };

        let should_fail = self
            .config_admin
            .get(&description.name)
            .and_then(|p| p.get("activation.fail").and_then(|v| v.as_bool()))
            .unwrap_or(false);
        if should_fail {
            tracing::error!(component = name, "Component Activation failed: simulated construction failure");
            let mut components = self.components.write().trace_expect("dcr component table lock poisoned");
            if let Some(entry) = components.get_mut(name) {
                entry.state = ComponentState::FailedActivation;
            }
            return Ok(true);
        }

        // Borrow every bound reference so the registry's use-count
        // reflects this component's consumption of its dependencies.
        for candidates in bound.values() {
            for candidate in candidates {
                self.services.get_service(bundle_id, candidate.service_id);
            }
        }

        let component_id = {
            let components = self.components.read().trace_expect("dcr component table lock poisoned");
            components.get(name).map(|e| e.component_id).unwrap_or(0)
        };

        let service_id = if description.interfaces.is_empty() {
            None
        } else {
            let mut properties = forge_abi::Properties::new();
            properties.insert("component.name".to_owned(), forge_abi::HeaderValue::String(name.to_owned()));
            properties.insert("component.id".to_owned(), forge_abi::HeaderValue::Integer(component_id as i64));
            let registration = self.services.register(
                bundle_id,
                description.interfaces.clone(),
                Arc::new(ComponentMarker(name.to_owned())),
                properties,
            );
            self.service_to_component
                .write()
                .trace_expect("dcr reverse map lock poisoned")
                .insert(registration.service_id(), name.to_owned());
            Some(registration.service_id())
        };

        let mut components = self.components.write().trace_expect("dcr component table lock poisoned");
        if let Some(entry) = components.get_mut(name) {
            entry.state = ComponentState::Active;
            entry.service_id = service_id;
        }
        drop(components);

        tracing::info!(component = name, "activated component");
        Ok(true)
    }

    /// Recursively activates `name` regardless of whether it is itself
    /// targeted: being another component's mandatory dependency is a
    /// request in its own right. Returns `Ok(false)` (not an error) if it
    /// only reaches `SATISFIED`/`FAILED_ACTIVATION` or stays `UNSATISFIED_REFERENCE`.
    fn ensure_active(&self, name: &str) -> Result<bool> {
        let (description, state) = {
            let components = self.components.read().trace_expect("dcr component table lock poisoned");
            let Some(entry) = components.get(name) else {
                return Ok(false);
            };
            (entry.description.clone(), entry.state)
        };
        if state == ComponentState::Active {
            return Ok(true);
        }
        if state == ComponentState::FailedActivation {
            return Ok(false);
        }
        let (satisfied, bound) = self.compute_satisfaction(&description);
        if !satisfied {
            let mut components = self.components.write().trace_expect("dcr component table lock poisoned");
            if let Some(entry) = components.get_mut(name) {
                entry.state = ComponentState::Unsatisfied;
                entry.bound = bound;
            }
            return Ok(false);
        }
        self.activate_component(name, &description, bound)
            .map(|_| self.state_of(name) == Some(ComponentState::Active))
    }

    pub fn state_of(&self, name: &str) -> Option<ComponentState> {
        self.components
            .read()
            .trace_expect("dcr component table lock poisoned")
            .get(name)
            .map(|e| e.state)
    }

    /// Reacts to arrival/departure of a service implementing a reference
    /// interest per its declared `(policy, policy-option)` and the four
    /// rebinding behaviours that combination selects, then re-evaluates
    /// everyone.
    fn handle_service_event(&self, event: &ServiceEvent) {
        let departed = matches!(event.kind, ServiceEventKind::Unregistering | ServiceEventKind::ModifiedEndmatch);

        let names: Vec<String> = self
            .components
            .read()
            .trace_expect("dcr component table lock poisoned")
            .iter()
            .filter(|(_, e)| e.state == ComponentState::Active)
            .filter(|(_, e)| {
                e.description
                    .references
                    .iter()
                    .any(|r| event.reference.implements(&r.interface))
            })
            .map(|(name, _)| name.clone())
            .collect();

        for name in names {
            self.rebind(&name, event, departed);
        }

        let _ = self.reconcile();
    }

    fn rebind(&self, name: &str, event: &ServiceEvent, departed: bool) {
        let (description, currently_bound, bundle_id) = {
            let components = self.components.read().trace_expect("dcr component table lock poisoned");
            let Some(entry) = components.get(name) else {
                return;
            };
            if entry.state != ComponentState::Active {
                return;
            }
            (entry.description.clone(), entry.bound.clone(), entry.bundle_id)
        };

        for reference in &description.references {
            if !event.reference.implements(&reference.interface) {
                continue;
            }
            let bound_here = currently_bound.get(&reference.name).cloned().unwrap_or_default();
            let currently_using = bound_here.iter().any(|c| c.service_id == event.reference.service_id);

            match (reference.policy, reference.policy_option, departed) {
                (BindingPolicy::Static, _, true) if currently_using => {
                    tracing::debug!(component = name, reference = %reference.name, "static reference lost, deactivating for reactivation");
                    self.deactivate(name);
                }
                (BindingPolicy::Static, PolicyOption::Greedy, false) => {
                    let best = self.services.find_best(&reference.interface, None);
                    if let Some(best) = best {
                        if !bound_here.first().map(|c| c.service_id == best.service_id).unwrap_or(true) && best > bound_here[0] {
                            tracing::debug!(component = name, reference = %reference.name, "higher-ranked candidate arrived, deactivating for reactivation");
                            self.deactivate(name);
                        }
                    }
                }
                (BindingPolicy::Static, PolicyOption::Reluctant, false) => {
                    // Arrival of a higher-ranked candidate never rebinds.
                }
                (BindingPolicy::Dynamic, _, true) if currently_using => {
                    let next_best = self
                        .services
                        .find(&reference.interface, None)
                        .into_iter()
                        .find(|c| c.service_id != event.reference.service_id);
                    match next_best {
                        Some(next) => {
                            tracing::debug!(component = name, reference = %reference.name, "dynamic rebind to next-best candidate");
                            self.services.unget_service(bundle_id, event.reference.service_id);
                            self.services.get_service(bundle_id, next.service_id);
                            self.replace_binding(name, &reference.name, vec![next]);
                        }
                        None if reference.cardinality.is_mandatory() => {
                            tracing::debug!(component = name, reference = %reference.name, "mandatory dynamic reference lost with no replacement, deactivating");
                            self.deactivate(name);
                        }
                        None => {
                            self.replace_binding(name, &reference.name, Vec::new());
                        }
                    }
                }
                (BindingPolicy::Dynamic, PolicyOption::Greedy, false) => {
                    let best = self.services.find_best(&reference.interface, None);
                    if let Some(best) = best {
                        if !bound_here.first().map(|c| c.service_id == best.service_id).unwrap_or(false) {
                            tracing::debug!(component = name, reference = %reference.name, "dynamic greedy rebind to best candidate");
                            if let Some(old) = bound_here.first() {
                                self.services.unget_service(bundle_id, old.service_id);
                            }
                            self.services.get_service(bundle_id, best.service_id);
                            self.replace_binding(name, &reference.name, vec![best]);
                        }
                    }
                }
                (BindingPolicy::Dynamic, PolicyOption::Reluctant, false) => {
                    // Arrival is ignored while already bound.
                }
                _ => {}
            }
        }
    }

    fn replace_binding(&self, name: &str, reference_name: &str, candidates: Vec<ServiceReference>) {
        let mut components = self.components.write().trace_expect("dcr component table lock poisoned");
        if let Some(entry) = components.get_mut(name) {
            entry.bound.insert(reference_name.to_owned(), candidates);
        }
    }
}

impl ServiceListener for Runtime {
    fn service_changed(&self, event: &ServiceEvent) {
        self.handle_service_event(event);
    }
}

impl ConfigurationListener for Runtime {
    /// `require` reacts to configuration deletion by deactivating;
    /// `optional` re-activates on every later push; `ignore` never
    /// affects activation.
    fn configuration_changed(&self, pid: &str, properties: Option<&forge_abi::Properties>) {
        let policy = {
            let components = self.components.read().trace_expect("dcr component table lock poisoned");
            components.get(pid).map(|e| e.description.configuration_policy)
        };
        match policy {
            Some(ConfigurationPolicy::Require) if properties.is_none() => {
                self.deactivate(pid);
            }
            Some(ConfigurationPolicy::Optional) => {
                self.deactivate(pid);
            }
            _ => {}
        }
        let _ = self.reconcile();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dcr::config_admin::MemoryConfigurationAdmin;
    use forge_abi::manifest::{BindingPolicy, Cardinality, ConfigurationPolicy, PolicyOption, ReferenceDescription};

    fn component(name: &str, interfaces: &[&str], requires: &[&str]) -> ComponentDescription {
        ComponentDescription {
            name: name.to_owned(),
            implementation: format!("{name}Impl"),
            interfaces: interfaces.iter().map(|s| s.to_string()).collect(),
            enabled: true,
            immediate: true,
            configuration_policy: ConfigurationPolicy::Ignore,
            references: requires
                .iter()
                .map(|interface| ReferenceDescription {
                    name: interface.to_string(),
                    interface: interface.to_string(),
                    cardinality: Cardinality::OneToOne,
                    policy: BindingPolicy::Static,
                    policy_option: PolicyOption::Reluctant,
                    target: None,
                })
                .collect(),
        }
    }

    fn runtime() -> Arc<Runtime> {
        Runtime::new(ServiceRegistry::new(), MemoryConfigurationAdmin::new())
    }

    #[test]
    fn linear_chain_activates_fully() {
        let rt = runtime();
        rt.register_bundle(
            1,
            vec![
                component("A", &["IA"], &[]),
                component("B", &["IB"], &["IA"]),
                component("C", &["IC"], &["IB"]),
            ],
        )
        .unwrap();

        assert_eq!(rt.state_of("A"), Some(ComponentState::Active));
        assert_eq!(rt.state_of("B"), Some(ComponentState::Active));
        assert_eq!(rt.state_of("C"), Some(ComponentState::Active));
    }

    #[test]
    fn mandatory_cycle_leaves_all_members_unsatisfied() {
        let rt = runtime();
        rt.register_bundle(
            1,
            vec![component("A", &["IA"], &["IB"]), component("B", &["IB"], &["IA"])],
        )
        .unwrap();

        assert_eq!(rt.state_of("A"), Some(ComponentState::Unsatisfied));
        assert_eq!(rt.state_of("B"), Some(ComponentState::Unsatisfied));
    }

    #[test]
    fn optional_edge_breaks_the_deadlock() {
        let rt = runtime();
        let mut a = component("A", &["IA"], &["IB"]);
        a.references[0].cardinality = Cardinality::ZeroToOne;
        let b = component("B", &["IB"], &["IA"]);
        rt.register_bundle(1, vec![a, b]).unwrap();

        assert_eq!(rt.state_of("A"), Some(ComponentState::Active));
        assert_eq!(rt.state_of("B"), Some(ComponentState::Active));
    }

    #[test]
    fn unregister_bundle_withdraws_its_components() {
        let rt = runtime();
        rt.register_bundle(1, vec![component("A", &["IA"], &[])]).unwrap();
        assert_eq!(rt.state_of("A"), Some(ComponentState::Active));

        rt.unregister_bundle(1);
        assert_eq!(rt.state_of("A"), None);
    }

    #[test]
    fn require_configuration_policy_blocks_activation_until_pushed() {
        let rt = runtime();
        let mut c = component("A", &["IA"], &[]);
        c.configuration_policy = ConfigurationPolicy::Require;
        rt.register_bundle(1, vec![c]).unwrap();
        assert_eq!(rt.state_of("A"), Some(ComponentState::Unsatisfied));
    }

    #[test]
    fn require_configuration_policy_activates_once_pushed() {
        let rt = runtime();
        let mut c = component("A", &["IA"], &[]);
        c.configuration_policy = ConfigurationPolicy::Require;
        rt.register_bundle(1, vec![c]).unwrap();

        rt.config_admin.update("A", forge_abi::Properties::new());
        assert_eq!(rt.state_of("A"), Some(ComponentState::Active));
    }

    #[test]
    fn optional_configuration_reactivates_on_later_push() {
        let rt = runtime();
        let mut c = component("A", &["IA"], &[]);
        c.configuration_policy = ConfigurationPolicy::Optional;
        rt.register_bundle(1, vec![c]).unwrap();
        assert_eq!(rt.state_of("A"), Some(ComponentState::Active));
        let first_service_id = {
            let components = rt.components.read().unwrap();
            components.get("A").unwrap().service_id
        };

        rt.config_admin.update("A", forge_abi::Properties::new());
        assert_eq!(rt.state_of("A"), Some(ComponentState::Active));
        let second_service_id = {
            let components = rt.components.read().unwrap();
            components.get("A").unwrap().service_id
        };
        assert_ne!(first_service_id, second_service_id, "optional policy re-activates on every push");
    }

    #[test]
    fn non_immediate_component_stays_satisfied_until_requested() {
        let rt = runtime();
        let mut c = component("A", &["IA"], &[]);
        c.immediate = false;
        rt.register_bundle(1, vec![c]).unwrap();
        assert_eq!(rt.state_of("A"), Some(ComponentState::Satisfied));

        rt.request_interface("IA");
        assert_eq!(rt.state_of("A"), Some(ComponentState::Active));
    }

    #[test]
    fn simulated_construction_failure_yields_failed_activation() {
        let rt = runtime();
        rt.config_admin.update("A", {
            let mut p = forge_abi::Properties::new();
            p.insert("activation.fail".to_owned(), forge_abi::HeaderValue::Bool(true));
            p
        });
        rt.register_bundle(1, vec![component("A", &["IA"], &[])]).unwrap();
        assert_eq!(rt.state_of("A"), Some(ComponentState::FailedActivation));
    }

    #[test]
    fn three_component_mandatory_cycle_leaves_all_unsatisfied() {
        let rt = runtime();
        rt.register_bundle(
            1,
            vec![
                component("A", &["IA"], &["IB"]),
                component("B", &["IB"], &["IC"]),
                component("C", &["IC"], &["IA"]),
            ],
        )
        .unwrap();

        assert_eq!(rt.state_of("A"), Some(ComponentState::Unsatisfied));
        assert_eq!(rt.state_of("B"), Some(ComponentState::Unsatisfied));
        assert_eq!(rt.state_of("C"), Some(ComponentState::Unsatisfied));
    }

    #[test]
    fn optional_reference_into_a_mandatory_cycle_still_activates() {
        let rt = runtime();
        let mut watcher = component("Watcher", &["IWatcher"], &["IA"]);
        watcher.references[0].cardinality = Cardinality::ZeroToOne;
        rt.register_bundle(
            1,
            vec![
                component("A", &["IA"], &["IB"]),
                component("B", &["IB"], &["IA"]),
                watcher,
            ],
        )
        .unwrap();

        assert_eq!(rt.state_of("A"), Some(ComponentState::Unsatisfied));
        assert_eq!(rt.state_of("B"), Some(ComponentState::Unsatisfied));
        assert_eq!(rt.state_of("Watcher"), Some(ComponentState::Active));
    }
}
