//! Declarative Component Runtime.

mod activation;
mod config_admin;
mod reference_manager;
mod runtime;

pub use config_admin::{ConfigurationAdmin, ConfigurationListener, MemoryConfigurationAdmin};
pub use runtime::Runtime;

use std::collections::HashMap;

use forge_abi::manifest::ComponentDescription;

use crate::service::ServiceReference;

/// A component's position in the DCR state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentState {
    /// Declared, but a mandatory reference has no satisfying service, or
    /// `configuration-policy: require` has no pushed configuration.
    Unsatisfied,
    /// All mandatory references and configuration requirements are met;
    /// waiting on activation (only observable for `immediate: false`
    /// components that nobody has requested yet).
    Satisfied,
    /// The component instance exists and (if it declares interfaces) its
    /// service is registered.
    Active,
    /// Satisfied, but constructing the implementation instance failed.
    /// Terminal until the component is deactivated and reconsidered (a
    /// configuration push, a bundle restart, or an explicit deactivate).
    FailedActivation,
}

/// Per-component runtime bookkeeping the DCR keeps alongside its static
/// [`ComponentDescription`].
#[derive(Debug, Clone)]
pub struct ComponentEntry {
    pub bundle_id: crate::bundle::BundleId,
    pub description: ComponentDescription,
    pub state: ComponentState,
    pub service_id: Option<crate::service::ServiceId>,
    pub component_id: u64,
    /// Set once some consumer has asked the framework for this
    /// component's service; together with `description.immediate` this
    /// determines whether the configuration is *targeted* for
    /// activation rather than merely satisfied.
    pub requested: bool,
    /// Current candidate binding per declared reference name, recomputed
    /// on every (re-)evaluation.
    pub bound: HashMap<String, Vec<ServiceReference>>,
}
