//! Bundle data model and lifecycle.

mod registry;
mod lifecycle;

pub use registry::{BundleHandle, BundleRegistry, BundleSource};
pub use lifecycle::LifecycleController;

/// Monotonically assigned bundle identifier. `0` is reserved for the
/// system bundle.
pub type BundleId = u64;

/// A bundle's position in the lifecycle state machine.
///
/// Valid histories match the regex
/// `installed (resolved (starting active stopping)*)* uninstalled?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BundleState {
    Installed,
    Resolved,
    Starting,
    Active,
    Stopping,
    Uninstalled,
}

impl std::fmt::Display for BundleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BundleState::Installed => "installed",
            BundleState::Resolved => "resolved",
            BundleState::Starting => "starting",
            BundleState::Active => "active",
            BundleState::Stopping => "stopping",
            BundleState::Uninstalled => "uninstalled",
        };
        f.write_str(s)
    }
}

/// A read-only snapshot of a bundle's public attributes, safe to hand out
/// without holding the per-bundle lock.
#[derive(Debug, Clone)]
pub struct BundleSnapshot {
    pub id: BundleId,
    pub location: String,
    pub symbolic_name: String,
    pub version: String,
    pub state: BundleState,
    pub start_timestamp: Option<u64>,
}

/// Stand-in activator for bundles declared with `bundle.activator: false`
/// — purely declarative, component-only bundles still need
/// something to drive through `start`/`stop`.
#[derive(Debug, Default)]
pub struct NoopActivator;

impl forge_abi::Activator for NoopActivator {
    fn start(&mut self, _context: &dyn forge_abi::BundleContext) -> Result<(), forge_abi::activator::ActivationError> {
        Ok(())
    }
    fn stop(&mut self, _context: &dyn forge_abi::BundleContext) -> Result<(), forge_abi::activator::ActivationError> {
        Ok(())
    }
}
