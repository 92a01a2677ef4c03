//! Service registry.

mod event;
mod filter;
mod reference;
mod registration;
mod registry;
mod tracker;

pub use event::{ServiceEvent, ServiceEventKind, ServiceListener};
pub use filter::{Filter, FilterError};
pub use reference::ServiceReference;
pub use registration::ServiceRegistration;
pub use registry::Registry;
pub use tracker::{ServiceTracker, ServiceTrackerCustomizer};

/// Monotonically assigned service identifier.
pub type ServiceId = u64;

/// Well-known property key carrying a service's ranking.
pub const RANKING_KEY: &str = "service.ranking";
