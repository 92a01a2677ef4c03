//! Lightweight, cloneable handles to registered services.

use std::sync::Arc;

use forge_abi::Properties;

use super::ServiceId;
use crate::bundle::BundleId;

/// A snapshot of a registered service's identity, ranking and property
/// bag — cheap to clone and compare, independent of the service instance
/// itself.
///
/// Higher `service.ranking` sorts first; among equal rankings, the
/// *lower* (older) `service.id` sorts first.
#[derive(Debug, Clone)]
pub struct ServiceReference {
    pub service_id: ServiceId,
    pub bundle_id: BundleId,
    pub ranking: i64,
    pub interfaces: Arc<Vec<String>>,
    pub properties: Arc<Properties>,
}

impl ServiceReference {
    pub fn implements(&self, interface: &str) -> bool {
        self.interfaces.iter().any(|i| i == interface)
    }
}

impl PartialEq for ServiceReference {
    fn eq(&self, other: &Self) -> bool {
        self.service_id == other.service_id
    }
}

impl Eq for ServiceReference {}

impl PartialOrd for ServiceReference {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ServiceReference {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.ranking
            .cmp(&other.ranking)
            .then_with(|| other.service_id.cmp(&self.service_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(id: ServiceId, ranking: i64) -> ServiceReference {
        ServiceReference {
            service_id: id,
            bundle_id: 0,
            ranking,
            interfaces: Arc::new(vec!["com.example.IThing".to_owned()]),
            properties: Arc::new(Properties::new()),
        }
    }

    #[test]
    fn higher_ranking_sorts_first() {
        let low = reference(1, 0);
        let high = reference(2, 10);
        assert!(high > low);
    }

    #[test]
    fn equal_ranking_ties_to_lower_service_id() {
        let older = reference(1, 5);
        let newer = reference(2, 5);
        assert!(older > newer);
    }
}
