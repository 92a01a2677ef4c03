//! Black-box scenarios against `Framework`'s service registry surface.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use forge_abi::{ErasedService, HeaderValue, Properties, ServiceFactory};
use forge_core::bundle::BundleId;
use forge_core::config::FrameworkConfig;
use forge_core::Framework;

fn ranked(ranking: i64) -> Properties {
    let mut p = Properties::new();
    p.insert("service.ranking".to_owned(), HeaderValue::Integer(ranking));
    p
}

#[test]
fn ranking_tie_break_prefers_lower_id_then_higher_ranking() {
    let framework = Framework::new(&FrameworkConfig::default());
    let services = framework.services();

    let first = services.register(1, vec!["com.example.IWidget".to_owned()], Arc::new(()) as ErasedService, ranked(0));
    let second = services.register(1, vec!["com.example.IWidget".to_owned()], Arc::new(()) as ErasedService, ranked(0));

    let best = services.find_best("com.example.IWidget", None).unwrap();
    assert_eq!(best.service_id, first.service_id(), "equal ranking breaks the tie toward the older registration");

    let third = services.register(1, vec!["com.example.IWidget".to_owned()], Arc::new(()) as ErasedService, ranked(10));

    let best = services.find_best("com.example.IWidget", None).unwrap();
    assert_eq!(best.service_id, third.service_id(), "a higher ranking wins outright");

    let _ = second;
}

struct PerConsumerFactory {
    calls: AtomicUsize,
    unget_calls: AtomicUsize,
}

impl ServiceFactory for PerConsumerFactory {
    fn get_service(&self, consumer_bundle: BundleId) -> Option<ErasedService> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Some(Arc::new(consumer_bundle) as ErasedService)
    }

    fn unget_service(&self, _consumer_bundle: BundleId, _service: ErasedService) {
        self.unget_calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn factory_isolates_distinct_consumer_bundles() {
    let framework = Framework::new(&FrameworkConfig::default());
    let services = framework.services();

    let factory = Arc::new(PerConsumerFactory {
        calls: AtomicUsize::new(0),
        unget_calls: AtomicUsize::new(0),
    });
    let registration = services.register_factory(
        1,
        vec!["com.example.IConnection".to_owned()],
        factory.clone(),
        Properties::new(),
    );

    let for_b = services.get_service(2, registration.service_id()).unwrap();
    let for_c = services.get_service(3, registration.service_id()).unwrap();

    assert_eq!(factory.calls.load(Ordering::SeqCst), 2, "factory invoked once per distinct consumer");
    assert!(!Arc::ptr_eq(&for_b, &for_c), "each consumer gets its own instance");

    services.unget_service(2, registration.service_id());
    services.unget_service(3, registration.service_id());
    assert_eq!(factory.unget_calls.load(Ordering::SeqCst), 2, "factory's unget fires once per consumer release");
}
