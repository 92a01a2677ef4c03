//! End-to-end bundle lifecycle + service withdrawal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use forge_abi::{ActivationError, Activator, BundleContext, HeaderValue, Manifest};
use forge_core::bundle::{BundleSource, BundleState};
use forge_core::config::FrameworkConfig;
use forge_core::Framework;
use serde_json::json;

struct ProducerActivator {
    stop_should_fail: bool,
    started: Arc<AtomicBool>,
}

impl Activator for ProducerActivator {
    fn start(&mut self, context: &dyn BundleContext) -> Result<(), ActivationError> {
        context.register_service(
            &["com.example.IWidget"],
            Arc::new(42u32),
            forge_abi::Properties::new(),
        );
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self, _context: &dyn BundleContext) -> Result<(), ActivationError> {
        if self.stop_should_fail {
            Err(ActivationError("simulated activator failure".to_owned()))
        } else {
            Ok(())
        }
    }
}

fn manifest(symbolic_name: &str) -> Manifest {
    Manifest::parse(&json!({
        "bundle.symbolic_name": symbolic_name,
        "bundle.version": "1.0.0",
        "bundle.activator": true,
    }))
    .unwrap()
}

fn in_process_source(stop_should_fail: bool, started: Arc<AtomicBool>) -> BundleSource {
    BundleSource::InProcess(Arc::new(move || {
        Box::new(ProducerActivator {
            stop_should_fail,
            started: started.clone(),
        }) as Box<dyn Activator>
    }))
}

#[tokio::test]
async fn install_start_stop_uninstall_follows_the_state_machine() {
    let framework = Framework::new(&FrameworkConfig::default());
    let started = Arc::new(AtomicBool::new(false));

    let id = framework
        .install(
            "file:///producer.bundle",
            manifest("com.example.producer"),
            in_process_source(false, started.clone()),
        )
        .unwrap();

    let snapshot = framework.bundle(id).await.unwrap();
    assert_eq!(snapshot.state, BundleState::Installed);

    framework.start(id).await.unwrap();
    assert!(started.load(Ordering::SeqCst));
    assert_eq!(framework.bundle(id).await.unwrap().state, BundleState::Active);

    let references = framework.services().find("com.example.IWidget", None);
    assert_eq!(references.len(), 1);

    framework.stop(id).await.unwrap();
    assert_eq!(framework.bundle(id).await.unwrap().state, BundleState::Resolved);
    assert!(framework.services().find("com.example.IWidget", None).is_empty());

    framework.uninstall(id).await.unwrap();
    assert!(framework.bundle(id).await.is_none());
}

#[tokio::test]
async fn stop_withdraws_services_even_when_activator_stop_fails() {
    let framework = Framework::new(&FrameworkConfig::default());
    let started = Arc::new(AtomicBool::new(false));

    let id = framework
        .install(
            "file:///flaky.bundle",
            manifest("com.example.flaky"),
            in_process_source(true, started),
        )
        .unwrap();

    framework.start(id).await.unwrap();
    assert!(!framework.services().find("com.example.IWidget", None).is_empty());

    let result = framework.stop(id).await;
    assert!(result.is_err());
    assert!(framework.services().find("com.example.IWidget", None).is_empty());
    assert_eq!(framework.bundle(id).await.unwrap().state, BundleState::Resolved);
}

#[tokio::test]
async fn duplicate_location_is_rejected() {
    let framework = Framework::new(&FrameworkConfig::default());
    let started = Arc::new(AtomicBool::new(false));

    framework
        .install(
            "file:///same.bundle",
            manifest("com.example.a"),
            in_process_source(false, started.clone()),
        )
        .unwrap();

    let second = framework.install(
        "file:///same.bundle",
        manifest("com.example.b"),
        in_process_source(false, started),
    );
    assert!(second.is_err());
}

#[tokio::test]
async fn shutdown_stops_active_bundles() {
    let framework = Framework::new(&FrameworkConfig::default());
    let started = Arc::new(AtomicBool::new(false));

    let id = framework
        .install(
            "file:///producer.bundle",
            manifest("com.example.producer"),
            in_process_source(false, started),
        )
        .unwrap();
    framework.start(id).await.unwrap();

    framework.shutdown().await;

    assert_eq!(framework.bundle(id).await.unwrap().state, BundleState::Resolved);
}
