//! Sample bundle: registers a greeter service on `start` and looks its
//! own registration back up through the `BundleContext`, the same round
//! trip any real consumer bundle would make.

use std::sync::Arc;

use forge_abi::{ActivationError, Activator, BundleContext, ServiceReferenceHandle};

/// The erased service instance registered under `com.example.IGreeter`.
/// Downstream bundles would downcast `ErasedService` to this type via
/// `Arc::downcast` after a `get_service` call.
pub struct Greeter {
    pub name: &'static str,
}

impl Greeter {
    pub fn greet(&self) -> String {
        format!("Hello from {}", self.name)
    }
}

#[derive(Default)]
struct HelloActivator {
    registration: Option<ServiceReferenceHandle>,
}

impl Activator for HelloActivator {
    fn start(&mut self, context: &dyn BundleContext) -> Result<(), ActivationError> {
        let handle = context.register_service(
            &["com.example.IGreeter"],
            Arc::new(Greeter { name: "hello-bundle" }),
            forge_abi::Properties::new(),
        );

        if let Some(reference) = context.get_service_reference("com.example.IGreeter", None) {
            if let Some(service) = context.get_service(reference) {
                if let Some(greeter) = service.downcast_ref::<Greeter>() {
                    tracing::info!("{}", greeter.greet());
                }
            }
        }

        self.registration = Some(handle);
        Ok(())
    }

    fn stop(&mut self, context: &dyn BundleContext) -> Result<(), ActivationError> {
        if let Some(handle) = self.registration.take() {
            context.unregister_service(handle);
        }
        Ok(())
    }
}

forge_abi::forge_bundle_activator!(HelloActivator, HelloActivator::default());
