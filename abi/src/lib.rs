//! ABI boundary between the forge framework and bundle shared libraries.
//!
//! Bundle authors depend on this crate with default features (no
//! `libloading`, no filesystem access) to implement [`Activator`] and
//! describe a bundle's manifest. The framework host depends on it with
//! the `host` feature enabled, which pulls in [`loader`] (wrapping
//! `libloading`) and the [`archive::DirArchive`] reference reader.

pub mod error;
pub mod manifest;
pub mod activator;
pub mod archive;

#[cfg(feature = "host")]
pub mod loader;

pub use error::Error;
pub use manifest::{HeaderValue, Manifest};
pub use activator::{
    Activator, BundleContext, ErasedService, Properties, ServiceEvent, ServiceEventKind,
    ServiceFactory, ServiceListener, ServiceReferenceHandle,
};

/// Well-known C-linkage symbol name every bundle shared library must
/// export exactly once.
pub const ACTIVATOR_SYMBOL: &[u8] = b"_forge_bundle_activator\0";

/// Signature of the exported constructor behind [`ACTIVATOR_SYMBOL`].
pub type ActivatorConstructor = unsafe extern "C" fn() -> *mut dyn Activator;

/// Exports the well-known activator entry point from a bundle `cdylib`.
///
/// ```ignore
/// struct MyActivator;
/// impl forge_abi::Activator for MyActivator { /* ... */ }
/// forge_abi::forge_bundle_activator!(MyActivator, MyActivator);
/// ```
#[macro_export]
macro_rules! forge_bundle_activator {
    ($ty:ty, $ctor:expr) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn _forge_bundle_activator() -> *mut dyn $crate::Activator {
            let activator: $ty = $ctor;
            Box::into_raw(Box::new(activator))
        }
    };
}
