//! Platform shared-object loader abstraction.
//!
//! The framework only ever needs three operations from the platform
//! loader; everything else (symbol mangling, search paths, `RTLD_*`
//! flags) is `libloading`'s concern, not ours.

use crate::activator::Activator;
use crate::error::{Error, Result};

/// Wraps a loaded shared library and the single [`Activator`] instance
/// resolved from its well-known entry symbol.
///
/// The library is kept alive (it is not unloaded) for as long as the
/// returned `Box<dyn Activator>` might still be in use — dropping
/// `LoadedLibrary` unloads the library, so callers must drop the
/// activator instance first.
pub struct LoadedLibrary {
    // Order matters: fields drop top-to-bottom, so `activator` (which
    // may hold pointers into `library`'s code) must be dropped before
    // `library` itself is unloaded.
    pub activator: Box<dyn Activator>,
    #[allow(dead_code)]
    library: libloading::Library,
}

/// Loads a bundle's shared library and resolves its activator.
///
/// # Safety
///
/// This calls into arbitrary native code via `dlopen`/`LoadLibrary` and
/// invokes an exported constructor. The caller is responsible for only
/// loading libraries built for the same ABI (same Rust toolchain version
/// and `Activator` trait definition) as the host — this is a same-process
/// Rust-to-Rust plugin boundary, not a stable C ABI.
pub unsafe fn load(path: &std::path::Path) -> Result<LoadedLibrary> {
    let library = unsafe {
        libloading::Library::new(path).map_err(|e| Error::LibraryLoad(e.to_string()))?
    };

    let constructor: libloading::Symbol<crate::ActivatorConstructor> = unsafe {
        library
            .get(crate::ACTIVATOR_SYMBOL)
            .map_err(|_| Error::MissingActivatorSymbol)?
    };

    let raw = unsafe { constructor() };
    if raw.is_null() {
        return Err(Error::LibraryLoad(
            "activator constructor returned null".to_owned(),
        ));
    }
    let activator = unsafe { Box::from_raw(raw) };

    Ok(LoadedLibrary { activator, library })
}
