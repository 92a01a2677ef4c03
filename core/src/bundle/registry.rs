//! Bundle registry: a table of installed bundles keyed by
//! location, with monotonically assigned numeric ids.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use trace_err::TraceErrResult;

use super::{BundleId, BundleSnapshot, BundleState};
use crate::error::{Error, Result};

/// Where a bundle's code comes from — either a real shared library
/// resolved through [`forge_abi::loader`], or an in-process activator
/// factory (used by tests and by bundles embedded directly in the host
/// binary).
pub enum BundleSource {
    Library(std::path::PathBuf),
    InProcess(std::sync::Arc<dyn Fn() -> Box<dyn forge_abi::Activator> + Send + Sync>),
}

pub(crate) enum ActiveActivator {
    Library(forge_abi::loader::LoadedLibrary),
    InProcess(Box<dyn forge_abi::Activator>),
}

impl ActiveActivator {
    pub(crate) fn as_mut(&mut self) -> &mut dyn forge_abi::Activator {
        match self {
            ActiveActivator::Library(lib) => lib.activator.as_mut(),
            ActiveActivator::InProcess(activator) => activator.as_mut(),
        }
    }
}

pub(crate) struct BundleInner {
    pub(crate) manifest: forge_abi::Manifest,
    pub(crate) source: BundleSource,
    pub(crate) state: BundleState,
    pub(crate) start_timestamp: Option<u64>,
    pub(crate) activator: Option<ActiveActivator>,
}

/// A single table entry. The per-bundle `tokio::sync::Mutex` is the
/// serialization point: exactly one task is ever inside `start` or
/// `stop` for a given bundle at any moment.
pub struct BundleHandle {
    pub id: BundleId,
    pub location: String,
    pub(crate) inner: tokio::sync::Mutex<BundleInner>,
}

impl BundleHandle {
    pub async fn snapshot(&self) -> BundleSnapshot {
        let inner = self.inner.lock().await;
        BundleSnapshot {
            id: self.id,
            location: self.location.clone(),
            symbolic_name: inner.manifest.symbolic_name().to_owned(),
            version: inner.manifest.version().to_owned(),
            state: inner.state,
            start_timestamp: inner.start_timestamp,
        }
    }

    pub async fn state(&self) -> BundleState {
        self.inner.lock().await.state
    }

    pub async fn manifest(&self) -> forge_abi::Manifest {
        self.inner.lock().await.manifest.clone()
    }
}

/// Table of installed bundles. Thread-safe: reads take a
/// shared lock, installs/removals take an exclusive one, both held only
/// long enough to touch the table itself — never across activator calls.
pub struct BundleRegistry {
    next_id: AtomicU64,
    bundles: RwLock<HashMap<BundleId, std::sync::Arc<BundleHandle>>>,
    by_location: RwLock<HashMap<String, BundleId>>,
}

impl BundleRegistry {
    pub fn new() -> Self {
        Self {
            // id 0 is reserved for the system bundle.
            next_id: AtomicU64::new(1),
            bundles: RwLock::new(HashMap::new()),
            by_location: RwLock::new(HashMap::new()),
        }
    }

    /// Installs a bundle at `location`. No user code runs here — only
    /// manifest validation.
    pub fn install(
        &self,
        location: String,
        manifest: forge_abi::Manifest,
        source: BundleSource,
    ) -> Result<std::sync::Arc<BundleHandle>> {
        let mut by_location = self
            .by_location
            .write()
            .trace_expect("bundle registry location index lock poisoned");

        if by_location.contains_key(&location) {
            return Err(Error::InvalidArgument(format!(
                "bundle already installed at location {location}"
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let handle = std::sync::Arc::new(BundleHandle {
            id,
            location: location.clone(),
            inner: tokio::sync::Mutex::new(BundleInner {
                manifest,
                source,
                state: BundleState::Installed,
                start_timestamp: None,
                activator: None,
            }),
        });

        self.bundles
            .write()
            .trace_expect("bundle registry table lock poisoned")
            .insert(id, handle.clone());
        by_location.insert(location, id);

        tracing::info!(bundle_id = id, "installed bundle");
        Ok(handle)
    }

    /// Removes a bundle from the table. The
    /// caller is responsible for having already driven the bundle to
    /// `Resolved` or `Installed` before calling this.
    pub fn remove(&self, id: BundleId) -> Result<()> {
        let handle = self
            .bundles
            .write()
            .trace_expect("bundle registry table lock poisoned")
            .remove(&id)
            .ok_or_else(|| Error::IllegalState(format!("no such bundle {id}")))?;

        self.by_location
            .write()
            .trace_expect("bundle registry location index lock poisoned")
            .remove(&handle.location);

        tracing::info!(bundle_id = id, "uninstalled bundle");
        Ok(())
    }

    pub fn get(&self, id: BundleId) -> Option<std::sync::Arc<BundleHandle>> {
        self.bundles
            .read()
            .trace_expect("bundle registry table lock poisoned")
            .get(&id)
            .cloned()
    }

    pub fn get_by_location(&self, location: &str) -> Option<std::sync::Arc<BundleHandle>> {
        let id = *self
            .by_location
            .read()
            .trace_expect("bundle registry location index lock poisoned")
            .get(location)?;
        self.get(id)
    }

    pub fn bundles(&self) -> Vec<std::sync::Arc<BundleHandle>> {
        self.bundles
            .read()
            .trace_expect("bundle registry table lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Checks the `(symbolic name, version)` uniqueness invariant against
    /// currently-active bundles only.
    pub async fn is_name_version_active(
        &self,
        symbolic_name: &str,
        version: &str,
        excluding: BundleId,
    ) -> bool {
        for handle in self.bundles() {
            if handle.id == excluding {
                continue;
            }
            let inner = handle.inner.lock().await;
            if inner.state == BundleState::Active
                && inner.manifest.symbolic_name() == symbolic_name
                && inner.manifest.version() == version
            {
                return true;
            }
        }
        false
    }
}

impl Default for BundleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
