//! Bundle lifecycle controller.

use std::sync::Arc;

use super::registry::{ActiveActivator, BundleSource};
use super::{BundleId, BundleRegistry, BundleState};
use crate::context::BundleContextImpl;
use crate::error::{Error, Result};
use crate::service::Registry as ServiceRegistry;

/// Options accepted by `start`/`stop`. Empty today; kept
/// as a struct (rather than nothing) so the public API can grow
/// transient/lazy-activation style flags without breaking callers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Options;

/// Drives bundles through install → resolved → starting → active →
/// stopping → uninstalled. Owns no state of its own: the
/// bundle registry's per-bundle mutex *is* the serialization point.
pub struct LifecycleController {
    bundles: Arc<BundleRegistry>,
    services: Arc<ServiceRegistry>,
}

impl LifecycleController {
    pub fn new(bundles: Arc<BundleRegistry>, services: Arc<ServiceRegistry>) -> Self {
        Self { bundles, services }
    }

    pub fn install(
        &self,
        location: String,
        manifest: forge_abi::Manifest,
        source: BundleSource,
    ) -> Result<BundleId> {
        let handle = self.bundles.install(location, manifest, source)?;
        Ok(handle.id)
    }

    /// `installed → resolved`: loading happens lazily on `start`, so this
    /// only validates the manifest is well-formed, which `install`
    /// already did. Exposed separately so `start` can call it
    /// idempotently.
    async fn resolve(&self, id: BundleId) -> Result<()> {
        let handle = self
            .bundles
            .get(id)
            .ok_or_else(|| Error::IllegalState(format!("no such bundle {id}")))?;
        let mut inner = handle.inner.lock().await;
        match inner.state {
            BundleState::Installed => {
                inner.state = BundleState::Resolved;
                tracing::debug!(bundle_id = id, "resolved bundle");
                Ok(())
            }
            BundleState::Resolved | BundleState::Active => Ok(()),
            other => Err(Error::IllegalState(format!(
                "cannot resolve bundle {id} in state {other}"
            ))),
        }
    }

    /// `resolved → starting → active`. Loads the shared
    /// library (or resolves the in-process factory), invokes `start`,
    /// and reverts to `resolved` on activator failure.
    pub async fn start(
        &self,
        id: BundleId,
        context_factory: impl FnOnce(BundleId) -> BundleContextImpl,
    ) -> Result<()> {
        self.resolve(id).await?;

        let handle = self
            .bundles
            .get(id)
            .ok_or_else(|| Error::IllegalState(format!("no such bundle {id}")))?;

        let (symbolic_name, version) = {
            let inner = handle.inner.lock().await;
            (
                inner.manifest.symbolic_name().to_owned(),
                inner.manifest.version().to_owned(),
            )
        };

        if self
            .bundles
            .is_name_version_active(&symbolic_name, &version, id)
            .await
        {
            return Err(Error::InvalidArgument(format!(
                "another active bundle already provides {symbolic_name} {version}"
            )));
        }

        let mut inner = handle.inner.lock().await;
        match inner.state {
            BundleState::Active => return Ok(()),
            BundleState::Resolved => {}
            other => {
                return Err(Error::IllegalState(format!(
                    "cannot start bundle {id} in state {other}"
                )));
            }
        }

        inner.state = BundleState::Starting;

        let mut activator = match &inner.source {
            BundleSource::Library(path) => {
                let loaded = unsafe { forge_abi::loader::load(path) }.map_err(|source| {
                    Error::LibraryLoad {
                        symbolic_name: symbolic_name.clone(),
                        source,
                    }
                })?;
                ActiveActivator::Library(loaded)
            }
            BundleSource::InProcess(factory) => ActiveActivator::InProcess(factory()),
        };

        let context = context_factory(id);
        let start_result = activator.as_mut().start(&context);

        match start_result {
            Ok(()) => {
                inner.activator = Some(activator);
                inner.state = BundleState::Active;
                inner.start_timestamp = Some(crate::framework::next_start_sequence());
                tracing::info!(bundle_id = id, "started bundle");
                Ok(())
            }
            Err(e) => {
                inner.state = BundleState::Resolved;
                tracing::error!(bundle_id = id, error = %e, "bundle activation failed");
                Err(Error::BundleActivation {
                    symbolic_name,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// `active → stopping → resolved`. Withdraws every
    /// service this bundle registered regardless of whether the
    /// activator's `stop` succeeds.
    pub async fn stop(
        &self,
        id: BundleId,
        context_factory: impl FnOnce(BundleId) -> BundleContextImpl,
    ) -> Result<()> {
        let handle = self
            .bundles
            .get(id)
            .ok_or_else(|| Error::IllegalState(format!("no such bundle {id}")))?;

        let mut inner = handle.inner.lock().await;
        match inner.state {
            BundleState::Resolved | BundleState::Installed => return Ok(()),
            BundleState::Active => {}
            other => {
                return Err(Error::IllegalState(format!(
                    "cannot stop bundle {id} in state {other}"
                )));
            }
        }

        inner.state = BundleState::Stopping;

        let stop_result = if let Some(mut activator) = inner.activator.take() {
            let context = context_factory(id);
            let result = activator.as_mut().stop(&context);
            drop(activator);
            result
        } else {
            Ok(())
        };

        inner.state = BundleState::Resolved;
        inner.start_timestamp = None;
        drop(inner);

        // Withdraw every service this bundle registered and release
        // every borrow held on its behalf, unconditionally.
        self.services.unregister_all_for_bundle(id).await;

        match stop_result {
            Ok(()) => {
                tracing::info!(bundle_id = id, "stopped bundle");
                Ok(())
            }
            Err(e) => {
                tracing::error!(bundle_id = id, error = %e, "activator stop failed");
                Err(Error::BundleActivation {
                    symbolic_name: handle.inner.lock().await.manifest.symbolic_name().to_owned(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// `resolved | installed → uninstalled`.
    pub async fn uninstall(&self, id: BundleId) -> Result<()> {
        let handle = self
            .bundles
            .get(id)
            .ok_or_else(|| Error::IllegalState(format!("no such bundle {id}")))?;

        let state = handle.state().await;
        if state == BundleState::Active || state == BundleState::Starting || state == BundleState::Stopping {
            return Err(Error::IllegalState(format!(
                "cannot uninstall bundle {id} while in state {state}; stop it first"
            )));
        }

        self.bundles.remove(id)
    }
}
