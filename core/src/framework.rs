//! The framework root object: wires together the bundle
//! registry, service registry, DCR and event admin into the single
//! surface a host embeds.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use forge_async::BoundedTaskPool;

use crate::bundle::{
    BundleHandle, BundleId, BundleRegistry, BundleSnapshot, BundleSource, BundleState,
    LifecycleController,
};
use crate::config::FrameworkConfig;
use crate::context::BundleContextImpl;
use crate::dcr::{ConfigurationAdmin, MemoryConfigurationAdmin, Runtime as DcrRuntime};
use crate::error::{Error, Result};
use crate::event::EventAdmin;
use crate::service::Registry as ServiceRegistry;

static START_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Monotonic counter standing in for a wall-clock start timestamp
///: all that matters is relative order,
/// used by [`Framework::shutdown`] to stop bundles newest-first.
pub(crate) fn next_start_sequence() -> u64 {
    START_SEQUENCE.fetch_add(1, Ordering::SeqCst)
}

pub struct Framework {
    bundles: Arc<BundleRegistry>,
    services: Arc<ServiceRegistry>,
    lifecycle: LifecycleController,
    dcr: Arc<DcrRuntime>,
    events: Arc<EventAdmin>,
    config_admin: Arc<dyn ConfigurationAdmin>,
    worker_pool: Arc<BoundedTaskPool>,
}

impl Framework {
    pub fn new(config: &FrameworkConfig) -> Arc<Self> {
        let bundles = Arc::new(BundleRegistry::new());
        let services = ServiceRegistry::new();
        let config_admin: Arc<dyn ConfigurationAdmin> = MemoryConfigurationAdmin::new();
        let dcr = DcrRuntime::new(services.clone(), config_admin.clone());

        let pool_size = std::num::NonZeroUsize::new(config.worker.pool_size)
            .unwrap_or_else(forge_async::available_parallelism);
        let worker_pool = Arc::new(BoundedTaskPool::new(pool_size));
        let events = EventAdmin::new(services.clone(), worker_pool.clone());
        let lifecycle = LifecycleController::new(bundles.clone(), services.clone());

        Arc::new(Self {
            bundles,
            services,
            lifecycle,
            dcr,
            events,
            config_admin,
            worker_pool,
        })
    }

    pub fn services(&self) -> &Arc<ServiceRegistry> {
        &self.services
    }

    pub fn events(&self) -> &Arc<EventAdmin> {
        &self.events
    }

    pub fn config_admin(&self) -> &Arc<dyn ConfigurationAdmin> {
        &self.config_admin
    }

    pub fn dcr(&self) -> &Arc<DcrRuntime> {
        &self.dcr
    }

    pub fn worker_pool(&self) -> &Arc<BoundedTaskPool> {
        &self.worker_pool
    }

    pub fn install(
        &self,
        location: impl Into<String>,
        manifest: forge_abi::Manifest,
        source: BundleSource,
    ) -> Result<BundleId> {
        self.lifecycle.install(location.into(), manifest, source)
    }

    /// Starts a bundle, then declares (and attempts to activate) any
    /// components its manifest describes.
    pub async fn start(&self, id: BundleId) -> Result<()> {
        let services = self.services.clone();
        let dcr = self.dcr.clone();
        self.lifecycle
            .start(id, |bundle_id| BundleContextImpl::new(bundle_id, services).with_dcr(dcr))
            .await?;

        let handle = self
            .bundles
            .get(id)
            .ok_or_else(|| Error::IllegalState(format!("no such bundle {id}")))?;
        let manifest = handle.manifest().await;
        let components = manifest.component_descriptions()?;
        if !components.is_empty() {
            self.dcr.register_bundle(id, components)?;
        }
        Ok(())
    }

    /// Withdraws a bundle's declared components before stopping its
    /// activator, so a component never outlives the bundle that defined
    /// it.
    pub async fn stop(&self, id: BundleId) -> Result<()> {
        self.dcr.unregister_bundle(id);
        let services = self.services.clone();
        let dcr = self.dcr.clone();
        self.lifecycle
            .stop(id, |bundle_id| BundleContextImpl::new(bundle_id, services).with_dcr(dcr))
            .await
    }

    pub async fn uninstall(&self, id: BundleId) -> Result<()> {
        self.lifecycle.uninstall(id).await
    }

    pub async fn bundle(&self, id: BundleId) -> Option<BundleSnapshot> {
        let handle = self.bundles.get(id)?;
        Some(handle.snapshot().await)
    }

    pub fn bundles(&self) -> Vec<Arc<BundleHandle>> {
        self.bundles.bundles()
    }

    /// Stops every active bundle newest-first, then drains the worker
    /// pool.
    pub async fn shutdown(&self) {
        let mut snapshots = Vec::with_capacity(self.bundles.bundles().len());
        for handle in self.bundles.bundles() {
            snapshots.push(handle.snapshot().await);
        }
        snapshots.sort_by(|a, b| b.start_timestamp.cmp(&a.start_timestamp));

        for snapshot in snapshots {
            if snapshot.state == BundleState::Active {
                if let Err(e) = self.stop(snapshot.id).await {
                    tracing::warn!(bundle_id = snapshot.id, error = %e, "error stopping bundle during shutdown");
                }
            }
        }

        self.worker_pool.shutdown().await;
    }
}
