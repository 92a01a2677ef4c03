//! Installs and starts every bundle found in the configured storage
//! directory at boot.

use std::sync::Arc;

use forge_abi::archive::{BundleArchive, DirArchive};
use forge_core::bundle::BundleSource;
use forge_core::Framework;
use tracing::{info, warn};

pub async fn install_from_directory(
    framework: &Arc<Framework>,
    root: &std::path::Path,
) -> anyhow::Result<()> {
    if !root.exists() {
        info!(path = %root.display(), "bundle directory does not exist yet, nothing to load");
        return Ok(());
    }

    let archive = DirArchive::new(root);
    let names = archive.list_bundles()?;
    if names.is_empty() {
        info!(path = %root.display(), "no bundles found");
        return Ok(());
    }

    for name in names {
        if let Err(e) = install_one(framework, &archive, &name).await {
            warn!(bundle = %name, error = %e, "failed to install bundle");
        }
    }
    Ok(())
}

async fn install_one(
    framework: &Arc<Framework>,
    archive: &DirArchive,
    name: &str,
) -> anyhow::Result<()> {
    let manifest = archive.get_manifest(name)?;
    let location = format!("dir:{name}");

    let source = if manifest.has_activator() {
        BundleSource::Library(archive.library_path(name)?)
    } else {
        // A bundle with no activator is purely declarative (components
        // only); give it a no-op activator so the lifecycle controller
        // still has something to start/stop.
        BundleSource::InProcess(Arc::new(|| {
            Box::new(forge_core::bundle::NoopActivator) as Box<dyn forge_abi::Activator>
        }))
    };

    let id = framework.install(location, manifest, source)?;
    framework.start(id).await?;
    info!(bundle = %name, bundle_id = id, "installed and started bundle");
    Ok(())
}
