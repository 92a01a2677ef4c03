//! Bundle archive read interface.
//!
//! The archive format itself is an external collaborator the framework
//! does not own; only this read-only interface is consumed.
//! [`DirArchive`] is a reference implementation good enough to exercise
//! the rest of the stack in tests and in `forge-server`: one
//! subdirectory per contained bundle, a `manifest.json` document, and
//! loose resource files addressable by relative path.

use crate::error::{Error, Result};
use crate::manifest::Manifest;

/// Enumerates embedded manifests and resource blobs from an archive file.
pub trait BundleArchive: Send + Sync {
    /// Names of the bundles contained in this archive.
    fn list_bundles(&self) -> Result<Vec<String>>;

    /// The parsed manifest of a named bundle.
    fn get_manifest(&self, name: &str) -> Result<Manifest>;

    /// Opens a named resource blob belonging to a named bundle.
    fn open_resource(&self, name: &str, path: &str) -> Result<Vec<u8>>;

    /// Path to the bundle's shared library, if any (used by [`crate::loader`]).
    fn library_path(&self, name: &str) -> Result<std::path::PathBuf>;
}

/// A directory-backed archive: `root/<bundle-name>/manifest.json` plus
/// arbitrary resource files under `root/<bundle-name>/`.
#[cfg(feature = "host")]
pub struct DirArchive {
    root: std::path::PathBuf,
}

#[cfg(feature = "host")]
impl DirArchive {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn bundle_dir(&self, name: &str) -> std::path::PathBuf {
        self.root.join(name)
    }
}

#[cfg(feature = "host")]
impl BundleArchive for DirArchive {
    fn list_bundles(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_owned());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn get_manifest(&self, name: &str) -> Result<Manifest> {
        let path = self.bundle_dir(name).join("manifest.json");
        if !path.exists() {
            return Err(Error::NoSuchBundle(name.to_owned()));
        }
        let raw = std::fs::read_to_string(&path)?;
        let document: serde_json::Value =
            serde_json::from_str(&raw).map_err(|_| Error::ManifestParse("<root>"))?;
        Manifest::parse(&document)
    }

    fn open_resource(&self, name: &str, path: &str) -> Result<Vec<u8>> {
        let full = self.bundle_dir(name).join(path);
        std::fs::read(&full).map_err(|_| Error::NoSuchResource(path.to_owned()))
    }

    fn library_path(&self, name: &str) -> Result<std::path::PathBuf> {
        let dir = self.bundle_dir(name);
        for candidate in ["lib.so", "lib.dylib", "lib.dll"] {
            let path = dir.join(candidate);
            if path.exists() {
                return Ok(path);
            }
        }
        Err(Error::NoSuchResource("<library>".to_owned()))
    }
}
