use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Framework-wide error kinds. Most subsystems define their
/// own narrower error enum; this one is
/// returned from [`crate::framework::Framework`]'s top-level operations,
/// which may surface any of them.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    ManifestParse(#[from] forge_abi::Error),

    #[error("failed to load bundle library for {symbolic_name}: {source}")]
    LibraryLoad {
        symbolic_name: String,
        #[source]
        source: forge_abi::Error,
    },

    #[error("bundle activation failed for {symbolic_name}: {reason}")]
    BundleActivation { symbolic_name: String, reason: String },

    #[error("component activation failed for {component}: {reason}")]
    ComponentActivation { component: String, reason: String },

    #[error("circular reference detected among components: {0:?}")]
    CircularReference(Vec<String>),

    #[error("illegal state: {0}")]
    IllegalState(String),
}
