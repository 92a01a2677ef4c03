use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised at the bundle/archive/loader boundary.
#[derive(Debug, Error)]
pub enum Error {
    #[error("manifest is not a mapping, or is missing required header {0}")]
    ManifestParse(&'static str),

    #[error("no bundle named {0} in archive")]
    NoSuchBundle(String),

    #[error("no resource at path {0}")]
    NoSuchResource(String),

    #[error("failed to load bundle library: {0}")]
    LibraryLoad(String),

    #[error("bundle library does not export the activator symbol")]
    MissingActivatorSymbol,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
