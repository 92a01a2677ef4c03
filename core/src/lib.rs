//! forge-core: bundle lifecycle, service registry, declarative component
//! runtime and event admin.
//!
//! Bundle authors implement [`forge_abi::Activator`] against the erased
//! ABI boundary in `forge-abi`; this crate is the host-side engine that
//! loads, wires, and tears them down.

pub mod bundle;
pub mod config;
mod context;
pub mod dcr;
pub mod error;
pub mod event;
mod framework;
pub mod service;

pub use error::{Error, Result};
pub use framework::Framework;

pub use forge_abi;
pub use forge_async;
