//! Service layer module.
//!
//! Wires repositories, the acquisition lifecycle, the scheduler and the
//! configuration service together and owns their lifecycle.

pub mod container;
pub mod legacy;

pub use container::{ServiceContainer, ServiceContainerConfig};
pub use legacy::import_legacy_config;
