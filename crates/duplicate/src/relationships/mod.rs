//! Relationships Module - relation metadata, registry and classification

pub mod classifier;
pub mod metadata;
pub mod registry;

pub use classifier::*;
pub use metadata::*;
pub use registry::*;
