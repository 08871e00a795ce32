//! # elif-duplicate: Model Duplication for elif.rs
//!
//! Persists a copy of a record together with the records attached to it.
//! Child relations (has-one, has-many) are cloned under the new root and
//! many-to-many relations are re-attached through their pivot tables, with
//! configurable excluded and unique columns at both levels. One duplication
//! is one store transaction.
//!
//! ```ignore
//! let duplicator = Duplicator::new(MemoryStore::new());
//! let options = DuplicateOptions::new()
//!     .unique_columns(["title"])
//!     .exclude_relations(["reviews"]);
//! let copy = duplicator.save_as_duplicate(&post_model, &post, &options).await?;
//! ```

pub mod config;
pub mod duplicator;
pub mod error;
pub mod events;
pub mod memory;
pub mod model;
pub mod observers;
pub mod options;
pub mod pivot;
pub mod record;
pub mod relationships;
pub mod store;
pub mod transaction;
pub mod unique;
pub mod value;

#[cfg(feature = "postgres")]
pub mod postgres;

// Re-export core traits and types
pub use config::*;
pub use duplicator::*;
pub use error::*;
pub use events::*;
pub use memory::*;
pub use model::*;
pub use observers::*;
pub use options::*;
pub use pivot::*;
pub use record::*;
pub use relationships::*;
pub use store::*;
pub use transaction::*;
pub use unique::*;
pub use value::*;

#[cfg(feature = "postgres")]
pub use postgres::*;
