//! Document store seam for folio.
//!
//! [`DocumentStore`] is the single collection contract the book facade is
//! written against. [`MongoStore`] talks to a MongoDB deployment through the
//! official driver; [`MemoryStore`] evaluates the same requests in process.

pub mod error;
pub mod memory;
pub mod mongo;
pub mod options;
pub mod store;

pub use error::{DbError, Result};
pub use memory::MemoryStore;
pub use mongo::{MongoConfig, MongoStore};
pub use options::{FindSpec, IndexSpec, SortDirection};
pub use store::DocumentStore;
