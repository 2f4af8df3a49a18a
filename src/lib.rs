//! Folio application library
//!
//! The books module and its record query facade, plus the bootstrap that
//! wires them to a document store.

pub mod app;
pub mod modules;
pub mod utils;

pub use app::App;
/// Re-export commonly used types
pub use modules::*;
