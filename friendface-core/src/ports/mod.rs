//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The sync pipeline
//! depends only on these traits, not on concrete implementations.

mod profile_source;
mod repository;

pub use profile_source::ProfileSource;
pub use repository::UserStore;
