//! Scope directory backends.

pub mod memory;

pub use memory::InMemoryScopeDirectory;
