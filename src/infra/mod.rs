//! Infrastructure adapters for task stores, notifications, and scope lookups.

pub mod notifier;
pub mod scope;
pub mod store;

pub use notifier::InMemoryNotifier;
pub use scope::InMemoryScopeDirectory;
pub use store::{InMemoryTaskStore, JsonlTaskStore};
