//! Notification backends.

pub mod memory;

pub use memory::{InMemoryNotifier, NotificationMessage};
