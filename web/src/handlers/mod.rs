//! HTTP request handlers.

pub mod events;
pub mod health;
pub mod interactions;
pub mod registration;

pub use events::delete_event;
pub use health::health_check;
pub use interactions::{list_interactions, most_registered};
pub use registration::{register, unregister};
