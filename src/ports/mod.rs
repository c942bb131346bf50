//! Ports - interfaces the application layer depends on.
//!
//! Adapters implement these traits; handlers only see the traits.

mod auth_provider;
mod deal_reader;
mod deal_repository;
mod event_publisher;
mod event_subscriber;
mod file_gate;
mod notifier;

pub use auth_provider::AuthProvider;
pub use deal_reader::DealReader;
pub use deal_repository::DealRepository;
pub use event_publisher::EventPublisher;
pub use event_subscriber::{EventHandler, EventSubscriber};
pub use file_gate::{FileCategory, FileGate};
pub use notifier::{DealNotification, Notifier};
