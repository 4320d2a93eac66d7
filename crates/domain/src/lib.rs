//! crosspost domain crate
//!
//! This crate contains the core publishing engine following hexagonal architecture:
//! - `model`: Domain entities and value objects
//! - `media`: Media classification from location patterns
//! - `capability`: Per-platform capability table and plan selection
//! - `ports`: Trait definitions for external dependencies (adapters)
//! - `usecases`: Application use cases / business logic

pub mod capability;
pub mod media;
pub mod model;
pub mod ports;
pub mod usecases;

pub use capability::*;
pub use model::*;
pub use ports::*;
