//! Application use cases / business logic

pub mod publish;

pub use publish::PublishOrchestrator;
