//! Infrastructure layer: event storage, command dispatch, read models and
//! the shop workflows built on them.

pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod services;
pub mod workflows;

pub use services::ShopServices;
pub use workflows::WorkflowError;
