//! Event plumbing shared by the shop modules: the event contract, the stream
//! envelope, the pub/sub bus abstraction and an in-process bus.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod execute;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use execute::execute;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
