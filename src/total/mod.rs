pub mod acks;
pub mod message;
pub mod processor;
pub mod queue;
pub mod replica;

pub use acks::*;
pub use message::*;
pub use processor::*;
pub use queue::*;
pub use replica::*;
