pub mod clock;
pub mod holdback;
pub mod message;
pub mod processor;
pub mod replica;

pub use clock::*;
pub use holdback::*;
pub use message::*;
pub use processor::*;
pub use replica::*;
