pub mod peers;
pub mod store;

pub use peers::*;
pub use store::*;
