pub mod broadcast;
pub mod causal;
pub mod common;
pub mod network;
pub mod total;

pub use common::{Error, Result};
