pub mod client;
pub mod gateway;
#[cfg(test)]
pub(crate) mod mock;
pub mod prompts;
pub mod schemas;
pub mod validation;

pub use client::*;
pub use gateway::*;
pub use prompts::*;
pub use validation::*;
