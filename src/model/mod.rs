pub mod config;
pub mod id;
pub mod task;

pub use config::*;
pub use task::*;
