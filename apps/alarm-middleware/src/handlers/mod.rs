//! Handlers 模块

pub mod commands;
pub mod devices;
pub mod events;
pub mod health;
pub mod metrics;

pub use commands::*;
pub use devices::*;
pub use events::*;
pub use health::*;
pub use metrics::*;
