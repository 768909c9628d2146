//! Common utilities and types shared across gavel

pub mod config;
pub mod error;
pub mod utils;

pub use config::{AuctionConfig, NodeConfig, TimerStart};
pub use error::{Error, Result};
pub use utils::{Endpoint, NodeId};
pub(crate) use utils::lock;
