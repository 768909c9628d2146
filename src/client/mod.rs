//! Client side of the auction
//!
//! - [`session`]: a bidder talking to one replica at a time, with fail-over
//! - [`aggregator`]: majority read over all replicas

pub mod aggregator;
pub mod session;

pub use aggregator::{tally, ResultAggregator, Verdict};
pub use session::{BidderSession, RetryPolicy};
