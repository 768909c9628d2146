//! Auction state owned by one replica
//!
//! All fields live behind a single mutex: bids compare-and-set the highest
//! bid, the timer decrements the remaining time, and readers see the three
//! fields of a result from the same instant.

use crate::common::{lock, AuctionConfig, Result};
use crate::Error;
use serde::Serialize;
use std::sync::Mutex;
use tokio::sync::watch;

/// A bid as received from a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bid {
    pub bidder_id: i32,
    pub bidder_name: String,
    pub amount: i64,
}

impl Bid {
    pub fn new(bidder_id: i32, bidder_name: impl Into<String>, amount: i64) -> Self {
        Self {
            bidder_id,
            bidder_name: bidder_name.into(),
            amount,
        }
    }
}

/// What a replica answers to a result query
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum AuctionResult {
    /// Auction still running
    Status { remaining_time: i64, highest_bid: i64 },
    /// Auction over
    Winner { name: String, amount: i64 },
}

impl std::fmt::Display for AuctionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuctionResult::Status {
                remaining_time,
                highest_bid,
            } => write!(
                f,
                "The highest bid is {highest_bid}. There are {remaining_time} seconds left of the auction."
            ),
            AuctionResult::Winner { name, amount } => write!(
                f,
                "The auction is over. The winning bid is {amount} by {name}"
            ),
        }
    }
}

#[derive(Debug)]
struct Ledger {
    highest_bid: i64,
    highest_bidder: Option<(i32, String)>,
    remaining: i64,
    done: bool,
    accepted: u64,
}

#[derive(Debug)]
pub struct AuctionState {
    ledger: Mutex<Ledger>,
    first_bid: watch::Sender<bool>,
}

impl AuctionState {
    pub fn new(config: &AuctionConfig) -> Self {
        let (first_bid, _) = watch::channel(false);
        Self {
            ledger: Mutex::new(Ledger {
                highest_bid: config.starting_bid,
                highest_bidder: None,
                remaining: config.duration_secs.max(0),
                done: config.duration_secs <= 0,
                accepted: 0,
            }),
            first_bid,
        }
    }

    /// Accept `bid` if the auction is open, the bidder is not already
    /// leading, and the amount beats the current highest bid.
    pub fn place_bid(&self, bid: &Bid) -> Result<()> {
        let mut ledger = lock(&self.ledger);

        if ledger.done {
            return Err(Error::AuctionClosed);
        }
        if matches!(&ledger.highest_bidder, Some((id, _)) if *id == bid.bidder_id) {
            return Err(Error::SelfRaiseRejected);
        }
        if bid.amount <= ledger.highest_bid {
            return Err(Error::BidTooLow {
                amount: bid.amount,
                highest: ledger.highest_bid,
            });
        }

        ledger.highest_bid = bid.amount;
        ledger.highest_bidder = Some((bid.bidder_id, bid.bidder_name.clone()));
        ledger.accepted += 1;
        drop(ledger);

        self.first_bid.send_replace(true);
        Ok(())
    }

    pub fn current_result(&self) -> AuctionResult {
        let ledger = lock(&self.ledger);
        if ledger.done {
            AuctionResult::Winner {
                name: ledger
                    .highest_bidder
                    .as_ref()
                    .map(|(_, name)| name.clone())
                    .unwrap_or_default(),
                amount: ledger.highest_bid,
            }
        } else {
            AuctionResult::Status {
                remaining_time: ledger.remaining,
                highest_bid: ledger.highest_bid,
            }
        }
    }

    /// Advance the countdown by one tick. Returns `false` once the auction is
    /// over; the tick that reaches zero closes it.
    pub fn tick(&self) -> bool {
        let mut ledger = lock(&self.ledger);
        if ledger.done {
            return false;
        }
        if ledger.remaining > 0 {
            ledger.remaining -= 1;
        }
        if ledger.remaining == 0 {
            ledger.done = true;
            tracing::info!(highest_bid = ledger.highest_bid, "auction closed");
            return false;
        }
        true
    }

    pub fn is_done(&self) -> bool {
        lock(&self.ledger).done
    }

    pub fn highest_bid(&self) -> i64 {
        lock(&self.ledger).highest_bid
    }

    /// Number of accepted bids
    pub fn accepted_bids(&self) -> u64 {
        lock(&self.ledger).accepted
    }

    /// Resolves once at least one bid has been accepted
    pub async fn wait_for_first_bid(&self) {
        let mut rx = self.first_bid.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|opened| *opened).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn auction(starting_bid: i64, duration_secs: i64) -> AuctionState {
        AuctionState::new(&AuctionConfig {
            starting_bid,
            duration_secs,
            ..Default::default()
        })
    }

    #[test]
    fn bidding_sequence() {
        let auction = auction(50, 120);

        auction.place_bid(&Bid::new(1, "alice", 60)).unwrap();
        assert_eq!(auction.highest_bid(), 60);

        let err = auction.place_bid(&Bid::new(1, "alice", 70)).unwrap_err();
        assert!(matches!(err, Error::SelfRaiseRejected));

        let err = auction.place_bid(&Bid::new(2, "bob", 55)).unwrap_err();
        assert!(matches!(err, Error::BidTooLow { amount: 55, highest: 60 }));

        let err = auction.place_bid(&Bid::new(2, "bob", 60)).unwrap_err();
        assert!(matches!(err, Error::BidTooLow { highest: 60, .. }));

        auction.place_bid(&Bid::new(2, "bob", 61)).unwrap();
        assert_eq!(auction.highest_bid(), 61);
        assert_eq!(auction.accepted_bids(), 2);
    }

    #[test]
    fn bidder_zero_may_open() {
        let auction = auction(50, 120);
        auction.place_bid(&Bid::new(0, "zero", 51)).unwrap();
    }

    #[test]
    fn closed_auction_rejects_everything() {
        let auction = auction(50, 1);
        auction.place_bid(&Bid::new(1, "alice", 60)).unwrap();
        assert!(!auction.tick());
        assert!(auction.is_done());

        for amount in [0, 61, i64::MAX] {
            let err = auction.place_bid(&Bid::new(2, "bob", amount)).unwrap_err();
            assert!(matches!(err, Error::AuctionClosed));
        }
        assert_eq!(
            auction.current_result(),
            AuctionResult::Winner {
                name: "alice".into(),
                amount: 60
            }
        );
    }

    #[test]
    fn result_reports_status_while_running() {
        let auction = auction(50, 3);
        assert!(auction.tick());
        assert_eq!(
            auction.current_result(),
            AuctionResult::Status {
                remaining_time: 2,
                highest_bid: 50
            }
        );
        assert!(auction.tick());
        assert!(!auction.tick());
        assert!(!auction.tick());
        assert!(auction.is_done());
    }

    #[test]
    fn winner_without_bids_has_empty_name() {
        let auction = auction(50, 1);
        auction.tick();
        assert_eq!(
            auction.current_result(),
            AuctionResult::Winner {
                name: String::new(),
                amount: 50
            }
        );
    }

    #[test]
    fn concurrent_bids_never_lose_updates() {
        let auction = Arc::new(auction(0, 120));
        let handles: Vec<_> = (1..=8)
            .map(|bidder| {
                let auction = auction.clone();
                std::thread::spawn(move || {
                    let mut accepted = Vec::new();
                    for step in 0..200 {
                        let amount = step * 8 + bidder as i64;
                        if auction.place_bid(&Bid::new(bidder, "b", amount)).is_ok() {
                            accepted.push(amount);
                        }
                    }
                    accepted
                })
            })
            .collect();

        let mut max_accepted = 0;
        for handle in handles {
            let accepted = handle.join().unwrap();
            assert!(accepted.windows(2).all(|w| w[0] < w[1]));
            max_accepted = max_accepted.max(accepted.last().copied().unwrap_or(0));
        }
        assert_eq!(auction.highest_bid(), max_accepted);
    }

    #[tokio::test]
    async fn first_bid_wakes_waiters() {
        let auction = Arc::new(auction(50, 120));
        let waiter = {
            let auction = auction.clone();
            tokio::spawn(async move { auction.wait_for_first_bid().await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        auction.place_bid(&Bid::new(1, "alice", 60)).unwrap();
        waiter.await.unwrap();

        // Already opened: returns at once
        auction.wait_for_first_bid().await;
    }
}
