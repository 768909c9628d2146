//! Auction countdown
use crate::common::TimerStart;
use crate::node::auction::AuctionState;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub struct AuctionTimer {
    auction: Arc<AuctionState>,
    tick: Duration,
    start: TimerStart,
}

impl AuctionTimer {
    pub fn new(auction: Arc<AuctionState>, tick: Duration, start: TimerStart) -> Self {
        Self {
            auction,
            tick,
            start,
        }
    }

    /// Count down to zero, then close the auction. Runs to completion once
    /// started.
    pub async fn run(self) {
        if self.start == TimerStart::FirstBid {
            tracing::info!("Auction timer waiting for the first bid");
            self.auction.wait_for_first_bid().await;
        }

        tracing::info!("Auction timer started");
        while !self.auction.is_done() {
            tokio::time::sleep(self.tick).await;
            if !self.auction.tick() {
                break;
            }
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::AuctionConfig;
    use crate::node::auction::{AuctionResult, Bid};

    fn auction(duration_secs: i64) -> Arc<AuctionState> {
        Arc::new(AuctionState::new(&AuctionConfig {
            duration_secs,
            ..Default::default()
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn boot_timer_closes_the_auction() {
        let auction = auction(3);
        let timer = AuctionTimer::new(auction.clone(), Duration::from_secs(1), TimerStart::Boot);
        let handle = timer.spawn();

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(
            auction.current_result(),
            AuctionResult::Status {
                remaining_time: 2,
                highest_bid: 50
            }
        );

        handle.await.unwrap();
        assert!(auction.is_done());
    }

    #[tokio::test(start_paused = true)]
    async fn first_bid_timer_waits_for_activity() {
        let auction = auction(2);
        let timer = AuctionTimer::new(
            auction.clone(),
            Duration::from_secs(1),
            TimerStart::FirstBid,
        );
        let handle = timer.spawn();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!auction.is_done());
        assert!(!handle.is_finished());

        auction.place_bid(&Bid::new(1, "alice", 60)).unwrap();
        handle.await.unwrap();
        assert_eq!(
            auction.current_result(),
            AuctionResult::Winner {
                name: "alice".into(),
                amount: 60
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn zero_length_auction_is_closed_from_the_start() {
        let auction = auction(0);
        assert!(auction.is_done());
        AuctionTimer::new(auction.clone(), Duration::from_secs(1), TimerStart::Boot)
            .run()
            .await;
        assert!(auction.is_done());
    }
}
