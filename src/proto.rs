//! Wire messages for the `auction` gRPC package and the generated stubs.
//!
//! Field numbers follow the deployed `auction.proto` so that
//! existing clients keep working.

use crate::node::auction::{AuctionResult, Bid};
use crate::Error;

#[derive(Clone, PartialEq, prost::Message)]
pub struct BidRequest {
    #[prost(int32, tag = "1")]
    pub id: i32,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(int64, tag = "3")]
    pub amount: i64,
}

#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct BidResponse {}

#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct ResultRequest {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ResultResponse {
    #[prost(oneof = "result_response::Event", tags = "1, 2")]
    pub event: Option<result_response::Event>,
}

pub mod result_response {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Event {
        #[prost(message, tag = "1")]
        Status(StatusMessage),
        #[prost(message, tag = "2")]
        Winner(WinnerMessage),
    }

    #[derive(Clone, Copy, PartialEq, prost::Message)]
    pub struct StatusMessage {
        #[prost(int64, tag = "1")]
        pub time: i64,
        #[prost(int64, tag = "2")]
        pub highest_bid: i64,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct WinnerMessage {
        #[prost(string, tag = "1")]
        pub name: String,
        #[prost(int64, tag = "2")]
        pub amount: i64,
    }
}

#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct ElectionMessage {}

#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct CoordinatorMessage {
    #[prost(int32, tag = "1")]
    pub port: i32,
}

/// Empty acknowledgement
#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct Response {}

include!(concat!(env!("OUT_DIR"), "/auction.Auction.rs"));
include!(concat!(env!("OUT_DIR"), "/auction.Election.rs"));

impl From<&Bid> for BidRequest {
    fn from(bid: &Bid) -> Self {
        Self {
            id: bid.bidder_id,
            name: bid.bidder_name.clone(),
            amount: bid.amount,
        }
    }
}

impl From<BidRequest> for Bid {
    fn from(req: BidRequest) -> Self {
        Bid {
            bidder_id: req.id,
            bidder_name: req.name,
            amount: req.amount,
        }
    }
}

impl From<AuctionResult> for ResultResponse {
    fn from(result: AuctionResult) -> Self {
        let event = match result {
            AuctionResult::Status {
                remaining_time,
                highest_bid,
            } => result_response::Event::Status(result_response::StatusMessage {
                time: remaining_time,
                highest_bid,
            }),
            AuctionResult::Winner { name, amount } => {
                result_response::Event::Winner(result_response::WinnerMessage { name, amount })
            }
        };
        Self { event: Some(event) }
    }
}

impl TryFrom<ResultResponse> for AuctionResult {
    type Error = Error;

    fn try_from(resp: ResultResponse) -> crate::Result<Self> {
        match resp.event {
            Some(result_response::Event::Status(status)) => Ok(AuctionResult::Status {
                remaining_time: status.time,
                highest_bid: status.highest_bid,
            }),
            Some(result_response::Event::Winner(winner)) => Ok(AuctionResult::Winner {
                name: winner.name,
                amount: winner.amount,
            }),
            None => Err(Error::Internal("result response without event".into())),
        }
    }
}
