//! Majority read over replicas
//!
//! Replicas answer result queries from local state, so they can disagree
//! while an election settles. The aggregator asks all of them and keeps the
//! answer given most often, refusing to pick between tied answers.

use crate::node::auction::AuctionResult;
use crate::peer::{with_timeout, PeerHandle};
use futures_util::future::join_all;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Strictly more replicas gave this answer than any other
    Agreed(AuctionResult),
    /// The two most common answers are tied
    Mismatched,
    /// No replica answered
    NoResponse,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Agreed(result) => write!(f, "{result}"),
            Verdict::Mismatched => write!(f, "mismatched replicas"),
            Verdict::NoResponse => write!(f, "no response"),
        }
    }
}

/// Resolve a set of answers; `None` entries are failed calls.
pub fn tally<I>(responses: I) -> Verdict
where
    I: IntoIterator<Item = Option<AuctionResult>>,
{
    let mut counts: HashMap<AuctionResult, usize> = HashMap::new();
    for response in responses.into_iter().flatten() {
        *counts.entry(response).or_default() += 1;
    }

    let mut ranked: Vec<_> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    let mut ranked = ranked.into_iter();
    match (ranked.next(), ranked.next()) {
        (None, _) => Verdict::NoResponse,
        (Some((result, _)), None) => Verdict::Agreed(result),
        (Some((result, top)), Some((_, second))) if top > second => Verdict::Agreed(result),
        _ => Verdict::Mismatched,
    }
}

pub struct ResultAggregator {
    replicas: Vec<PeerHandle>,
    timeout: Duration,
}

impl ResultAggregator {
    pub fn new(replicas: Vec<PeerHandle>, timeout: Duration) -> Self {
        Self { replicas, timeout }
    }

    /// Ask every replica at once; failures and timeouts are left out of the
    /// count.
    pub async fn query(&self) -> Verdict {
        let calls = self
            .replicas
            .iter()
            .map(|peer| with_timeout(peer.id(), self.timeout, peer.result()));
        let responses = join_all(calls).await.into_iter().zip(&self.replicas).map(
            |(res, peer)| match res {
                Ok(result) => Some(result),
                Err(e) => {
                    tracing::debug!("Result from replica {} failed: {}", peer.id(), e);
                    None
                }
            },
        );
        tally(responses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(highest_bid: i64) -> Option<AuctionResult> {
        Some(AuctionResult::Status {
            remaining_time: 10,
            highest_bid,
        })
    }

    #[test]
    fn two_against_one_wins() {
        let verdict = tally(vec![status(60), status(60), status(55)]);
        assert_eq!(verdict, Verdict::Agreed(status(60).unwrap()));
    }

    #[test]
    fn one_against_one_is_mismatched() {
        assert_eq!(tally(vec![status(60), status(55)]), Verdict::Mismatched);
    }

    #[test]
    fn nothing_is_no_response() {
        assert_eq!(tally(Vec::<Option<AuctionResult>>::new()), Verdict::NoResponse);
        assert_eq!(tally(vec![None, None]), Verdict::NoResponse);
    }

    #[test]
    fn failures_do_not_count() {
        let verdict = tally(vec![None, status(60), None]);
        assert_eq!(verdict, Verdict::Agreed(status(60).unwrap()));
    }

    #[test]
    fn winner_and_status_are_different_answers() {
        let winner = Some(AuctionResult::Winner {
            name: "alice".into(),
            amount: 60,
        });
        assert_eq!(tally(vec![winner.clone(), status(60)]), Verdict::Mismatched);
        assert_eq!(
            tally(vec![winner.clone(), winner.clone(), status(60)]),
            Verdict::Agreed(winner.unwrap())
        );
    }

    #[test]
    fn verdict_renders_like_the_client_log() {
        let verdict = Verdict::Agreed(status(60).unwrap());
        assert_eq!(
            verdict.to_string(),
            "The highest bid is 60. There are 10 seconds left of the auction."
        );
        assert_eq!(Verdict::Mismatched.to_string(), "mismatched replicas");
    }
}
