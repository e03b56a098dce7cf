//! Vote processing span helpers.

use tracing::Span;

/// Start a span covering one popped vote, from parse through upsert.
///
/// `vote.outcome` is declared empty and filled by [`record_vote_outcome`].
pub fn start_vote_span(voter_id: &str) -> Span {
    tracing::info_span!(
        "vote.process",
        "vote.voter_id" = voter_id,
        "vote.outcome" = tracing::field::Empty,
    )
}

/// Record how the vote ended up on its span.
pub fn record_vote_outcome(span: &Span, outcome: &str) {
    span.record("vote.outcome", outcome);
}
