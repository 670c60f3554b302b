pub mod expansion;
pub mod parse;
pub mod raw;

pub use expansion::{expand_block, expand_polled, expand_uncle, expand_workshare, Candidate};
pub use parse::{parse_block, parse_polled_block, parse_push_message, parse_summary, ParseError};
pub use raw::{Notification, PolledBlock, RawBlock, RawSummary};

/// Expands any single notification into its candidate batch.
#[must_use]
pub fn expand(notification: &Notification) -> Vec<Candidate> {
    match notification {
        Notification::Block(block) => expand_block(block),
        Notification::Uncle(uncle) => vec![expand_uncle(uncle)],
        Notification::Workshare(workshare) => vec![expand_workshare(workshare)],
    }
}
