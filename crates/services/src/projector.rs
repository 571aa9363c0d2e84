//! Read model for poll results.

use domains::PollOption;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectedOption {
    pub label: String,
    pub votes: u64,
    pub percentage: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollTally {
    pub options: Vec<ProjectedOption>,
    pub total_votes: u64,
}

/// Share of `votes` in `total`, rounded half-up to a whole percent.
///
/// Each option is rounded on its own, so a poll's percentages can add up to
/// 99 or 101.
pub fn percentage(votes: u64, total: u64) -> u64 {
    if total == 0 {
        return 0;
    }
    let (votes, total) = (u128::from(votes), u128::from(total));
    // round(100v/t) == floor((200v + t) / 2t)
    ((200 * votes + total) / (2 * total)) as u64
}

pub fn project(options: &[PollOption]) -> PollTally {
    let total_votes = options.iter().map(|o| o.votes).sum();

    PollTally {
        options: options
            .iter()
            .map(|o| ProjectedOption {
                label: o.label.clone(),
                votes: o.votes,
                percentage: percentage(o.votes, total_votes),
            })
            .collect(),
        total_votes,
    }
}
