use chrono::{DateTime, Utc};
use ethers::types::I256;
use std::collections::HashMap;

use crate::models::LatestAnswer;

/// Result of tallying one symbol's answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    /// Occurrences of the most reported value, 0 for no answers.
    pub max_count: usize,
    /// The most reported value, or `None` when several values share the top count.
    pub heaviest_answer: Option<I256>,
}

pub fn tally(answers: &[I256]) -> Tally {
    let mut counts: HashMap<I256, usize> = HashMap::new();
    for answer in answers {
        *counts.entry(*answer).or_insert(0) += 1;
    }

    let max_count = counts.values().copied().max().unwrap_or(0);
    let mut leaders = counts
        .iter()
        .filter(|&(_, &count)| count == max_count)
        .map(|(&answer, _)| answer);

    let heaviest_answer = match (leaders.next(), leaders.next()) {
        (Some(answer), None) => Some(answer),
        _ => None,
    };

    Tally {
        max_count,
        heaviest_answer,
    }
}

/// Builds the symbol's `LatestAnswer`. Consensus only looks at the top count,
/// so a tie at or above `threshold` still reports consensus with no heaviest
/// answer.
///
/// `threshold` is at least 1 for every configured network (see
/// `AppConfig::symbol_sources`), so an empty answer list never agrees.
pub fn compute_latest_answer(
    answers: Vec<I256>,
    errors: Vec<String>,
    threshold: u32,
    time: DateTime<Utc>,
) -> LatestAnswer {
    let tally = tally(&answers);
    let consensus = tally.max_count >= threshold as usize;

    LatestAnswer {
        answers,
        consensus,
        heaviest_answer: tally.heaviest_answer,
        errors,
        time,
    }
}
