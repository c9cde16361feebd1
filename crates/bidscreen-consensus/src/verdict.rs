//! Scalar and verdict reconciliation.

use bidscreen_core::{Recommendation, Verdict};
use tracing::debug;

/// Most frequent non-empty value; ties go to the value seen first.
///
/// Whitespace-only values count as empty. Returns an empty string when every
/// value is empty ("not determined").
pub fn majority_scalar<'a, I>(values: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut tally: Vec<(&str, usize)> = Vec::new();
    for value in values {
        if value.trim().is_empty() {
            continue;
        }
        match tally.iter_mut().find(|(seen, _)| *seen == value) {
            Some((_, count)) => *count += 1,
            None => tally.push((value, 1)),
        }
    }
    first_max(tally)
        .map(|v| v.to_string())
        .unwrap_or_default()
}

/// Entry with the highest count; the earliest entry wins ties.
fn first_max<K>(tally: Vec<(K, usize)>) -> Option<K> {
    let mut best: Option<(K, usize)> = None;
    for (key, count) in tally {
        if best.as_ref().is_none_or(|(_, top)| count > *top) {
            best = Some((key, count));
        }
    }
    best.map(|(key, _)| key)
}

/// Plain majority among the recommendations, ties to the first seen.
pub fn majority_recommendation<'a, I>(verdicts: I) -> Option<Recommendation>
where
    I: IntoIterator<Item = &'a Verdict>,
{
    let mut tally: Vec<(Recommendation, usize)> = Vec::new();
    for verdict in verdicts {
        match tally
            .iter_mut()
            .find(|(seen, _)| *seen == verdict.recommendation)
        {
            Some((_, count)) => *count += 1,
            None => tally.push((verdict.recommendation, 1)),
        }
    }
    first_max(tally)
}

/// Combine the verdicts of N runs.
///
/// - `score`: rounded mean.
/// - `recommendation`: majority vote, then forced to [`Recommendation::NoGo`]
///   if any run said NO_GO. A single run's disqualifier cannot be outvoted.
/// - `rationale`: the longest one, unmodified.
pub fn merge_verdict<'a, I>(verdicts: I) -> Verdict
where
    I: IntoIterator<Item = &'a Verdict>,
{
    let verdicts: Vec<&Verdict> = verdicts.into_iter().collect();
    if verdicts.is_empty() {
        return Verdict::default();
    }

    let total: u64 = verdicts.iter().map(|v| u64::from(v.score)).sum();
    let score = (total as f64 / verdicts.len() as f64).round() as u32;

    let voted = majority_recommendation(verdicts.iter().copied()).unwrap_or_default();
    let any_no_go = verdicts
        .iter()
        .any(|v| v.recommendation == Recommendation::NoGo);
    let recommendation = if any_no_go {
        Recommendation::NoGo
    } else {
        voted
    };
    if recommendation != voted {
        debug!(%voted, "NO_GO from a single run overrides the majority");
    }

    let mut rationale = "";
    for v in &verdicts {
        if v.rationale.chars().count() > rationale.chars().count() {
            rationale = &v.rationale;
        }
    }

    Verdict {
        recommendation,
        score,
        rationale: rationale.to_string(),
    }
}
