//! List reconciliation: deduplicate and rank one list field across runs.
//!
//! Every item is compared, run by run and in original order, against the
//! canonical item of each existing group. The first matching group absorbs
//! it; otherwise it opens a new group. A group's support is the number of
//! distinct runs that produced a matching item. Groups below `min_support`
//! are dropped and the rest are stably sorted by support, so ties keep
//! first-seen order.
//!
//! Comparison is quadratic in the number of items. Per-report lists hold
//! tens of items, not thousands.

use bidscreen_core::{Deadline, Risk, Showstopper};
use serde::Serialize;
use tracing::debug;

use crate::fingerprint::{MatchKey, MergeOptions};

/// Default minimum number of supporting runs for a list item to survive.
pub const DEFAULT_MIN_SUPPORT: usize = 1;

/// A deduplicated item and the number of runs that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeGroup<T> {
    pub canonical: T,
    pub support: usize,
}

/// A record that can be reconciled across runs.
pub trait Finding: Clone + Serialize {
    /// The free-text field compared for similarity.
    fn match_text(&self) -> &str;

    /// Severity used to pick the canonical record; `None` if unscored.
    fn severity(&self) -> Option<u32> {
        None
    }
}

impl Finding for Showstopper {
    fn match_text(&self) -> &str {
        &self.description
    }
}

impl Finding for Risk {
    fn match_text(&self) -> &str {
        &self.risk_text
    }

    fn severity(&self) -> Option<u32> {
        Some(self.score)
    }
}

impl Finding for Deadline {
    fn match_text(&self) -> &str {
        &self.milestone
    }
}

struct Slot<'a, T> {
    canonical: &'a T,
    key: MatchKey,
    /// Cached length of the canonical's detail measure.
    detail: usize,
    support: usize,
    last_run: usize,
}

/// Core pass shared by strings and records.
///
/// `detail` measures how detailed an item is; `replaces(candidate, current,
/// candidate_detail, current_detail)` decides whether a matching candidate
/// becomes the new canonical.
fn reconcile_by<'a, T, TextFn, DetailFn, ReplaceFn>(
    lists: &[&'a [T]],
    options: &MergeOptions,
    min_support: usize,
    text_of: TextFn,
    detail: DetailFn,
    replaces: ReplaceFn,
) -> Vec<MergeGroup<T>>
where
    T: Clone,
    TextFn: Fn(&T) -> &str,
    DetailFn: Fn(&T) -> usize,
    ReplaceFn: Fn(&T, &T, usize, usize) -> bool,
{
    let mut slots: Vec<Slot<'a, T>> = Vec::new();
    let mut items = 0usize;

    for (run, list) in lists.iter().copied().enumerate() {
        for item in list.iter() {
            items += 1;
            let key = MatchKey::new(text_of(item), options);
            match slots
                .iter_mut()
                .find(|slot| slot.key.matches(&key, options))
            {
                Some(slot) => {
                    if slot.last_run != run {
                        slot.support += 1;
                        slot.last_run = run;
                    }
                    let item_detail = detail(item);
                    if replaces(item, slot.canonical, item_detail, slot.detail) {
                        slot.canonical = item;
                        slot.key = key;
                        slot.detail = item_detail;
                    }
                }
                None => slots.push(Slot {
                    canonical: item,
                    key,
                    detail: detail(item),
                    support: 1,
                    last_run: run,
                }),
            }
        }
    }

    let mut groups: Vec<MergeGroup<T>> = slots
        .into_iter()
        .filter(|slot| slot.support >= min_support)
        .map(|slot| MergeGroup {
            canonical: slot.canonical.clone(),
            support: slot.support,
        })
        .collect();
    groups.sort_by(|a, b| b.support.cmp(&a.support));

    debug!(runs = lists.len(), items, groups = groups.len(), "reconciled list");
    groups
}

/// Reconcile plain string lists; the longer string becomes canonical.
pub fn reconcile_strings(
    lists: &[&[String]],
    options: &MergeOptions,
    min_support: usize,
) -> Vec<MergeGroup<String>> {
    reconcile_by(
        lists,
        options,
        min_support,
        |s| s.as_str(),
        |s| s.chars().count(),
        |_, _, new_len, old_len| new_len > old_len,
    )
}

/// Reconcile record lists on [`Finding::match_text`].
///
/// A strictly higher severity replaces the canonical; on equal (or absent)
/// severity the longer serialized record wins.
pub fn reconcile_records<T: Finding>(
    lists: &[&[T]],
    options: &MergeOptions,
    min_support: usize,
) -> Vec<MergeGroup<T>> {
    reconcile_by(
        lists,
        options,
        min_support,
        |r| r.match_text(),
        serialized_len,
        |candidate, current, new_len, old_len| {
            match candidate.severity().cmp(&current.severity()) {
                std::cmp::Ordering::Greater => true,
                std::cmp::Ordering::Less => false,
                std::cmp::Ordering::Equal => new_len > old_len,
            }
        },
    )
}

/// Deduplicated, support-ranked strings with default options.
pub fn merge_strings(lists: &[&[String]], min_support: usize) -> Vec<String> {
    reconcile_strings(lists, &MergeOptions::default(), min_support)
        .into_iter()
        .map(|g| g.canonical)
        .collect()
}

/// Deduplicated, support-ranked records with default options.
pub fn merge_records<T: Finding>(lists: &[&[T]], min_support: usize) -> Vec<T> {
    reconcile_records(lists, &MergeOptions::default(), min_support)
        .into_iter()
        .map(|g| g.canonical)
        .collect()
}

fn serialized_len<T: Serialize>(item: &T) -> usize {
    serde_json::to_string(item)
        .map(|s| s.chars().count())
        .unwrap_or(0)
}
