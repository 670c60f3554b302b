//! Retention policy: keep the most render-relevant items under a size cap.
//!
//! Relevance is insertion recency first (newest `timestamp`), then height (highest
//! `number`). This is deliberately not the display order, which is ascending height.

use std::cmp::Ordering;

use crate::types::Item;

/// Relevance comparator: `Less` means `a` is more relevant and survives first.
#[must_use]
pub fn by_relevance(a: &Item, b: &Item) -> Ordering {
    b.timestamp
        .cmp(&a.timestamp)
        .then_with(|| b.sort_number().cmp(&a.sort_number()))
}

/// Returns at most `max_items` items, in relevance order when trimming was needed.
///
/// Input at or under the cap is returned unchanged.
#[must_use]
pub fn evict(items: &[Item], max_items: usize) -> Vec<Item> {
    if items.len() <= max_items {
        return items.to_vec();
    }

    let mut ranked = items.to_vec();
    ranked.sort_by(by_relevance);
    ranked.truncate(max_items);
    ranked
}

/// In-place variant used by the store: trims `items` to `max_items` while keeping the
/// survivors in their current (display) order. Returns the evicted items.
pub fn retain_most_relevant(items: &mut Vec<Item>, max_items: usize) -> Vec<Item> {
    if items.len() <= max_items {
        return Vec::new();
    }

    let mut ranked: Vec<usize> = (0..items.len()).collect();
    ranked.sort_by(|&a, &b| by_relevance(&items[a], &items[b]));

    let mut keep = vec![false; items.len()];
    for &index in ranked.iter().take(max_items) {
        keep[index] = true;
    }

    let mut evicted = Vec::with_capacity(items.len() - max_items);
    let mut survivors = Vec::with_capacity(max_items);
    for (item, keep) in items.drain(..).zip(keep) {
        if keep {
            survivors.push(item);
        } else {
            evicted.push(item);
        }
    }
    *items = survivors;
    evicted
}
