//! Priority ranking of visible entries.
//!
//! Ordering, most important first:
//!
//! 1. Historical landmarks, when historical mode is on
//! 2. Rating, descending; ratings within the tolerance band compare equal
//! 3. Distance, ascending
//! 4. Identifier, to keep the order deterministic
//!
//! A difference of exactly the tolerance counts as "within the band".
//!
//! The tolerance band makes the comparison non-transitive (4.0 ~ 4.4 ~ 4.8
//! but 4.0 < 4.8), which `slice::sort_by` does not accept, so ranking uses a
//! stable insertion sort. Inputs are a few dozen entries per frame.

use std::cmp::Ordering;

use crate::landmark::{LandmarkCategory, VisibleItem};

use super::config::VisibilityConfig;

/// Compare two entries; `Ordering::Less` means `a` ranks ahead of `b`.
pub fn compare_priority(a: &VisibleItem, b: &VisibleItem, config: &VisibilityConfig) -> Ordering {
    let la = a.representative();
    let lb = b.representative();

    if config.historical_mode {
        let ha = la.category == LandmarkCategory::Historical;
        let hb = lb.category == LandmarkCategory::Historical;
        if ha != hb {
            return if ha { Ordering::Less } else { Ordering::Greater };
        }
    }

    let ra = la.rating_or_zero();
    let rb = lb.rating_or_zero();
    if (ra - rb).abs() > config.rating_tolerance {
        return rb.partial_cmp(&ra).unwrap_or(Ordering::Equal);
    }

    la.distance_meters
        .partial_cmp(&lb.distance_meters)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.id().cmp(b.id()))
}

/// Sort entries by priority (stable) and truncate to the configured cap.
pub fn rank_and_truncate(items: Vec<VisibleItem>, config: &VisibilityConfig) -> Vec<VisibleItem> {
    let mut ranked: Vec<VisibleItem> = Vec::with_capacity(items.len());

    for item in items {
        let mut position = ranked.len();
        while position > 0
            && compare_priority(&item, &ranked[position - 1], config) == Ordering::Less
        {
            position -= 1;
        }
        ranked.insert(position, item);
    }

    ranked.truncate(config.max_landmarks_visible);
    ranked
}
