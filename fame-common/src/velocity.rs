//! Fame velocity scoring
//!
//! Transforms an item's ordered observation sequence into a single
//! non-negative score: rate of audience growth weighted by engagement
//! quality. Pure functions, deterministic for identical inputs; the store
//! supplies the sequences, nothing here touches the database.

use crate::db::models::Observation;
use crate::{Error, Result};

/// Engagement weights applied to like/comment deltas
///
/// A like signals stronger engagement than a view and a comment stronger
/// than a like, so `comments > likes > 1.0`. Defaults (5.0 / 10.0) come
/// from the settings table; the exact values are operator policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub likes: f64,
    pub comments: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            likes: 5.0,
            comments: 10.0,
        }
    }
}

/// Compute one item's fame velocity from its ordered observation sequence
///
/// `(Δviews + w_l·Δlikes + w_c·Δcomments) / Δt` over the first..last window.
/// Deltas are clamped to >= 0 to tolerate metric corrections from the
/// hosting site, so a defined velocity is always non-negative.
///
/// Fewer than two observations is `InsufficientData` — never zero, which
/// would wrongly read as a dead profile. A window with `Δt <= 0` (duplicate
/// or out-of-order timestamps) is `DegenerateWindow`.
pub fn item_velocity(observations: &[Observation], weights: Weights) -> Result<f64> {
    let (first, last) = match (observations.first(), observations.last()) {
        (Some(first), Some(last)) if observations.len() >= 2 => (first, last),
        _ => return Err(Error::InsufficientData),
    };

    let elapsed = last.observed_at - first.observed_at;
    if elapsed <= 0 {
        return Err(Error::DegenerateWindow);
    }

    let delta_views = (last.views - first.views).max(0) as f64;
    let delta_likes = (last.likes - first.likes).max(0) as f64;
    let delta_comments = (last.comments - first.comments).max(0) as f64;

    let weighted = delta_views + weights.likes * delta_likes + weights.comments * delta_comments;
    Ok(weighted / elapsed as f64)
}

/// A profile's velocity: arithmetic mean over its items' defined velocities
///
/// Only UPLOADED/ANALYZED items qualify (the caller filters); items whose
/// own velocity is undefined are excluded from the mean. Zero qualifying
/// items means the profile velocity is undefined (`None`), which the
/// decision engine treats as an explore candidate.
pub fn profile_velocity<'a, I>(sequences: I, weights: Weights) -> Option<f64>
where
    I: IntoIterator<Item = &'a [Observation]>,
{
    let mut sum = 0.0;
    let mut count = 0u32;
    for sequence in sequences {
        if let Ok(velocity) = item_velocity(sequence, weights) {
            sum += velocity;
            count += 1;
        }
    }
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}
