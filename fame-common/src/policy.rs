//! Exploit/explore selection policy
//!
//! A discrete probabilistic policy, not a learned model. The strategy is a
//! trait seam so the epsilon-greedy baseline can later be replaced (e.g. by
//! an upper-confidence-bound bandit) without touching the lifecycle or the
//! store.

use crate::registry::ContentProfile;
use crate::{Error, Result};
use rand::{Rng, RngCore};

/// Per-profile inputs to a selection decision
#[derive(Debug, Clone)]
pub struct ProfileStats {
    pub profile: ContentProfile,
    /// Mean velocity over the profile's scorable items; `None` = undefined
    /// (no ANALYZED/UPLOADED item has two observations yet)
    pub velocity: Option<f64>,
    /// Total items ever produced for this profile, any status
    pub items_produced: u64,
    /// Items that completed the lifecycle; zero means a coverage gap
    pub analyzed_items: u64,
}

/// The branch taken and the profile it picked
#[derive(Debug, Clone, PartialEq)]
pub enum Choice {
    Exploit(ContentProfile),
    Explore(ContentProfile),
}

impl Choice {
    pub fn profile(&self) -> &ContentProfile {
        match self {
            Choice::Exploit(profile) | Choice::Explore(profile) => profile,
        }
    }
}

/// A selection policy over scored profiles
pub trait SelectionStrategy {
    fn select(&self, stats: &[ProfileStats], rng: &mut dyn RngCore) -> Result<Choice>;
}

/// Fixed-probability exploit/explore split (the 80/20 policy)
///
/// Coverage comes first: while any profile has zero ANALYZED items or no
/// defined velocity, the policy explores uniformly among exactly those
/// profiles, regardless of `exploit_probability`. This guarantees every
/// profile earns a comparable score before exploitation dominates
/// selection.
#[derive(Debug, Clone, Copy)]
pub struct EpsilonGreedy {
    pub exploit_probability: f64,
}

impl EpsilonGreedy {
    pub fn new(exploit_probability: f64) -> Self {
        Self {
            exploit_probability: exploit_probability.clamp(0.0, 1.0),
        }
    }
}

impl SelectionStrategy for EpsilonGreedy {
    fn select(&self, stats: &[ProfileStats], rng: &mut dyn RngCore) -> Result<Choice> {
        if stats.is_empty() {
            return Err(Error::EmptyRegistry);
        }

        // Cold-start fairness: explore the under-covered subset first. A
        // profile counts as under-covered until it has an ANALYZED item AND
        // a defined velocity (a lone sample or a degenerate window leaves
        // the score undefined even after analysis).
        let uncovered: Vec<&ProfileStats> = stats
            .iter()
            .filter(|s| s.analyzed_items == 0 || s.velocity.is_none())
            .collect();
        if !uncovered.is_empty() {
            let picked = uncovered[rng.gen_range(0..uncovered.len())];
            return Ok(Choice::Explore(picked.profile.clone()));
        }

        if rng.gen::<f64>() < self.exploit_probability {
            let mut best = &stats[0];
            for candidate in &stats[1..] {
                if beats(candidate, best) {
                    best = candidate;
                }
            }
            return Ok(Choice::Exploit(best.profile.clone()));
        }

        let picked = &stats[rng.gen_range(0..stats.len())];
        Ok(Choice::Explore(picked.profile.clone()))
    }
}

/// Exploit ordering: highest velocity, then fewest items produced (favors
/// under-explored high performers), then lexicographic profile order
fn beats(candidate: &ProfileStats, best: &ProfileStats) -> bool {
    // Exploit only runs once every profile has a defined velocity; an
    // undefined score still sorts last should that ever change
    let cv = candidate.velocity.unwrap_or(f64::NEG_INFINITY);
    let bv = best.velocity.unwrap_or(f64::NEG_INFINITY);
    if cv != bv {
        return cv > bv;
    }
    if candidate.items_produced != best.items_produced {
        return candidate.items_produced < best.items_produced;
    }
    candidate.profile < best.profile
}
