//! Database models

use crate::lifecycle::ItemStatus;
use crate::registry::ContentProfile;
use serde::{Deserialize, Serialize};

/// One produced or producible artifact
///
/// Invariants maintained by the store: `external_id` is set iff status is
/// UPLOADED or ANALYZED, `published_at` is set iff `external_id` is set,
/// and rows are never deleted (history is part of the product value).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Unique, externally visible, time-derived token (e.g. `v_1700000000123456`)
    pub key: String,
    /// Hosting-site content identifier, absent until publication
    pub external_id: Option<String>,
    pub status: ItemStatus,
    pub profile: ContentProfile,
    /// Unix seconds; set when the publisher confirms upload
    pub published_at: Option<i64>,
    /// Generation artifacts, carried for audit and reuse; opaque to the core
    pub script: Option<String>,
    pub prompt: Option<String>,
}

/// One performance sample for an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// Unix seconds at collection time
    pub observed_at: i64,
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
}
