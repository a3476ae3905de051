//! Item lifecycle state machine
//!
//! Items advance PENDING -> CREATING -> CREATED -> UPLOADED -> ANALYZED and
//! never move backward. ANALYZED is terminal only in the sense that no
//! further transition exists; observation collection continues there.
//!
//! Guards are ordinary conditional logic returning `Result`, never panics.
//! Re-confirming an already-reached state is an idempotent no-op so that
//! at-least-once schedulers can safely re-fire a missed trigger.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of an item
///
/// Declaration order defines forward progression; `Ord` follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemStatus {
    /// Created by the decision engine, waiting for a producer
    Pending,
    /// Claimed by exactly one producer
    Creating,
    /// Producer reported success and supplied generation artifacts
    Created,
    /// Publisher confirmed publication and supplied the external id
    Uploaded,
    /// Feedback collector has recorded post-upload observations
    Analyzed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "PENDING",
            ItemStatus::Creating => "CREATING",
            ItemStatus::Created => "CREATED",
            ItemStatus::Uploaded => "UPLOADED",
            ItemStatus::Analyzed => "ANALYZED",
        }
    }

    /// Items in these states carry an external id and can be observed
    pub fn is_observable(&self) -> bool {
        matches!(self, ItemStatus::Uploaded | ItemStatus::Analyzed)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(ItemStatus::Pending),
            "CREATING" => Ok(ItemStatus::Creating),
            "CREATED" => Ok(ItemStatus::Created),
            "UPLOADED" => Ok(ItemStatus::Uploaded),
            "ANALYZED" => Ok(ItemStatus::Analyzed),
            other => Err(Error::InvalidInput(format!("unknown item status: {other}"))),
        }
    }
}

/// A transition request from an external collaborator
///
/// Each variant carries the payload its guard requires. The producer and
/// publisher processes themselves are out of scope; they report outcomes
/// through these requests (via fame-ctl or the library API).
#[derive(Debug, Clone)]
pub enum Transition {
    /// Producer claims the job (at-most-once per item)
    Claim,
    /// Producer reports success with generation artifacts
    Created { script: String, prompt: String },
    /// Publisher confirms publication
    Uploaded {
        external_id: String,
        published_at: i64,
    },
    /// Feedback collector promotes the item after post-upload observations
    Analyzed,
}

impl Transition {
    /// The status this request tries to reach
    pub fn target(&self) -> ItemStatus {
        match self {
            Transition::Claim => ItemStatus::Creating,
            Transition::Created { .. } => ItemStatus::Created,
            Transition::Uploaded { .. } => ItemStatus::Uploaded,
            Transition::Analyzed => ItemStatus::Analyzed,
        }
    }
}

/// Outcome of a guard check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Guards passed; advance to this status
    Advance(ItemStatus),
    /// The item is already in the target status; retry no-op
    AlreadyThere,
}

/// Check a transition request against the current status
///
/// Pure function: the caller (the store) persists the result inside its
/// transaction. Out-of-order requests fail with `InvalidTransition` and
/// leave state untouched; payload guards are checked before ordering so a
/// malformed confirmation is rejected even when retried idempotently.
pub fn apply(key: &str, current: ItemStatus, request: &Transition) -> Result<Step> {
    if let Transition::Uploaded { external_id, .. } = request {
        if external_id.trim().is_empty() {
            return Err(Error::MissingExternalId {
                key: key.to_string(),
            });
        }
    }

    let target = request.target();
    if target == current {
        return Ok(Step::AlreadyThere);
    }

    // Forward by exactly one state; backward edges and skips are out of order
    let expected = match current {
        ItemStatus::Pending => Some(ItemStatus::Creating),
        ItemStatus::Creating => Some(ItemStatus::Created),
        ItemStatus::Created => Some(ItemStatus::Uploaded),
        ItemStatus::Uploaded => Some(ItemStatus::Analyzed),
        ItemStatus::Analyzed => None,
    };

    if expected != Some(target) {
        return Err(Error::InvalidTransition {
            key: key.to_string(),
            from: current,
            to: target,
        });
    }

    Ok(Step::Advance(target))
}
