use crate::hash;
use crate::usage::UsageRecord;
use serde::{Deserialize, Serialize};

/// Why an asset counts as customized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomizedReason {
    /// Content hash differs from the recorded baseline.
    Drift,
    /// File exists but no baseline was ever recorded.
    NoBaseline,
    /// Flag set earlier (by a previous pass or an external signal).
    Flagged,
}

impl CustomizedReason {
    pub fn as_str(self) -> &'static str {
        match self {
            CustomizedReason::Drift => "drift",
            CustomizedReason::NoBaseline => "no_baseline",
            CustomizedReason::Flagged => "flagged",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Detection {
    Absent,
    Pristine,
    Customized { reason: CustomizedReason },
}

impl Detection {
    pub fn exists(&self) -> bool {
        !matches!(self, Detection::Absent)
    }

    pub fn is_customized(&self) -> bool {
        matches!(self, Detection::Customized { .. })
    }

    /// Customized by content, but not yet flagged in usage tracking.
    pub fn is_unflagged_customization(&self) -> bool {
        matches!(
            self,
            Detection::Customized {
                reason: CustomizedReason::Drift | CustomizedReason::NoBaseline
            }
        )
    }
}

/// Compare the live on-disk content of an asset against its recorded
/// baseline.
///
/// A missing baseline for a file that exists is treated as customized, so a
/// deleted state store can never cause user files to be replaced silently.
pub fn detect(current: Option<&str>, record: Option<&UsageRecord>) -> Detection {
    let Some(current) = current else {
        return Detection::Absent;
    };

    if record.is_some_and(|r| r.customized) {
        return Detection::Customized {
            reason: CustomizedReason::Flagged,
        };
    }

    let Some(baseline) = record.and_then(|r| r.template_baseline_hash.as_deref()) else {
        return Detection::Customized {
            reason: CustomizedReason::NoBaseline,
        };
    };

    if hash::content_hash(current) == baseline {
        Detection::Pristine
    } else {
        Detection::Customized {
            reason: CustomizedReason::Drift,
        }
    }
}
