//! Follow-up status machine.
//!
//! The current status is never stored on the follow-up itself; it is the
//! status of the log entry with the highest `seq`, or `PENDING` when no
//! entry exists. Timestamps play no part, so clock skew between app hosts
//! cannot reorder history.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::types::FollowUpLog;
use crate::core::shared::enums::FollowupStatus;

/// Two-value toggle: `DONE` goes back to `PENDING`, everything else to `DONE`.
pub fn next_toggle_status(current: FollowupStatus) -> FollowupStatus {
    match current {
        FollowupStatus::Done => FollowupStatus::Pending,
        FollowupStatus::Pending | FollowupStatus::Skipped | FollowupStatus::Rescheduled => {
            FollowupStatus::Done
        }
    }
}

/// Status logged by an explicit update, whatever changed.
pub const UPDATE_STATUS: FollowupStatus = FollowupStatus::Rescheduled;

pub fn derive_current_status(logs: &[FollowUpLog]) -> FollowupStatus {
    logs.iter()
        .max_by_key(|log| log.seq)
        .map(|log| log.status)
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DueState {
    Overdue,
    Upcoming,
}

impl DueState {
    pub fn classify(next_followup_date: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if next_followup_date < now {
            Self::Overdue
        } else {
            Self::Upcoming
        }
    }
}
