//! The approval rule: only published reviews may be shown on the website.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{ApprovalState, ReviewStatus};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApprovalError {
    #[error("only published reviews can be approved (review is {0})")]
    NotPublished(&'static str),
}

/// Approving stamps `now`; unapproving clears the timestamp. Unapproving is
/// always allowed.
pub fn decide(
    status: ReviewStatus,
    approved: bool,
    now: DateTime<Utc>,
) -> Result<ApprovalState, ApprovalError> {
    if approved && status != ReviewStatus::Published {
        return Err(ApprovalError::NotPublished(status.as_str()));
    }
    Ok(ApprovalState {
        approved,
        approved_at: approved.then_some(now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 4, 9, 15, 0).unwrap()
    }

    #[test]
    fn approving_published_review_stamps_time() {
        let state = decide(ReviewStatus::Published, true, now()).unwrap();
        assert!(state.approved);
        assert_eq!(state.approved_at, Some(now()));
    }

    #[test]
    fn removed_review_cannot_be_approved() {
        assert_eq!(
            decide(ReviewStatus::Removed, true, now()),
            Err(ApprovalError::NotPublished("removed"))
        );
    }

    #[test]
    fn unapproving_clears_timestamp_for_any_status() {
        let state = decide(ReviewStatus::Removed, false, now()).unwrap();
        assert!(!state.approved);
        assert_eq!(state.approved_at, None);
    }
}
