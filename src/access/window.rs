//! Time-window predicates shared by the lifecycle engine, the access resolver
//! and both store implementations.

use chrono::{DateTime, Utc};

use crate::model::{CandidateMethod, Election, ElectionStatus};

/// A draft election whose voting window has opened.
pub fn due_for_activation(election: &Election, now: DateTime<Utc>) -> bool {
    election.status == ElectionStatus::Draft && election.start_time <= now
}

/// An active election whose voting window has passed.
pub fn due_for_closing(election: &Election, now: DateTime<Utc>) -> bool {
    election.status == ElectionStatus::Active && election.end_time < now
}

/// Whether the application window bounds contain `now`.
///
/// At least one bound must be set: an election with no application window at
/// all never accepts applications.
pub fn application_window_open(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    match (start, end) {
        (Some(start), Some(end)) => start <= now && now <= end,
        (None, Some(end)) => now <= end,
        (Some(start), None) => start <= now,
        (None, None) => false,
    }
}

/// Whether the voting window contains `now`.
pub fn voting_window_open(election: &Election, now: DateTime<Utc>) -> bool {
    election.start_time <= now && now <= election.end_time
}

/// Whether a member may currently apply as a candidate, ignoring access rights.
pub fn accepts_applications(election: &Election, now: DateTime<Utc>) -> bool {
    election.candidate_method == CandidateMethod::Application
        && matches!(
            election.status,
            ElectionStatus::Draft | ElectionStatus::Active
        )
        && application_window_open(
            election.application_start_time,
            election.application_end_time,
            now,
        )
}

/// Whether a member may currently vote, ignoring access rights.
pub fn accepts_votes(election: &Election, now: DateTime<Utc>) -> bool {
    election.status == ElectionStatus::Active && voting_window_open(election, now)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::model::Id;

    fn at(now: DateTime<Utc>, hours: i64) -> DateTime<Utc> {
        now + Duration::hours(hours)
    }

    #[test]
    fn application_window_bounds_are_inclusive() {
        let now = Utc::now();
        assert!(application_window_open(Some(now), Some(now), now));
        assert!(application_window_open(Some(at(now, -1)), Some(at(now, 1)), now));
        assert!(!application_window_open(Some(at(now, 1)), Some(at(now, 2)), now));
        assert!(!application_window_open(Some(at(now, -2)), Some(at(now, -1)), now));
    }

    #[test]
    fn application_window_with_one_bound() {
        let now = Utc::now();
        assert!(application_window_open(None, Some(at(now, 1)), now));
        assert!(!application_window_open(None, Some(at(now, -1)), now));
        assert!(application_window_open(Some(at(now, -1)), None, now));
        assert!(!application_window_open(Some(at(now, 1)), None, now));
    }

    #[test]
    fn unbounded_application_window_is_never_open() {
        let now = Utc::now();
        for offset in [-1000, -1, 0, 1, 1000] {
            assert!(!application_window_open(None, None, at(now, offset)));
        }
    }

    #[test]
    fn lifecycle_predicates() {
        let now = Utc::now();
        let org = Id::new();

        let mut election = Election::example(org, ElectionStatus::Draft, now, at(now, 1));
        assert!(due_for_activation(&election, now));
        assert!(!due_for_activation(&election, at(now, -1)));
        assert!(!due_for_closing(&election, at(now, 2)));

        election.status = ElectionStatus::Active;
        assert!(!due_for_activation(&election, now));
        // The end instant itself is still open.
        assert!(!due_for_closing(&election, at(now, 1)));
        assert!(due_for_closing(&election, at(now, 2)));
    }

    #[test]
    fn applications_need_application_method_and_open_status() {
        let now = Utc::now();
        let open = Election::active_example(Id::new(), now)
            .with_application_window(Some(at(now, -1)), Some(at(now, 1)));
        assert!(accepts_applications(&open, now));

        let mut nominated = open.clone();
        nominated.candidate_method = CandidateMethod::Nomination;
        assert!(!accepts_applications(&nominated, now));

        let mut closed = open.clone();
        closed.status = ElectionStatus::Closed;
        assert!(!accepts_applications(&closed, now));

        let mut draft = open;
        draft.status = ElectionStatus::Draft;
        assert!(accepts_applications(&draft, now));
    }

    #[test]
    fn votes_need_active_status_and_open_window() {
        let now = Utc::now();
        let election = Election::active_example(Id::new(), now);
        assert!(accepts_votes(&election, now));
        assert!(accepts_votes(&election, election.end_time));
        assert!(!accepts_votes(&election, at(now, 2)));

        let mut draft = election;
        draft.status = ElectionStatus::Draft;
        assert!(!accepts_votes(&draft, now));
    }
}
