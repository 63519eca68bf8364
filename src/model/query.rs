use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::access::window;
use crate::model::{
    CandidateApplication, CandidateMethod, Election, ElectionStatus, FormField, Id, Position,
};

/// Typed selection criteria for elections. Unset criteria match everything;
/// set criteria are combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElectionQuery {
    /// Only these IDs. `Some` of an empty list matches nothing.
    pub ids: Option<Vec<Id>>,
    pub organization_id: Option<Id>,
    /// Any of these statuses. Empty matches any status.
    pub statuses: Vec<ElectionStatus>,
    pub candidate_method: Option<CandidateMethod>,
    /// `start_time <= t`.
    pub started_by: Option<DateTime<Utc>>,
    /// `end_time < t`.
    pub ended_before: Option<DateTime<Utc>>,
    /// `end_time >= t`.
    pub ends_at_or_after: Option<DateTime<Utc>>,
    /// Application window contains `t`.
    pub applications_open_at: Option<DateTime<Utc>>,
}

impl ElectionQuery {
    /// Draft elections whose voting window has opened by `now`.
    pub fn due_for_activation(now: DateTime<Utc>) -> Self {
        Self {
            statuses: vec![ElectionStatus::Draft],
            started_by: Some(now),
            ..Default::default()
        }
    }

    /// Active elections whose voting window ended before `now`.
    pub fn due_for_closing(now: DateTime<Utc>) -> Self {
        Self {
            statuses: vec![ElectionStatus::Active],
            ended_before: Some(now),
            ..Default::default()
        }
    }

    /// Elections in `ids` accepting candidate applications at `now`.
    pub fn accepting_applications(organization_id: Id, ids: Vec<Id>, now: DateTime<Utc>) -> Self {
        Self {
            ids: Some(ids),
            organization_id: Some(organization_id),
            statuses: vec![ElectionStatus::Draft, ElectionStatus::Active],
            candidate_method: Some(CandidateMethod::Application),
            applications_open_at: Some(now),
            ..Default::default()
        }
    }

    /// Elections in `ids` accepting votes at `now`.
    pub fn accepting_votes(organization_id: Id, ids: Vec<Id>, now: DateTime<Utc>) -> Self {
        Self {
            ids: Some(ids),
            organization_id: Some(organization_id),
            statuses: vec![ElectionStatus::Active],
            started_by: Some(now),
            ends_at_or_after: Some(now),
            ..Default::default()
        }
    }

    /// Restrict to the given IDs.
    pub fn with_ids(mut self, ids: impl IntoIterator<Item = Id>) -> Self {
        self.ids = Some(ids.into_iter().collect());
        self
    }

    /// Restrict to one organisation.
    pub fn in_organization(mut self, organization_id: Id) -> Self {
        self.organization_id = Some(organization_id);
        self
    }

    /// Evaluate the criteria against an election.
    pub fn matches(&self, election: &Election) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.contains(&election.id) {
                return false;
            }
        }
        if let Some(organization_id) = self.organization_id {
            if election.organization_id != organization_id {
                return false;
            }
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&election.status) {
            return false;
        }
        if let Some(method) = self.candidate_method {
            if election.candidate_method != method {
                return false;
            }
        }
        if let Some(t) = self.started_by {
            if election.start_time > t {
                return false;
            }
        }
        if let Some(t) = self.ended_before {
            if election.end_time >= t {
                return false;
            }
        }
        if let Some(t) = self.ends_at_or_after {
            if election.end_time < t {
                return false;
            }
        }
        if let Some(t) = self.applications_open_at {
            if !window::application_window_open(
                election.application_start_time,
                election.application_end_time,
                t,
            ) {
                return false;
            }
        }
        true
    }
}

/// Optional enrichments loaded alongside elections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ElectionInclude {
    pub positions: bool,
    pub form_fields: bool,
    /// Load this member's own applications.
    pub applications_of: Option<Id>,
}

impl ElectionInclude {
    /// Just the election records.
    pub fn none() -> Self {
        Self::default()
    }

    /// Everything a member needs to fill in an application.
    pub fn application_form(member_id: Id) -> Self {
        Self {
            positions: true,
            form_fields: true,
            applications_of: Some(member_id),
        }
    }
}

/// An election together with its requested enrichments. Positions and form
/// fields are ordered by their `order` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElectionDetails {
    pub election: Election,
    pub positions: Vec<Position>,
    pub form_fields: Vec<FormField>,
    pub applications: Vec<CandidateApplication>,
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn default_query_matches_everything() {
        let now = Utc::now();
        let election = Election::draft_example(Id::new(), now);
        assert!(ElectionQuery::default().matches(&election));
    }

    #[test]
    fn empty_id_list_matches_nothing() {
        let now = Utc::now();
        let election = Election::active_example(Id::new(), now);
        assert!(!ElectionQuery::default().with_ids([]).matches(&election));
        assert!(ElectionQuery::default()
            .with_ids([election.id])
            .matches(&election));
    }

    #[test]
    fn lifecycle_queries_agree_with_predicates() {
        let now = Utc::now();
        let org = Id::new();
        let at = |hours| now + Duration::hours(hours);
        let elections = [
            Election::example(org, ElectionStatus::Draft, at(0), at(1)),
            Election::example(org, ElectionStatus::Draft, at(1), at(2)),
            Election::example(org, ElectionStatus::Active, at(-2), at(-1)),
            Election::example(org, ElectionStatus::Active, at(-2), at(0)),
            Election::example(org, ElectionStatus::Closed, at(-2), at(-1)),
        ];
        for election in &elections {
            assert_eq!(
                ElectionQuery::due_for_activation(now).matches(election),
                window::due_for_activation(election, now)
            );
            assert_eq!(
                ElectionQuery::due_for_closing(now).matches(election),
                window::due_for_closing(election, now)
            );
        }
    }

    #[test]
    fn eligibility_queries_agree_with_predicates() {
        let now = Utc::now();
        let org = Id::new();
        let open = (Some(now - Duration::hours(1)), Some(now + Duration::hours(1)));
        let mut nominated = Election::active_example(org, now);
        nominated.candidate_method = CandidateMethod::Nomination;
        let elections = [
            Election::active_example(org, now).with_application_window(open.0, open.1),
            Election::draft_example(org, now).with_application_window(open.0, open.1),
            Election::draft_example(org, now).with_application_window(None, None),
            Election::example(org, ElectionStatus::Closed, now - Duration::hours(2), now)
                .with_application_window(open.0, None),
            Election::active_example(org, now).with_application_window(None, open.0),
            nominated,
        ];
        for election in &elections {
            let ids = vec![election.id];
            assert_eq!(
                ElectionQuery::accepting_applications(org, ids.clone(), now).matches(election),
                window::accepts_applications(election, now)
            );
            assert_eq!(
                ElectionQuery::accepting_votes(org, ids, now).matches(election),
                window::accepts_votes(election, now)
            );
        }
    }

    #[test]
    fn organisation_scope_is_enforced() {
        let now = Utc::now();
        let election = Election::active_example(Id::new(), now);
        let query = ElectionQuery::accepting_votes(Id::new(), vec![election.id], now);
        assert!(!query.matches(&election));
        let org = election.organization_id;
        let query = ElectionQuery::accepting_votes(org, vec![election.id], now);
        assert!(query.matches(&election));
    }
}
