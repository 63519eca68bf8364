//! Works out which elections a voter session may see, and which of those it
//! can currently apply to or vote in.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use log::debug;
use rocket::{
    http::Status,
    request::{self, FromRequest, Request},
    State,
};

use crate::error::{Error, Result};
use crate::lifecycle::{LifecycleEngine, Reconciled};
use crate::model::{
    Election, ElectionDetails, ElectionInclude, ElectionQuery, Id, VoterCodeStatus, VoterSession,
};
use crate::store::{load_details, SharedStore};

pub mod window;

/// The elections a voter can act on right now.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessibleElections {
    /// Elections open for candidate applications, with positions, form
    /// fields and the voter's own applications attached.
    pub application_eligible: Vec<ElectionDetails>,
    /// Elections open for voting.
    pub voting_eligible: Vec<Election>,
}

#[derive(Clone)]
pub struct AccessResolver {
    store: SharedStore,
}

impl AccessResolver {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// The IDs of every election visible to `session`: its own election, plus
    /// the election of every unused or used voter code matching its member code.
    pub async fn accessible_election_ids(&self, session: &VoterSession) -> Result<HashSet<Id>> {
        let code = session.code()?;
        let mut ids = HashSet::new();
        if let Some(election_id) = session.election_id {
            ids.insert(election_id);
        }
        let codes = self
            .store
            .find_voter_codes(session.organization_id, &code, &VoterCodeStatus::GRANTING)
            .await?;
        ids.extend(codes.into_iter().map(|code| code.election_id));
        debug!(
            "Member {} can access {} election(s)",
            session.member_id,
            ids.len()
        );
        Ok(ids)
    }

    /// Elections among `ids` accepting candidate applications at `now`.
    pub async fn application_eligible(
        &self,
        session: &VoterSession,
        ids: &HashSet<Id>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ElectionDetails>> {
        let query = ElectionQuery::accepting_applications(
            session.organization_id,
            ids.iter().copied().collect(),
            now,
        );
        let elections = self.store.find_elections(&query).await?;
        load_details(
            self.store.as_ref(),
            elections,
            ElectionInclude::application_form(session.member_id),
        )
        .await
    }

    /// Elections among `ids` accepting votes at `now`.
    pub async fn voting_eligible(
        &self,
        session: &VoterSession,
        ids: &HashSet<Id>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Election>> {
        let ids = ids.iter().copied().collect();
        let query = ElectionQuery::accepting_votes(session.organization_id, ids, now);
        self.store.find_elections(&query).await
    }

    /// Both eligibility lists for `session`, as persisted. Any lookup failure
    /// fails the whole resolution.
    pub async fn resolve(
        &self,
        session: &VoterSession,
        now: DateTime<Utc>,
    ) -> Result<AccessibleElections> {
        let ids = self.accessible_election_ids(session).await?;
        if ids.is_empty() {
            return Ok(AccessibleElections::default());
        }
        Ok(AccessibleElections {
            application_eligible: self.application_eligible(session, &ids, now).await?,
            voting_eligible: self.voting_eligible(session, &ids, now).await?,
        })
    }

    /// Reconcile election statuses, then resolve. A failed reconciliation is
    /// logged and reported alongside the result; it does not fail the call.
    pub async fn resolve_reconciled(
        &self,
        session: &VoterSession,
        now: DateTime<Utc>,
    ) -> Result<Reconciled<AccessibleElections>> {
        let reconciliation = self.engine().reconcile_for_read(now).await;
        let data = self.resolve(session, now).await?;
        Ok(Reconciled {
            data,
            reconciliation,
        })
    }

    /// Reconcile election statuses, then list the elections `session` can
    /// apply to.
    pub async fn application_eligible_reconciled(
        &self,
        session: &VoterSession,
        now: DateTime<Utc>,
    ) -> Result<Reconciled<Vec<ElectionDetails>>> {
        let reconciliation = self.engine().reconcile_for_read(now).await;
        let ids = self.accessible_election_ids(session).await?;
        let data = self.application_eligible(session, &ids, now).await?;
        Ok(Reconciled {
            data,
            reconciliation,
        })
    }

    /// Reconcile election statuses, then list the elections `session` can
    /// vote in.
    pub async fn voting_eligible_reconciled(
        &self,
        session: &VoterSession,
        now: DateTime<Utc>,
    ) -> Result<Reconciled<Vec<Election>>> {
        let reconciliation = self.engine().reconcile_for_read(now).await;
        let ids = self.accessible_election_ids(session).await?;
        let data = self.voting_eligible(session, &ids, now).await?;
        Ok(Reconciled {
            data,
            reconciliation,
        })
    }

    /// One election, if `session` can access it.
    pub async fn accessible_election(
        &self,
        session: &VoterSession,
        election_id: Id,
        now: DateTime<Utc>,
    ) -> Result<Reconciled<ElectionDetails>> {
        let ids = self.accessible_election_ids(session).await?;
        if !ids.contains(&election_id) {
            return Err(Error::not_found(format!(
                "No accessible election with ID {election_id}"
            )));
        }
        let query = ElectionQuery::default()
            .with_ids([election_id])
            .in_organization(session.organization_id);
        let reconciled = self
            .engine()
            .fetch_election_reconciled(
                &query,
                ElectionInclude::application_form(session.member_id),
                now,
            )
            .await?;
        match reconciled.data {
            Some(data) => Ok(Reconciled {
                data,
                reconciliation: reconciled.reconciliation,
            }),
            None => Err(Error::not_found(format!(
                "No election found with ID {election_id}"
            ))),
        }
    }

    fn engine(&self) -> LifecycleEngine {
        LifecycleEngine::new(self.store.clone())
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AccessResolver {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        match req.guard::<&State<SharedStore>>().await {
            request::Outcome::Success(store) => {
                request::Outcome::Success(AccessResolver::new(store.inner().clone()))
            }
            _ => request::Outcome::Error((Status::InternalServerError, ())),
        }
    }
}
