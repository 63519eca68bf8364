use chrono::Utc;
use rocket::{serde::json::Json, Route};

use crate::{
    access::AccessResolver,
    error::Result,
    model::{
        api::{ApplicationElection, ElectionSummary, VoterElections},
        Id, VoterSession,
    },
};

pub fn routes() -> Vec<Route> {
    routes![
        voter_elections,
        application_elections,
        voting_elections,
        voter_election
    ]
}

/// Everything the voter can currently apply to or vote in.
#[get("/voter/elections")]
async fn voter_elections(
    session: VoterSession,
    resolver: AccessResolver,
) -> Result<Json<VoterElections>> {
    let resolved = resolver.resolve_reconciled(&session, Utc::now()).await?;
    Ok(Json(resolved.into_inner().into()))
}

#[get("/voter/elections/apply")]
async fn application_elections(
    session: VoterSession,
    resolver: AccessResolver,
) -> Result<Json<Vec<ApplicationElection>>> {
    let elections = resolver
        .application_eligible_reconciled(&session, Utc::now())
        .await?;
    Ok(Json(elections.into_inner().into_iter().map(Into::into).collect()))
}

#[get("/voter/elections/vote")]
async fn voting_elections(
    session: VoterSession,
    resolver: AccessResolver,
) -> Result<Json<Vec<ElectionSummary>>> {
    let elections = resolver
        .voting_eligible_reconciled(&session, Utc::now())
        .await?;
    Ok(Json(elections.into_inner().into_iter().map(Into::into).collect()))
}

#[get("/voter/elections/<election_id>")]
async fn voter_election(
    session: VoterSession,
    resolver: AccessResolver,
    election_id: Id,
) -> Result<Json<ApplicationElection>> {
    let election = resolver
        .accessible_election(&session, election_id, Utc::now())
        .await?;
    Ok(Json(election.into_inner().into()))
}
