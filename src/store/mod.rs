//! The storage contract the core runs against, plus its implementations.

use std::sync::Arc;

use crate::error::Result;
use crate::model::{
    CandidateApplication, Election, ElectionDetails, ElectionInclude, ElectionQuery,
    ElectionStatus, FormField, Id, MemberCode, Position, VoterCode, VoterCodeStatus,
};

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::{election_filter, MongoStore};

/// A store shared between requests.
pub type SharedStore = Arc<dyn Store>;

/// Read access to persisted elections and their related records, and the
/// entry point for lifecycle writes.
#[rocket::async_trait]
pub trait Store: Send + Sync {
    /// Open a unit of work for a reconciliation pass.
    async fn begin<'a>(&'a self) -> Result<Box<dyn Transaction + 'a>>;

    /// All elections matching `query`, ordered by voting start time.
    async fn find_elections(&self, query: &ElectionQuery) -> Result<Vec<Election>>;

    /// Voter codes in `organization_id` equal to `code` with one of `statuses`.
    async fn find_voter_codes(
        &self,
        organization_id: Id,
        code: &MemberCode,
        statuses: &[VoterCodeStatus],
    ) -> Result<Vec<VoterCode>>;

    /// Positions belonging to any of the given elections.
    async fn find_positions(&self, election_ids: &[Id]) -> Result<Vec<Position>>;

    /// Application form fields belonging to any of the given elections.
    async fn find_form_fields(&self, election_ids: &[Id]) -> Result<Vec<FormField>>;

    /// A member's applications to any of the given elections.
    async fn find_applications(
        &self,
        member_id: Id,
        election_ids: &[Id],
    ) -> Result<Vec<CandidateApplication>>;
}

/// A unit of work over elections and members.
///
/// When [`Transaction::is_atomic`] holds, nothing is visible to other readers
/// until [`Transaction::commit`], and dropping the transaction discards its
/// writes. Otherwise every write is applied as soon as it returns.
#[rocket::async_trait]
pub trait Transaction: Send {
    fn is_atomic(&self) -> bool;

    /// Elections matching `query`, including this transaction's own writes.
    async fn find_elections(&mut self, query: &ElectionQuery) -> Result<Vec<Election>>;

    /// Move the given elections from `from` to `to`. Elections not currently
    /// in `from` are left alone. Returns how many were changed.
    async fn update_status(
        &mut self,
        ids: &[Id],
        from: ElectionStatus,
        to: ElectionStatus,
    ) -> Result<u64>;

    /// Deactivate every active member tied to one of the given elections.
    /// Returns how many were changed.
    async fn deactivate_members(&mut self, election_ids: &[Id]) -> Result<u64>;

    async fn commit(self: Box<Self>) -> Result<()>;
}

/// Attach the requested enrichments to each election. Positions and form
/// fields come back sorted by their `order` field.
pub async fn load_details(
    store: &dyn Store,
    elections: Vec<Election>,
    include: ElectionInclude,
) -> Result<Vec<ElectionDetails>> {
    let ids: Vec<Id> = elections.iter().map(|election| election.id).collect();
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut positions = if include.positions {
        store.find_positions(&ids).await?
    } else {
        Vec::new()
    };
    positions.sort_by_key(|position| position.order);

    let mut form_fields = if include.form_fields {
        store.find_form_fields(&ids).await?
    } else {
        Vec::new()
    };
    form_fields.sort_by_key(|field| field.order);

    let applications = match include.applications_of {
        Some(member_id) => store.find_applications(member_id, &ids).await?,
        None => Vec::new(),
    };

    Ok(elections
        .into_iter()
        .map(|election| {
            let id = election.id;
            ElectionDetails {
                positions: positions
                    .iter()
                    .filter(|p| p.election_id == id)
                    .cloned()
                    .collect(),
                form_fields: form_fields
                    .iter()
                    .filter(|f| f.election_id == id)
                    .cloned()
                    .collect(),
                applications: applications
                    .iter()
                    .filter(|a| a.election_id == id)
                    .cloned()
                    .collect(),
                election,
            }
        })
        .collect())
}
