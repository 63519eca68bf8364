use std::sync::Arc;

use rocket::tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::Result;
use crate::model::{
    CandidateApplication, Election, ElectionQuery, ElectionStatus, FormField, Id, Member,
    MemberCode, Position, VoterCode, VoterCodeStatus,
};

use super::{Store, Transaction};

#[derive(Debug, Default, Clone)]
struct Tables {
    elections: Vec<Election>,
    members: Vec<Member>,
    voter_codes: Vec<VoterCode>,
    positions: Vec<Position>,
    form_fields: Vec<FormField>,
    applications: Vec<CandidateApplication>,
}

impl Tables {
    fn find_elections(&self, query: &ElectionQuery) -> Vec<Election> {
        let mut found: Vec<_> = self
            .elections
            .iter()
            .filter(|election| query.matches(election))
            .cloned()
            .collect();
        found.sort_by_key(|election| election.start_time);
        found
    }

    fn update_status(&mut self, ids: &[Id], from: ElectionStatus, to: ElectionStatus) -> u64 {
        let mut modified = 0;
        for election in &mut self.elections {
            if election.status == from && ids.contains(&election.id) {
                election.status = to;
                modified += 1;
            }
        }
        modified
    }

    fn deactivate_members(&mut self, election_ids: &[Id]) -> u64 {
        let mut modified = 0;
        for member in &mut self.members {
            let tied = member
                .election_id
                .map_or(false, |id| election_ids.contains(&id));
            if tied && member.is_active {
                member.is_active = false;
                modified += 1;
            }
        }
        modified
    }
}

/// An in-process store.
///
/// Atomic stores (the default) stage a reconciliation pass on a private copy
/// and hold the store lock until it commits or is dropped. Best-effort stores
/// apply each write immediately, like a MongoDB deployment without
/// transactions.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    atomic: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Default::default(),
            atomic: true,
        }
    }

    pub fn best_effort() -> Self {
        Self {
            tables: Default::default(),
            atomic: false,
        }
    }

    pub async fn insert_election(&self, election: Election) {
        self.tables.lock().await.elections.push(election);
    }

    pub async fn insert_member(&self, member: Member) {
        self.tables.lock().await.members.push(member);
    }

    pub async fn insert_voter_code(&self, code: VoterCode) {
        self.tables.lock().await.voter_codes.push(code);
    }

    pub async fn insert_position(&self, position: Position) {
        self.tables.lock().await.positions.push(position);
    }

    pub async fn insert_form_field(&self, field: FormField) {
        self.tables.lock().await.form_fields.push(field);
    }

    pub async fn insert_application(&self, application: CandidateApplication) {
        self.tables.lock().await.applications.push(application);
    }

    pub async fn election(&self, id: Id) -> Option<Election> {
        let tables = self.tables.lock().await;
        tables.elections.iter().find(|e| e.id == id).cloned()
    }

    pub async fn member(&self, id: Id) -> Option<Member> {
        let tables = self.tables.lock().await;
        tables.members.iter().find(|m| m.id == id).cloned()
    }

    /// A snapshot of every election and member.
    pub async fn snapshot(&self) -> (Vec<Election>, Vec<Member>) {
        let tables = self.tables.lock().await;
        (tables.elections.clone(), tables.members.clone())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[rocket::async_trait]
impl Store for MemoryStore {
    async fn begin<'a>(&'a self) -> Result<Box<dyn Transaction + 'a>> {
        if self.atomic {
            let guard = self.tables.clone().lock_owned().await;
            let staged = (*guard).clone();
            Ok(Box::new(StagedTransaction { guard, staged }))
        } else {
            Ok(Box::new(WriteThroughTransaction {
                tables: self.tables.clone(),
            }))
        }
    }

    async fn find_elections(&self, query: &ElectionQuery) -> Result<Vec<Election>> {
        Ok(self.tables.lock().await.find_elections(query))
    }

    async fn find_voter_codes(
        &self,
        organization_id: Id,
        code: &MemberCode,
        statuses: &[VoterCodeStatus],
    ) -> Result<Vec<VoterCode>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .voter_codes
            .iter()
            .filter(|c| {
                c.organization_id == organization_id
                    && &c.code == code
                    && statuses.contains(&c.status)
            })
            .cloned()
            .collect())
    }

    async fn find_positions(&self, election_ids: &[Id]) -> Result<Vec<Position>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .positions
            .iter()
            .filter(|p| election_ids.contains(&p.election_id))
            .cloned()
            .collect())
    }

    async fn find_form_fields(&self, election_ids: &[Id]) -> Result<Vec<FormField>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .form_fields
            .iter()
            .filter(|f| election_ids.contains(&f.election_id))
            .cloned()
            .collect())
    }

    async fn find_applications(
        &self,
        member_id: Id,
        election_ids: &[Id],
    ) -> Result<Vec<CandidateApplication>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .applications
            .iter()
            .filter(|a| a.member_id == member_id && election_ids.contains(&a.election_id))
            .cloned()
            .collect())
    }
}

/// Writes go to a private copy, swapped in on commit.
struct StagedTransaction {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
}

#[rocket::async_trait]
impl Transaction for StagedTransaction {
    fn is_atomic(&self) -> bool {
        true
    }

    async fn find_elections(&mut self, query: &ElectionQuery) -> Result<Vec<Election>> {
        Ok(self.staged.find_elections(query))
    }

    async fn update_status(
        &mut self,
        ids: &[Id],
        from: ElectionStatus,
        to: ElectionStatus,
    ) -> Result<u64> {
        Ok(self.staged.update_status(ids, from, to))
    }

    async fn deactivate_members(&mut self, election_ids: &[Id]) -> Result<u64> {
        Ok(self.staged.deactivate_members(election_ids))
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let StagedTransaction { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}

/// Writes are applied immediately.
struct WriteThroughTransaction {
    tables: Arc<Mutex<Tables>>,
}

#[rocket::async_trait]
impl Transaction for WriteThroughTransaction {
    fn is_atomic(&self) -> bool {
        false
    }

    async fn find_elections(&mut self, query: &ElectionQuery) -> Result<Vec<Election>> {
        Ok(self.tables.lock().await.find_elections(query))
    }

    async fn update_status(
        &mut self,
        ids: &[Id],
        from: ElectionStatus,
        to: ElectionStatus,
    ) -> Result<u64> {
        Ok(self.tables.lock().await.update_status(ids, from, to))
    }

    async fn deactivate_members(&mut self, election_ids: &[Id]) -> Result<u64> {
        Ok(self.tables.lock().await.deactivate_members(election_ids))
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[rocket::async_test]
    async fn staged_writes_are_discarded_without_commit() {
        let store = MemoryStore::new();
        let election = Election::draft_example(Id::new(), Utc::now());
        store.insert_election(election.clone()).await;

        {
            let mut txn = store.begin().await.unwrap();
            assert!(txn.is_atomic());
            let modified = txn
                .update_status(&[election.id], ElectionStatus::Draft, ElectionStatus::Active)
                .await
                .unwrap();
            assert_eq!(modified, 1);
            // The transaction sees its own write.
            let active = txn
                .find_elections(&ElectionQuery {
                    statuses: vec![ElectionStatus::Active],
                    ..Default::default()
                })
                .await
                .unwrap();
            assert_eq!(active.len(), 1);
        }

        let stored = store.election(election.id).await.unwrap();
        assert_eq!(stored.status, ElectionStatus::Draft);
    }

    #[rocket::async_test]
    async fn staged_writes_are_visible_after_commit() {
        let store = MemoryStore::new();
        let election = Election::draft_example(Id::new(), Utc::now());
        store.insert_election(election.clone()).await;

        let mut txn = store.begin().await.unwrap();
        txn.update_status(&[election.id], ElectionStatus::Draft, ElectionStatus::Active)
            .await
            .unwrap();
        txn.commit().await.unwrap();

        let stored = store.election(election.id).await.unwrap();
        assert_eq!(stored.status, ElectionStatus::Active);
    }

    #[rocket::async_test]
    async fn best_effort_writes_apply_immediately() {
        let store = MemoryStore::best_effort();
        let election = Election::draft_example(Id::new(), Utc::now());
        store.insert_election(election.clone()).await;

        {
            let mut txn = store.begin().await.unwrap();
            assert!(!txn.is_atomic());
            txn.update_status(&[election.id], ElectionStatus::Draft, ElectionStatus::Active)
                .await
                .unwrap();
        }

        let stored = store.election(election.id).await.unwrap();
        assert_eq!(stored.status, ElectionStatus::Active);
    }

    #[rocket::async_test]
    async fn status_update_requires_the_prior_status() {
        let store = MemoryStore::new();
        let election = Election::draft_example(Id::new(), Utc::now());
        store.insert_election(election.clone()).await;

        let mut txn = store.begin().await.unwrap();
        let modified = txn
            .update_status(&[election.id], ElectionStatus::Active, ElectionStatus::Closed)
            .await
            .unwrap();
        assert_eq!(modified, 0);
    }

    #[rocket::async_test]
    async fn deactivation_only_touches_active_members_of_the_election() {
        let store = MemoryStore::new();
        let org = Id::new();
        let election = Id::new();
        let tied = Member::example(org, Some(election), "a");
        let mut already_inactive = Member::example(org, Some(election), "b");
        already_inactive.is_active = false;
        let elsewhere = Member::example(org, Some(Id::new()), "c");
        let untied = Member::example(org, None, "d");
        for member in [&tied, &already_inactive, &elsewhere, &untied] {
            store.insert_member(member.clone()).await;
        }

        let mut txn = store.begin().await.unwrap();
        assert_eq!(txn.deactivate_members(&[election]).await.unwrap(), 1);
        txn.commit().await.unwrap();

        assert!(!store.member(tied.id).await.unwrap().is_active);
        assert!(store.member(elsewhere.id).await.unwrap().is_active);
        assert!(store.member(untied.id).await.unwrap().is_active);
    }
}
