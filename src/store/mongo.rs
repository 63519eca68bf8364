use mongodb::{
    bson::{doc, Bson, Document},
    options::FindOptions,
    Client, ClientSession, Database,
};
use rocket::futures::TryStreamExt;

use crate::error::Result;
use crate::model::{
    mongodb::{bson_datetime, Coll},
    CandidateApplication, Election, ElectionQuery, ElectionStatus, FormField, Id, Member,
    MemberCode, Position, VoterCode, VoterCodeStatus,
};

use super::{Store, Transaction};

/// A MongoDB-backed store.
///
/// With `transactions` enabled every reconciliation pass runs in a
/// multi-document transaction, which needs a replica set or sharded cluster.
/// Without it, passes fall back to independent idempotent updates.
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    db: Database,
    transactions: bool,
}

impl MongoStore {
    pub fn new(client: Client, db: Database, transactions: bool) -> Self {
        Self {
            client,
            db,
            transactions,
        }
    }
}

/// Translate election criteria into a MongoDB filter document.
pub fn election_filter(query: &ElectionQuery) -> Document {
    let mut filter = Document::new();
    if let Some(ids) = &query.ids {
        filter.insert("_id", doc! { "$in": id_list(ids) });
    }
    if let Some(organization_id) = query.organization_id {
        filter.insert("organization_id", organization_id);
    }
    if !query.statuses.is_empty() {
        let statuses: Vec<Bson> = query.statuses.iter().map(|s| (*s).into()).collect();
        filter.insert("status", doc! { "$in": statuses });
    }
    if let Some(method) = query.candidate_method {
        filter.insert("candidate_method", method);
    }
    if let Some(t) = query.started_by {
        filter.insert("start_time", doc! { "$lte": bson_datetime(t) });
    }
    let mut end_time = Document::new();
    if let Some(t) = query.ended_before {
        end_time.insert("$lt", bson_datetime(t));
    }
    if let Some(t) = query.ends_at_or_after {
        end_time.insert("$gte", bson_datetime(t));
    }
    if !end_time.is_empty() {
        filter.insert("end_time", end_time);
    }
    if let Some(t) = query.applications_open_at {
        let t = bson_datetime(t);
        // A null comparison also matches a missing field.
        filter.insert(
            "$or",
            vec![
                doc! {
                    "application_start_time": { "$lte": t.clone() },
                    "application_end_time": { "$gte": t.clone() },
                },
                doc! {
                    "application_start_time": null,
                    "application_end_time": { "$gte": t.clone() },
                },
                doc! {
                    "application_start_time": { "$lte": t },
                    "application_end_time": null,
                },
            ],
        );
    }
    filter
}

fn id_list(ids: &[Id]) -> Vec<Bson> {
    ids.iter().map(|id| Bson::from(*id)).collect()
}

fn status_update(ids: &[Id], from: ElectionStatus, to: ElectionStatus) -> (Document, Document) {
    let filter = doc! {
        "_id": { "$in": id_list(ids) },
        "status": from,
    };
    let update = doc! {
        "$set": { "status": to },
    };
    (filter, update)
}

fn deactivation(election_ids: &[Id]) -> (Document, Document) {
    let filter = doc! {
        "election_id": { "$in": id_list(election_ids) },
        "is_active": true,
    };
    let update = doc! {
        "$set": { "is_active": false },
    };
    (filter, update)
}

fn by_start_time() -> FindOptions {
    FindOptions::builder().sort(doc! { "start_time": 1 }).build()
}

#[rocket::async_trait]
impl Store for MongoStore {
    async fn begin<'a>(&'a self) -> Result<Box<dyn Transaction + 'a>> {
        let session = if self.transactions {
            let mut session = self.client.start_session(None).await?;
            session.start_transaction(None).await?;
            Some(session)
        } else {
            None
        };
        Ok(Box::new(MongoTransaction {
            elections: Coll::from_db(&self.db),
            members: Coll::from_db(&self.db),
            session,
        }))
    }

    async fn find_elections(&self, query: &ElectionQuery) -> Result<Vec<Election>> {
        let elections: Vec<Election> = Coll::<Election>::from_db(&self.db)
            .find(election_filter(query), by_start_time())
            .await?
            .try_collect()
            .await?;
        Ok(elections)
    }

    async fn find_voter_codes(
        &self,
        organization_id: Id,
        code: &MemberCode,
        statuses: &[VoterCodeStatus],
    ) -> Result<Vec<VoterCode>> {
        let statuses: Vec<Bson> = statuses.iter().map(|s| (*s).into()).collect();
        let filter = doc! {
            "organization_id": organization_id,
            "code": code.as_str(),
            "status": { "$in": statuses },
        };
        let codes: Vec<VoterCode> = Coll::<VoterCode>::from_db(&self.db)
            .find(filter, None)
            .await?
            .try_collect()
            .await?;
        Ok(codes)
    }

    async fn find_positions(&self, election_ids: &[Id]) -> Result<Vec<Position>> {
        let filter = doc! { "election_id": { "$in": id_list(election_ids) } };
        let positions: Vec<Position> = Coll::<Position>::from_db(&self.db)
            .find(filter, None)
            .await?
            .try_collect()
            .await?;
        Ok(positions)
    }

    async fn find_form_fields(&self, election_ids: &[Id]) -> Result<Vec<FormField>> {
        let filter = doc! { "election_id": { "$in": id_list(election_ids) } };
        let fields: Vec<FormField> = Coll::<FormField>::from_db(&self.db)
            .find(filter, None)
            .await?
            .try_collect()
            .await?;
        Ok(fields)
    }

    async fn find_applications(
        &self,
        member_id: Id,
        election_ids: &[Id],
    ) -> Result<Vec<CandidateApplication>> {
        let filter = doc! {
            "member_id": member_id,
            "election_id": { "$in": id_list(election_ids) },
        };
        let applications: Vec<CandidateApplication> = Coll::from_db(&self.db)
            .find(filter, None)
            .await?
            .try_collect()
            .await?;
        Ok(applications)
    }
}

/// A reconciliation unit of work. Without a session, each write stands alone.
struct MongoTransaction {
    elections: Coll<Election>,
    members: Coll<Member>,
    session: Option<ClientSession>,
}

#[rocket::async_trait]
impl Transaction for MongoTransaction {
    fn is_atomic(&self) -> bool {
        self.session.is_some()
    }

    async fn find_elections(&mut self, query: &ElectionQuery) -> Result<Vec<Election>> {
        let filter = election_filter(query);
        let elections: Vec<Election> = match self.session.as_mut() {
            Some(session) => {
                let mut cursor = self
                    .elections
                    .find_with_session(filter, by_start_time(), session)
                    .await?;
                cursor.stream(session).try_collect().await?
            }
            None => {
                self.elections
                    .find(filter, by_start_time())
                    .await?
                    .try_collect()
                    .await?
            }
        };
        Ok(elections)
    }

    async fn update_status(
        &mut self,
        ids: &[Id],
        from: ElectionStatus,
        to: ElectionStatus,
    ) -> Result<u64> {
        let (filter, update) = status_update(ids, from, to);
        let result = match self.session.as_mut() {
            Some(session) => {
                self.elections
                    .update_many_with_session(filter, update, None, session)
                    .await?
            }
            None => self.elections.update_many(filter, update, None).await?,
        };
        Ok(result.modified_count)
    }

    async fn deactivate_members(&mut self, election_ids: &[Id]) -> Result<u64> {
        let (filter, update) = deactivation(election_ids);
        let result = match self.session.as_mut() {
            Some(session) => {
                self.members
                    .update_many_with_session(filter, update, None, session)
                    .await?
            }
            None => self.members.update_many(filter, update, None).await?,
        };
        Ok(result.modified_count)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        if let Some(mut session) = self.session {
            session.commit_transaction().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    #[test]
    fn activation_filter() {
        let now = Utc::now();
        let filter = election_filter(&ElectionQuery::due_for_activation(now));
        assert_eq!(
            filter.get_document("status").unwrap().get_array("$in").unwrap(),
            &vec![Bson::String("DRAFT".into())]
        );
        assert_eq!(
            filter.get_document("start_time").unwrap().get("$lte"),
            Some(&bson_datetime(now))
        );
        assert!(filter.get("end_time").is_none());
    }

    #[test]
    fn closing_filter_uses_strict_bound() {
        let now = Utc::now();
        let filter = election_filter(&ElectionQuery::due_for_closing(now));
        let end_time = filter.get_document("end_time").unwrap();
        assert_eq!(end_time.get("$lt"), Some(&bson_datetime(now)));
        assert!(end_time.get("$gte").is_none());
    }

    #[test]
    fn voting_filter_scopes_ids_and_organisation() {
        let now = Utc::now();
        let org = Id::new();
        let ids = vec![Id::new(), Id::new()];
        let filter = election_filter(&ElectionQuery::accepting_votes(org, ids.clone(), now));
        assert_eq!(filter.get("organization_id"), Some(&Bson::from(org)));
        assert_eq!(
            filter.get_document("_id").unwrap().get_array("$in").unwrap(),
            &id_list(&ids)
        );
        let end_time = filter.get_document("end_time").unwrap();
        assert_eq!(end_time.get("$gte"), Some(&bson_datetime(now)));
    }

    #[test]
    fn application_filter_requires_a_bound() {
        let now = Utc::now() + Duration::minutes(3);
        let filter = election_filter(&ElectionQuery::accepting_applications(
            Id::new(),
            vec![],
            now,
        ));
        let branches = filter.get_array("$or").unwrap();
        assert_eq!(branches.len(), 3);
        // No branch accepts both bounds being null.
        for branch in branches {
            let branch = branch.as_document().unwrap();
            let both_null = branch.get("application_start_time") == Some(&Bson::Null)
                && branch.get("application_end_time") == Some(&Bson::Null);
            assert!(!both_null);
        }
        assert_eq!(
            filter.get("candidate_method"),
            Some(&Bson::String("APPLICATION".into()))
        );
    }

    #[test]
    fn lifecycle_updates_filter_on_prior_state() {
        let ids = [Id::new()];
        let (filter, update) = status_update(&ids, ElectionStatus::Active, ElectionStatus::Closed);
        assert_eq!(filter.get("status"), Some(&Bson::String("ACTIVE".into())));
        assert_eq!(
            update.get_document("$set").unwrap().get("status"),
            Some(&Bson::String("CLOSED".into()))
        );

        let (filter, update) = deactivation(&ids);
        assert_eq!(filter.get("is_active"), Some(&Bson::Boolean(true)));
        assert_eq!(
            update.get_document("$set").unwrap().get("is_active"),
            Some(&Bson::Boolean(false))
        );
    }
}
