use std::ops::Deref;

use log::debug;
use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::{CandidateApplication, Election, FormField, Member, Position, VoterCode};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl MongoCollection for Election {
    const NAME: &'static str = "elections";
}

impl MongoCollection for Member {
    const NAME: &'static str = "members";
}

impl MongoCollection for VoterCode {
    const NAME: &'static str = "voter_codes";
}

impl MongoCollection for Position {
    const NAME: &'static str = "positions";
}

impl MongoCollection for FormField {
    const NAME: &'static str = "form_fields";
}

impl MongoCollection for CandidateApplication {
    const NAME: &'static str = "applications";
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let plain = IndexOptions::builder().build();

    // Lifecycle scans.
    let election_index = IndexModel::builder()
        .keys(doc! {"status": 1, "start_time": 1, "end_time": 1})
        .options(plain.clone())
        .build();
    Coll::<Election>::from_db(db)
        .create_index(election_index, None)
        .await?;

    // Close cascade.
    let member_index = IndexModel::builder()
        .keys(doc! {"election_id": 1, "is_active": 1})
        .options(plain.clone())
        .build();
    Coll::<Member>::from_db(db)
        .create_index(member_index, None)
        .await?;

    // Access lookups by organisation and normalised code.
    let code_index = IndexModel::builder()
        .keys(doc! {"organization_id": 1, "code": 1})
        .options(plain.clone())
        .build();
    Coll::<VoterCode>::from_db(db)
        .create_index(code_index, None)
        .await?;

    // Enrichment lookups.
    let by_election = doc! {"election_id": 1, "order": 1};
    Coll::<Position>::from_db(db)
        .create_index(
            IndexModel::builder()
                .keys(by_election.clone())
                .options(plain.clone())
                .build(),
            None,
        )
        .await?;
    Coll::<FormField>::from_db(db)
        .create_index(
            IndexModel::builder()
                .keys(by_election)
                .options(plain.clone())
                .build(),
            None,
        )
        .await?;
    let application_index = IndexModel::builder()
        .keys(doc! {"member_id": 1, "election_id": 1})
        .options(plain)
        .build();
    Coll::<CandidateApplication>::from_db(db)
        .create_index(application_index, None)
        .await?;

    Ok(())
}
