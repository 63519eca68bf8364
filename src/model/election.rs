use chrono::{DateTime, Utc};
use mongodb::bson::{serde_helpers::chrono_datetime_as_bson_datetime, to_bson, Bson};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::{optional_chrono_datetime, Id};

/// States in the election lifecycle. Progression is forward-only.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElectionStatus {
    /// Created, voting has not started.
    Draft,
    /// Voting window is open.
    Active,
    /// Voting window has passed.
    Closed,
}

impl From<ElectionStatus> for Bson {
    fn from(status: ElectionStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}

/// How candidates enter an election.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CandidateMethod {
    /// Members apply through the application form.
    Application,
    /// Candidates are entered by the organisation.
    Nomination,
}

impl From<CandidateMethod> for Bson {
    fn from(method: CandidateMethod) -> Self {
        to_bson(&method).expect("Serialisation is infallible")
    }
}

/// An election, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    /// Unique ID.
    #[serde(rename = "_id")]
    pub id: Id,
    /// Owning organisation.
    pub organization_id: Id,
    /// Display name.
    pub name: String,
    /// Lifecycle status.
    pub status: ElectionStatus,
    /// Whether candidates apply or are nominated.
    pub candidate_method: CandidateMethod,
    /// Application window opening, if bounded.
    #[serde(default, with = "optional_chrono_datetime")]
    pub application_start_time: Option<DateTime<Utc>>,
    /// Application window closing, if bounded.
    #[serde(default, with = "optional_chrono_datetime")]
    pub application_end_time: Option<DateTime<Utc>>,
    /// Voting window opening.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_time: DateTime<Utc>,
    /// Voting window closing.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_time: DateTime<Utc>,
}

/// A position candidates can stand for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    #[serde(rename = "_id")]
    pub id: Id,
    pub election_id: Id,
    pub title: String,
    pub order: i32,
}

/// A field on an election's candidate application form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    #[serde(rename = "_id")]
    pub id: Id,
    pub election_id: Id,
    pub label: String,
    pub required: bool,
    pub order: i32,
}

/// Review state of a candidate application.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

/// A member's application to stand for a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateApplication {
    #[serde(rename = "_id")]
    pub id: Id,
    pub election_id: Id,
    pub position_id: Id,
    pub member_id: Id,
    pub status: ApplicationStatus,
}

/// Example data for tests.
#[cfg(test)]
pub mod examples {
    use chrono::Duration;

    use super::*;

    impl Election {
        /// An application-method election in `status`, voting from `start` to `end`,
        /// with no application window.
        pub fn example(
            organization_id: Id,
            status: ElectionStatus,
            start_time: DateTime<Utc>,
            end_time: DateTime<Utc>,
        ) -> Self {
            Self {
                id: Id::new(),
                organization_id,
                name: "Board of Trustees".to_string(),
                status,
                candidate_method: CandidateMethod::Application,
                application_start_time: None,
                application_end_time: None,
                start_time,
                end_time,
            }
        }

        /// A draft election whose voting opens one day after `now`.
        pub fn draft_example(organization_id: Id, now: DateTime<Utc>) -> Self {
            Self::example(
                organization_id,
                ElectionStatus::Draft,
                now + Duration::days(1),
                now + Duration::days(2),
            )
        }

        /// An active election whose voting window surrounds `now`.
        pub fn active_example(organization_id: Id, now: DateTime<Utc>) -> Self {
            Self::example(
                organization_id,
                ElectionStatus::Active,
                now - Duration::hours(1),
                now + Duration::hours(1),
            )
        }

        /// Set the application window.
        pub fn with_application_window(
            mut self,
            start: Option<DateTime<Utc>>,
            end: Option<DateTime<Utc>>,
        ) -> Self {
            self.application_start_time = start;
            self.application_end_time = end;
            self
        }
    }

    impl Position {
        pub fn example(election_id: Id, title: &str, order: i32) -> Self {
            Self {
                id: Id::new(),
                election_id,
                title: title.to_string(),
                order,
            }
        }
    }

    impl FormField {
        pub fn example(election_id: Id, label: &str, order: i32) -> Self {
            Self {
                id: Id::new(),
                election_id,
                label: label.to_string(),
                required: true,
                order,
            }
        }
    }

    impl CandidateApplication {
        pub fn example(position: &Position, member_id: Id) -> Self {
            Self {
                id: Id::new(),
                election_id: position.election_id,
                position_id: position.id,
                member_id,
                status: ApplicationStatus::Pending,
            }
        }
    }
}
