//! API-friendly views of the core types, with string IDs and RFC 3339 times.

use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::access::AccessibleElections;
use crate::model::{
    ApplicationStatus, CandidateApplication, CandidateMethod, Election, ElectionDetails,
    ElectionStatus, FormField, Id, Position,
};

/// An API-friendly ID that serializes to a string rather than a nested struct.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ApiId(Id);

impl Debug for ApiId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl Display for ApiId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ApiId {
    type Err = mongodb::bson::oid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse::<Id>()?))
    }
}

impl TryFrom<String> for ApiId {
    type Error = mongodb::bson::oid::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ApiId> for String {
    fn from(id: ApiId) -> Self {
        id.to_string()
    }
}

impl From<Id> for ApiId {
    fn from(id: Id) -> Self {
        Self(id)
    }
}

impl Deref for ApiId {
    type Target = Id;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// A summary of an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionSummary {
    pub id: ApiId,
    pub organization_id: ApiId,
    pub name: String,
    pub status: ElectionStatus,
    pub candidate_method: CandidateMethod,
    pub application_start_time: Option<DateTime<Utc>>,
    pub application_end_time: Option<DateTime<Utc>>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl From<Election> for ElectionSummary {
    fn from(election: Election) -> Self {
        Self {
            id: election.id.into(),
            organization_id: election.organization_id.into(),
            name: election.name,
            status: election.status,
            candidate_method: election.candidate_method,
            application_start_time: election.application_start_time,
            application_end_time: election.application_end_time,
            start_time: election.start_time,
            end_time: election.end_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionDesc {
    pub id: ApiId,
    pub title: String,
    pub order: i32,
}

impl From<Position> for PositionDesc {
    fn from(position: Position) -> Self {
        Self {
            id: position.id.into(),
            title: position.title,
            order: position.order,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormFieldDesc {
    pub id: ApiId,
    pub label: String,
    pub required: bool,
    pub order: i32,
}

impl From<FormField> for FormFieldDesc {
    fn from(field: FormField) -> Self {
        Self {
            id: field.id.into(),
            label: field.label,
            required: field.required,
            order: field.order,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationDesc {
    pub id: ApiId,
    pub position_id: ApiId,
    pub status: ApplicationStatus,
}

impl From<CandidateApplication> for ApplicationDesc {
    fn from(application: CandidateApplication) -> Self {
        Self {
            id: application.id.into(),
            position_id: application.position_id.into(),
            status: application.status,
        }
    }
}

/// An election open for applications, with what the application form needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationElection {
    #[serde(flatten)]
    pub election: ElectionSummary,
    pub positions: Vec<PositionDesc>,
    pub form_fields: Vec<FormFieldDesc>,
    /// The requesting member's own applications.
    pub applications: Vec<ApplicationDesc>,
}

impl From<ElectionDetails> for ApplicationElection {
    fn from(details: ElectionDetails) -> Self {
        Self {
            election: details.election.into(),
            positions: details.positions.into_iter().map(Into::into).collect(),
            form_fields: details.form_fields.into_iter().map(Into::into).collect(),
            applications: details.applications.into_iter().map(Into::into).collect(),
        }
    }
}

/// Everything a voter can currently act on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterElections {
    pub application_eligible: Vec<ApplicationElection>,
    pub voting_eligible: Vec<ElectionSummary>,
}

impl From<AccessibleElections> for VoterElections {
    fn from(elections: AccessibleElections) -> Self {
        Self {
            application_eligible: elections
                .application_eligible
                .into_iter()
                .map(Into::into)
                .collect(),
            voting_eligible: elections
                .voting_eligible
                .into_iter()
                .map(Into::into)
                .collect(),
        }
    }
}
