//! Persisted data types, query criteria and their API views.

pub mod api;
mod election;
mod member;
pub mod mongodb;
mod query;
mod session;

pub use election::{
    ApplicationStatus, CandidateApplication, CandidateMethod, Election, ElectionStatus, FormField,
    Position,
};
pub use member::{normalize_code, Member, MemberCode, VoterCode, VoterCodeStatus};
pub use self::mongodb::Id;
pub use query::{ElectionDetails, ElectionInclude, ElectionQuery};
pub use session::{VoterSession, VOTER_SESSION_COOKIE};
