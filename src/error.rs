use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use log::debug;
use mongodb::error::Error as DbError;
use rocket::{http::Status, response::Responder};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The backing store could not be reached or timed out.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
    /// The voter session is missing or malformed.
    #[error("Invalid session: {0}")]
    InvalidSession(String),
    /// A non-atomic reconciliation pass failed after committing some of its writes.
    #[error(
        "Reconciliation failed after activating {activated}, closing {closed} \
         and deactivating {deactivated_members} members: {cause}"
    )]
    PartialReconciliation {
        activated: u64,
        closed: u64,
        deactivated_members: u64,
        cause: Box<Error>,
    },
    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_session(why: impl Into<String>) -> Self {
        Self::InvalidSession(why.into())
    }
}

impl From<DbError> for Error {
    fn from(err: DbError) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}

impl From<JwtError> for Error {
    fn from(err: JwtError) -> Self {
        match err.kind() {
            JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                Self::InvalidSession("session has expired".to_string())
            }
            _ => Self::InvalidSession(err.to_string()),
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        debug!("Responding with error: {self}");
        Err(match self {
            Self::StorageUnavailable(_) => Status::ServiceUnavailable,
            Self::InvalidSession(_) => Status::Unauthorized,
            Self::PartialReconciliation { .. } => Status::InternalServerError,
            Self::NotFound(_) => Status::NotFound,
        })
    }
}
