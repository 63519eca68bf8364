use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, TokenData, Validation};
use log::warn;
use rocket::{
    http::{Cookie, Status},
    request::{self, FromRequest},
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    error::{Error, Result},
    model::{Id, MemberCode},
};

pub const VOTER_SESSION_COOKIE: &str = "voter_session";

/// The authenticated voter behind a request. Supplied by the session provider;
/// this crate only reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoterSession {
    pub member_id: Id,
    pub organization_id: Id,
    /// The election the member account was created for, if any.
    pub election_id: Option<Id>,
    /// The member code as entered, not necessarily normalised.
    pub member_code: String,
}

impl VoterSession {
    /// The normalised member code, rejecting sessions without one.
    pub fn code(&self) -> Result<MemberCode> {
        let code = MemberCode::new(&self.member_code);
        if code.is_empty() {
            return Err(Error::invalid_session("session has no member code"));
        }
        Ok(code)
    }

    /// Decode and verify a session from its cookie.
    pub fn from_cookie(cookie: &Cookie<'_>, config: &Config) -> Result<Self> {
        let claims = jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|data: TokenData<Claims>| data.claims)?;
        claims.try_into()
    }
}

/// Session cookie claims. IDs travel as hex strings.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(rename = "sub")]
    member_id: String,
    #[serde(rename = "org")]
    organization_id: String,
    #[serde(rename = "elc", default, skip_serializing_if = "Option::is_none")]
    election_id: Option<String>,
    code: String,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

impl TryFrom<Claims> for VoterSession {
    type Error = Error;

    fn try_from(claims: Claims) -> Result<Self> {
        let parse = |field: &str, value: &str| {
            value
                .parse::<Id>()
                .map_err(|_| Error::invalid_session(format!("malformed {field} '{value}'")))
        };
        Ok(Self {
            member_id: parse("member ID", &claims.member_id)?,
            organization_id: parse("organisation ID", &claims.organization_id)?,
            election_id: claims
                .election_id
                .as_deref()
                .map(|id| parse("election ID", id))
                .transpose()?,
            member_code: claims.code,
        })
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for VoterSession {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let config = match req.guard::<&State<Config>>().await {
            request::Outcome::Success(config) => config,
            _ => {
                return request::Outcome::Error((
                    Status::InternalServerError,
                    Error::invalid_session("configuration unavailable"),
                ))
            }
        };
        let cookie = match req.cookies().get(VOTER_SESSION_COOKIE) {
            Some(cookie) => cookie,
            None => return request::Outcome::Forward(Status::Unauthorized),
        };
        match Self::from_cookie(cookie, config) {
            Ok(session) => request::Outcome::Success(session),
            Err(e) => {
                warn!("Rejected voter session: {e}");
                request::Outcome::Error((Status::Unauthorized, e))
            }
        }
    }
}

/// Example data for tests.
#[cfg(test)]
pub mod examples {
    use chrono::Duration;
    use jsonwebtoken::{EncodingKey, Header};

    use super::*;

    impl VoterSession {
        pub fn example(organization_id: Id, election_id: Option<Id>, member_code: &str) -> Self {
            Self {
                member_id: Id::new(),
                organization_id,
                election_id,
                member_code: member_code.to_string(),
            }
        }

        /// Sign this session into a cookie, as the session provider would.
        pub fn into_cookie(self, secret: &[u8], ttl: Duration) -> Cookie<'static> {
            let claims = Claims {
                member_id: self.member_id.to_string(),
                organization_id: self.organization_id.to_string(),
                election_id: self.election_id.map(|id| id.to_string()),
                code: self.member_code,
                expire_at: Utc::now() + ttl,
            };
            let token = jsonwebtoken::encode(
                &Header::default(),
                &claims,
                &EncodingKey::from_secret(secret),
            )
            .unwrap();
            Cookie::new(VOTER_SESSION_COOKIE, token)
        }
    }
}
