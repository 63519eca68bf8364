use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Normalise a member or voter code for comparison: all whitespace removed, upper-cased.
///
/// Every code comparison goes through this function.
pub fn normalize_code(code: &str) -> String {
    code.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

/// A code that has already been normalised with [`normalize_code`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct MemberCode(String);

impl MemberCode {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(normalize_code(raw.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for MemberCode {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for MemberCode {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<MemberCode> for String {
    fn from(code: MemberCode) -> Self {
        code.0
    }
}

impl Display for MemberCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A voter account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    #[serde(rename = "_id")]
    pub id: Id,
    pub organization_id: Id,
    /// The election this account was created for, if any.
    #[serde(default)]
    pub election_id: Option<Id>,
    pub is_active: bool,
    pub code: MemberCode,
}

/// State of a voter code.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoterCodeStatus {
    Unused,
    Used,
    Revoked,
    Expired,
}

impl VoterCodeStatus {
    /// Statuses under which a code still grants access to its election.
    pub const GRANTING: [VoterCodeStatus; 2] = [VoterCodeStatus::Unused, VoterCodeStatus::Used];
}

impl From<VoterCodeStatus> for mongodb::bson::Bson {
    fn from(status: VoterCodeStatus) -> Self {
        mongodb::bson::to_bson(&status).expect("Serialisation is infallible")
    }
}

/// An access credential tying a code to one election within an organisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterCode {
    #[serde(rename = "_id")]
    pub id: Id,
    pub code: MemberCode,
    pub organization_id: Id,
    pub election_id: Id,
    pub status: VoterCodeStatus,
}

/// Example data for tests.
#[cfg(test)]
pub mod examples {
    use super::*;

    impl Member {
        pub fn example(organization_id: Id, election_id: Option<Id>, code: &str) -> Self {
            Self {
                id: Id::new(),
                organization_id,
                election_id,
                is_active: true,
                code: MemberCode::new(code),
            }
        }
    }

    impl VoterCode {
        pub fn example(organization_id: Id, election_id: Id, code: &str) -> Self {
            Self {
                id: Id::new(),
                code: MemberCode::new(code),
                organization_id,
                election_id,
                status: VoterCodeStatus::Unused,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalisation_ignores_case_and_whitespace() {
        assert_eq!(normalize_code(" ab cd "), normalize_code("ABCD"));
        assert_eq!(normalize_code("\tm-12\n 3x"), "M-123X");
        assert_eq!(normalize_code("   "), "");
    }

    #[test]
    fn normalisation_is_idempotent() {
        for raw in [" ab cd ", "ABCD", "straße 9", "q\u{00a0}r", "", "Ünï côde"] {
            let once = normalize_code(raw);
            assert_eq!(normalize_code(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn member_code_normalises_on_deserialisation() {
        let code: MemberCode = mongodb::bson::from_bson(" x y z ".into()).unwrap();
        assert_eq!(code.as_str(), "XYZ");
    }

    #[test]
    fn only_unused_and_used_codes_grant_access() {
        let granting = VoterCodeStatus::GRANTING;
        assert!(granting.contains(&VoterCodeStatus::Unused));
        assert!(granting.contains(&VoterCodeStatus::Used));
        assert!(!granting.contains(&VoterCodeStatus::Revoked));
        assert!(!granting.contains(&VoterCodeStatus::Expired));
    }
}
