//! Database enum types for the lead tracking schema.
//!
//! Every enum is stored as a TEXT column holding its SCREAMING_SNAKE_CASE
//! name, which is also its JSON representation.

use diesel::deserialize::{self, FromSql};
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::Text;
use diesel::{AsExpression, FromSqlRow};
use serde::{Deserialize, Serialize};
use std::io::Write;

// ============================================================================
// ROLES
// ============================================================================

/// Position of a user in the management hierarchy.
///
/// `Unrecognized` is what any unknown role string decodes to. It is never
/// part of an allow-list and resolves to a self-only scope.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Cco,
    Director,
    SrManager,
    Manager,
    Agent,
    #[default]
    #[serde(other)]
    Unrecognized,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Self::Admin,
        Self::Cco,
        Self::Director,
        Self::SrManager,
        Self::Manager,
        Self::Agent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Cco => "CCO",
            Self::Director => "DIRECTOR",
            Self::SrManager => "SR_MANAGER",
            Self::Manager => "MANAGER",
            Self::Agent => "AGENT",
            Self::Unrecognized => "UNRECOGNIZED",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Self::Admin,
            "CCO" => Self::Cco,
            "DIRECTOR" => Self::Director,
            "SR_MANAGER" => Self::SrManager,
            "MANAGER" => Self::Manager,
            "AGENT" => Self::Agent,
            _ => Self::Unrecognized,
        })
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql<Text, Pg> for Role {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<Text, Pg> for Role {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let value = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
        Ok(value.parse().unwrap_or_default())
    }
}

// ============================================================================
// LEAD STATUS
// ============================================================================

/// Funnel stage of a lead.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStatus {
    #[default]
    New,
    Inquiry,
    InfoShared,
    MeetingDone,
    TokenReceived,
    Downpayment,
    Spa,
    ClosedWon,
    ClosedLost,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 9] = [
        Self::New,
        Self::Inquiry,
        Self::InfoShared,
        Self::MeetingDone,
        Self::TokenReceived,
        Self::Downpayment,
        Self::Spa,
        Self::ClosedWon,
        Self::ClosedLost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Inquiry => "INQUIRY",
            Self::InfoShared => "INFO_SHARED",
            Self::MeetingDone => "MEETING_DONE",
            Self::TokenReceived => "TOKEN_RECEIVED",
            Self::Downpayment => "DOWNPAYMENT",
            Self::Spa => "SPA",
            Self::ClosedWon => "CLOSED_WON",
            Self::ClosedLost => "CLOSED_LOST",
        }
    }
}

impl std::str::FromStr for LeadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown LeadStatus: {s}"))
    }
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql<Text, Pg> for LeadStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<Text, Pg> for LeadStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let value = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
        value.parse().map_err(Into::into)
    }
}

// ============================================================================
// FOLLOW-UP STATUS
// ============================================================================

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FollowupStatus {
    #[default]
    Pending,
    Done,
    Skipped,
    Rescheduled,
}

impl FollowupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Done => "DONE",
            Self::Skipped => "SKIPPED",
            Self::Rescheduled => "RESCHEDULED",
        }
    }
}

impl std::str::FromStr for FollowupStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "DONE" => Ok(Self::Done),
            "SKIPPED" => Ok(Self::Skipped),
            "RESCHEDULED" => Ok(Self::Rescheduled),
            _ => Err(format!("Unknown FollowupStatus: {s}")),
        }
    }
}

impl std::fmt::Display for FollowupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql<Text, Pg> for FollowupStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<Text, Pg> for FollowupStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let value = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
        value.parse().map_err(Into::into)
    }
}
