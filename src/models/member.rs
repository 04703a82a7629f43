//! Member (patron) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum MemberStatus {
    Active,
    Inactive,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Active => "Active",
            MemberStatus::Inactive => "Inactive",
        }
    }
}

impl std::fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MemberStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(MemberStatus::Active),
            "Inactive" => Ok(MemberStatus::Inactive),
            _ => Err(format!("Invalid member status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Member {
    pub member_id: String,
    pub full_name: String,
    pub email: String,
    pub mobile_number: String,
    pub status: MemberStatus,
    pub added_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct MemberRow {
    pub member_id: String,
    pub full_name: String,
    pub email: String,
    pub mobile_number: String,
    pub status: String,
    pub added_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<MemberRow> for Member {
    type Error = AppError;

    fn try_from(row: MemberRow) -> Result<Self, Self::Error> {
        Ok(Member {
            status: row.status.parse().map_err(AppError::Validation)?,
            member_id: row.member_id,
            full_name: row.full_name,
            email: row.email,
            mobile_number: row.mobile_number,
            added_at: row.added_at,
            updated_at: row.updated_at,
        })
    }
}

/// Member with the number of books currently out (status `Borrowed`)
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MemberSummary {
    #[serde(flatten)]
    pub member: Member,
    pub borrowed_count: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct MemberSummaryRow {
    #[sqlx(flatten)]
    pub member: MemberRow,
    pub borrowed_count: i64,
}

impl TryFrom<MemberSummaryRow> for MemberSummary {
    type Error = AppError;

    fn try_from(row: MemberSummaryRow) -> Result<Self, Self::Error> {
        Ok(MemberSummary {
            member: row.member.try_into()?,
            borrowed_count: row.borrowed_count,
        })
    }
}

/// Register member request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateMember {
    #[validate(length(min = 1, max = 100, message = "Full name is required"))]
    pub full_name: String,
    #[validate(length(min = 1, max = 100, message = "Email is required"))]
    pub email: String,
    /// Format: +63 9XX XXX XXXX
    #[validate(length(min = 1, max = 20, message = "Mobile number is required"))]
    pub mobile_number: String,
}

impl CreateMember {
    /// Copy with surrounding whitespace removed and the email lowercased
    pub fn trimmed(&self) -> Self {
        Self {
            full_name: self.full_name.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            mobile_number: self.mobile_number.trim().to_string(),
        }
    }
}

/// Update member request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateMember {
    #[validate(length(min = 1, max = 100, message = "Full name is required"))]
    pub full_name: String,
    #[validate(length(min = 1, max = 100, message = "Email is required"))]
    pub email: String,
    #[validate(length(min = 1, max = 20, message = "Mobile number is required"))]
    pub mobile_number: String,
    pub status: MemberStatus,
}

impl UpdateMember {
    pub fn trimmed(&self) -> Self {
        Self {
            full_name: self.full_name.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            mobile_number: self.mobile_number.trim().to_string(),
            status: self.status,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct MemberQuery {
    pub status: Option<MemberStatus>,
    /// Matches member id, name, email or mobile number (case-insensitive)
    pub search: Option<String>,
}
