use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Discriminator value of loan rows in the shared subscriptions table
pub const LOAN_TYPE: &str = "loan";

/// Raw row as stored; nullable columns stay nullable here
#[derive(Debug, Clone, FromRow)]
pub struct LoanRow {
    pub id: Uuid,
    #[sqlx(rename = "type")]
    pub kind: String,
    pub status: String,
    pub start_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub payment_date: Option<i32>,
    pub paid_installments: Option<i32>,
    pub total_installments: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LoanStatus {
    Active,
    Paused,
    Cancelled,
    Completed,
    /// Anything else found in the column, kept verbatim
    Other(String),
}

impl LoanStatus {
    pub fn as_str(&self) -> &str {
        match self {
            LoanStatus::Active => "active",
            LoanStatus::Paused => "paused",
            LoanStatus::Cancelled => "cancelled",
            LoanStatus::Completed => "completed",
            LoanStatus::Other(s) => s,
        }
    }
}

impl From<String> for LoanStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "active" => LoanStatus::Active,
            "paused" => LoanStatus::Paused,
            "cancelled" => LoanStatus::Cancelled,
            "completed" => LoanStatus::Completed,
            _ => LoanStatus::Other(s),
        }
    }
}

impl From<LoanStatus> for String {
    fn from(status: LoanStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Loan fields the installment reconciler reads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: Uuid,
    pub status: LoanStatus,
    pub start_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub payment_date: Option<i32>,
    pub paid_installments: i32,
    pub total_installments: Option<i32>,
}

impl From<LoanRow> for Loan {
    fn from(row: LoanRow) -> Self {
        Self {
            id: row.id,
            status: LoanStatus::from(row.status),
            start_date: row.start_date,
            created_at: row.created_at,
            payment_date: row.payment_date,
            paid_installments: row.paid_installments.unwrap_or(0),
            total_installments: row.total_installments,
        }
    }
}

/// Single point update written by a reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoanPatch {
    pub paid_installments: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<LoanStatus>,
}
