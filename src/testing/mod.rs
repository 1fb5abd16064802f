//! Fixtures shared by unit tests
use chrono::{NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use crate::database::models::{Loan, LoanStatus};

/// Parse a `YYYY-MM-DD` literal
pub fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap_or_else(|e| panic!("bad test date {}: {}", s, e))
}

/// Active loan starting on `start`, created at noon UTC of the same day
pub fn active_loan(start: &str, payment_day: i32, paid: i32, total: i32) -> Loan {
    let start = day(start);
    Loan {
        id: Uuid::new_v4(),
        status: LoanStatus::Active,
        start_date: Some(start),
        created_at: Utc.from_utc_datetime(&start.and_hms_opt(12, 0, 0).unwrap()),
        payment_date: Some(payment_day),
        paid_installments: paid,
        total_installments: Some(total),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixtures_are_consistent() {
        let loan = active_loan("2024-02-29", 10, 1, 6);
        assert_eq!(loan.start_date, Some(day("2024-02-29")));
        assert_eq!(loan.created_at.date_naive(), day("2024-02-29"));
        assert_eq!(loan.status, LoanStatus::Active);
    }
}
