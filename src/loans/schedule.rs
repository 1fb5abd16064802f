//! Installment arithmetic. Everything here is pure: the same loan, date and
//! offset always produce the same plan.

use chrono::{Datelike, FixedOffset, NaiveDate};
use serde::Serialize;
use std::fmt;

use crate::database::models::{Loan, LoanPatch, LoanStatus};

/// Number of installments due between `start` and `today`.
///
/// Counts calendar-month boundaries crossed, plus one when today's day of
/// month has reached `payment_day`. The day is never clamped to the length of
/// the month, so a payment day of 31 only counts in months that have a 31st.
/// A start date in a later month yields 0.
pub fn expected_installments(start: NaiveDate, today: NaiveDate, payment_day: u32) -> i64 {
    let months_elapsed = i64::from(today.year() - start.year()) * 12
        + i64::from(today.month()) - i64::from(start.month());
    let current_month_due = i64::from(today.day() >= payment_day);
    (months_elapsed + current_month_due).max(0)
}

/// Date the installment count runs from: `start_date`, else the creation day
pub fn effective_start(loan: &Loan, offset: FixedOffset) -> NaiveDate {
    loan.start_date
        .unwrap_or_else(|| loan.created_at.with_timezone(&offset).date_naive())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    NotActive { status: LoanStatus },
    InvalidPaymentDay { payment_date: Option<i32> },
    MissingTotal { total_installments: Option<i32> },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotActive { status } => write!(f, "status is '{}', not active", status),
            SkipReason::InvalidPaymentDay { payment_date: Some(day) } => {
                write!(f, "payment day {} is outside 1..=31", day)
            }
            SkipReason::InvalidPaymentDay { payment_date: None } => f.write_str("payment day is missing"),
            SkipReason::MissingTotal { total_installments: Some(total) } => {
                write!(f, "total installments {} is not positive", total)
            }
            SkipReason::MissingTotal { total_installments: None } => f.write_str("total installments is missing"),
        }
    }
}

/// What one reconciliation pass should do with one loan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoanPlan {
    Advance { expected: i64, patch: LoanPatch },
    UpToDate { expected: i64 },
    Skip(SkipReason),
}

pub fn plan(loan: &Loan, today: NaiveDate, offset: FixedOffset) -> LoanPlan {
    if loan.status != LoanStatus::Active {
        return LoanPlan::Skip(SkipReason::NotActive { status: loan.status.clone() });
    }

    let payment_day = match loan.payment_date {
        Some(day @ 1..=31) => day as u32,
        other => return LoanPlan::Skip(SkipReason::InvalidPaymentDay { payment_date: other }),
    };

    let total = match loan.total_installments {
        Some(total) if total > 0 => total,
        other => return LoanPlan::Skip(SkipReason::MissingTotal { total_installments: other }),
    };

    let expected = expected_installments(effective_start(loan, offset), today, payment_day);
    // Capping at `total` must never lower a count that is already past it
    if expected <= i64::from(loan.paid_installments) || loan.paid_installments >= total {
        return LoanPlan::UpToDate { expected };
    }

    let paid = expected.min(i64::from(total)) as i32;
    let status = (paid >= total).then_some(LoanStatus::Completed);
    LoanPlan::Advance {
        expected,
        patch: LoanPatch { paid_installments: paid, status },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Offset, TimeZone, Utc};
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn loan(paid: i32, total: i32) -> Loan {
        Loan {
            id: Uuid::new_v4(),
            status: LoanStatus::Active,
            start_date: Some(date(2024, 1, 1)),
            created_at: Utc.with_ymd_and_hms(2023, 12, 28, 9, 0, 0).unwrap(),
            payment_date: Some(15),
            paid_installments: paid,
            total_installments: Some(total),
        }
    }

    fn utc() -> FixedOffset {
        Utc.fix()
    }

    #[test]
    fn paid_beyond_total_is_left_alone() {
        assert_eq!(plan(&loan(5, 3), date(2024, 6, 20), utc()), LoanPlan::UpToDate { expected: 6 });
        assert_eq!(plan(&loan(3, 3), date(2024, 6, 20), utc()), LoanPlan::UpToDate { expected: 6 });
    }

    #[test]
    fn before_payment_day_in_first_month_nothing_is_due() {
        assert_eq!(expected_installments(date(2024, 1, 1), date(2024, 1, 10), 15), 0);
        assert_eq!(plan(&loan(0, 12), date(2024, 1, 10), utc()), LoanPlan::UpToDate { expected: 0 });
    }

    #[test]
    fn payment_day_reached_in_first_month() {
        assert_eq!(expected_installments(date(2024, 1, 1), date(2024, 1, 15), 15), 1);
        assert_eq!(
            plan(&loan(0, 12), date(2024, 1, 20), utc()),
            LoanPlan::Advance {
                expected: 1,
                patch: LoanPatch { paid_installments: 1, status: None },
            }
        );
    }

    #[test]
    fn months_elapsed_add_up() {
        assert_eq!(
            plan(&loan(0, 12), date(2024, 3, 20), utc()),
            LoanPlan::Advance {
                expected: 3,
                patch: LoanPatch { paid_installments: 3, status: None },
            }
        );
        // Year boundary: Nov 2023 -> Feb 2024 is 3 months
        assert_eq!(expected_installments(date(2023, 11, 5), date(2024, 2, 4), 5), 3);
    }

    #[test]
    fn clamps_to_total_and_completes() {
        assert_eq!(
            plan(&loan(0, 3), date(2024, 6, 20), utc()),
            LoanPlan::Advance {
                expected: 6,
                patch: LoanPatch { paid_installments: 3, status: Some(LoanStatus::Completed) },
            }
        );
    }

    #[test]
    fn exact_total_completes() {
        let LoanPlan::Advance { patch, .. } = plan(&loan(2, 3), date(2024, 3, 15), utc()) else {
            panic!("expected an advance");
        };
        assert_eq!(patch, LoanPatch { paid_installments: 3, status: Some(LoanStatus::Completed) });
    }

    #[test]
    fn never_regresses_stored_count() {
        assert_eq!(plan(&loan(5, 12), date(2024, 3, 20), utc()), LoanPlan::UpToDate { expected: 3 });
    }

    #[test]
    fn future_start_clamps_to_zero() {
        assert_eq!(expected_installments(date(2024, 5, 1), date(2024, 1, 20), 15), 0);
        let mut future = loan(0, 12);
        future.start_date = Some(date(2024, 5, 1));
        assert_eq!(plan(&future, date(2024, 1, 20), utc()), LoanPlan::UpToDate { expected: 0 });
    }

    #[test]
    fn later_start_day_in_same_month_still_counts_current_month() {
        // Only month numbers are compared, not days
        assert_eq!(expected_installments(date(2024, 1, 25), date(2024, 1, 20), 15), 1);
    }

    #[test]
    fn payment_day_31_is_not_clamped_in_short_months() {
        assert_eq!(expected_installments(date(2024, 1, 1), date(2024, 2, 29), 31), 1);
        assert_eq!(expected_installments(date(2024, 1, 1), date(2024, 3, 31), 31), 3);
    }

    #[test]
    fn falls_back_to_created_at_in_clock_offset() {
        let mut no_start = loan(0, 12);
        no_start.start_date = None;
        no_start.created_at = Utc.with_ymd_and_hms(2023, 12, 31, 23, 30, 0).unwrap();

        assert_eq!(effective_start(&no_start, utc()), date(2023, 12, 31));
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(effective_start(&no_start, plus_two), date(2024, 1, 1));
    }

    #[test]
    fn skips_loans_that_cannot_be_computed() {
        let mut bad_day = loan(0, 12);
        bad_day.payment_date = Some(0);
        assert_eq!(
            plan(&bad_day, date(2024, 3, 20), utc()),
            LoanPlan::Skip(SkipReason::InvalidPaymentDay { payment_date: Some(0) })
        );

        let mut no_total = loan(0, 12);
        no_total.total_installments = None;
        assert!(matches!(
            plan(&no_total, date(2024, 3, 20), utc()),
            LoanPlan::Skip(SkipReason::MissingTotal { total_installments: None })
        ));

        let mut paused = loan(0, 12);
        paused.status = LoanStatus::Paused;
        assert!(matches!(plan(&paused, date(2024, 3, 20), utc()), LoanPlan::Skip(SkipReason::NotActive { .. })));
    }
}
