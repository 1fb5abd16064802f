use chrono::NaiveDate;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::clock::Clock;
use super::schedule::{self, LoanPlan, SkipReason};
use super::store::LoanStore;
use crate::database::models::{Loan, LoanPatch};
use crate::database::DatabaseError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to fetch active loans: {0}")]
    Fetch(#[source] DatabaseError),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum OutcomeResult {
    Updated { paid_installments: i32, completed: bool },
    /// Dry run: the update that would have been written
    Planned { paid_installments: i32, completed: bool },
    UpToDate,
    Skipped { reason: SkipReason },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct LoanOutcome {
    pub loan_id: Uuid,
    pub paid_before: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<i64>,
    #[serde(flatten)]
    pub result: OutcomeResult,
}

/// Summary of one reconciliation pass
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub date: NaiveDate,
    pub dry_run: bool,
    pub examined: usize,
    pub updated: usize,
    pub completed: usize,
    pub up_to_date: usize,
    pub skipped: usize,
    pub failed: usize,
    pub outcomes: Vec<LoanOutcome>,
}

impl SyncReport {
    fn new(date: NaiveDate, dry_run: bool) -> Self {
        Self {
            date,
            dry_run,
            examined: 0,
            updated: 0,
            completed: 0,
            up_to_date: 0,
            skipped: 0,
            failed: 0,
            outcomes: vec![],
        }
    }

    fn record(&mut self, outcome: LoanOutcome) {
        self.examined += 1;
        match &outcome.result {
            OutcomeResult::Updated { completed, .. } | OutcomeResult::Planned { completed, .. } => {
                self.updated += 1;
                if *completed {
                    self.completed += 1;
                }
            }
            OutcomeResult::UpToDate => self.up_to_date += 1,
            OutcomeResult::Skipped { .. } => self.skipped += 1,
            OutcomeResult::Failed { .. } => self.failed += 1,
        }
        self.outcomes.push(outcome);
    }
}

/// Brings `paid_installments` of every active loan up to what the calendar says.
///
/// Writes only ever raise the stored count, so a pass can be repeated or
/// raced with another pass without harm; a second pass on the same day finds
/// nothing to do.
pub struct Reconciler {
    store: Arc<dyn LoanStore>,
    clock: Arc<dyn Clock>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn LoanStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// User-initiated sync: a failed fetch is returned to the caller
    pub async fn sync_now(&self) -> Result<SyncReport, SyncError> {
        self.run(false).await
    }

    /// Session-load sync: a failed fetch is logged and the pass does nothing
    pub async fn sync_in_background(&self) -> Option<SyncReport> {
        match self.run(false).await {
            Ok(report) => Some(report),
            Err(e) => {
                error!("Loan auto-sync aborted: {}", e);
                None
            }
        }
    }

    /// Plans the pass without writing anything
    pub async fn preview(&self) -> Result<SyncReport, SyncError> {
        self.run(true).await
    }

    async fn run(&self, dry_run: bool) -> Result<SyncReport, SyncError> {
        let today = self.clock.today();
        let offset = self.clock.offset();

        let loans = self.store.fetch_active().await.map_err(SyncError::Fetch)?;
        debug!("Reconciling {} active loans as of {}", loans.len(), today);

        let mut report = SyncReport::new(today, dry_run);
        let mut writes = Vec::new();

        for loan in &loans {
            match schedule::plan(loan, today, offset) {
                LoanPlan::Advance { expected, patch } if dry_run => {
                    report.record(LoanOutcome {
                        loan_id: loan.id,
                        paid_before: loan.paid_installments,
                        expected: Some(expected),
                        result: OutcomeResult::Planned {
                            paid_installments: patch.paid_installments,
                            completed: patch.status.is_some(),
                        },
                    });
                }
                LoanPlan::Advance { expected, patch } => {
                    writes.push(self.apply(loan, expected, patch));
                }
                LoanPlan::UpToDate { expected } => {
                    report.record(LoanOutcome {
                        loan_id: loan.id,
                        paid_before: loan.paid_installments,
                        expected: Some(expected),
                        result: OutcomeResult::UpToDate,
                    });
                }
                LoanPlan::Skip(reason) => {
                    warn!(loan_id = %loan.id, "Skipping loan: {}", reason);
                    report.record(LoanOutcome {
                        loan_id: loan.id,
                        paid_before: loan.paid_installments,
                        expected: None,
                        result: OutcomeResult::Skipped { reason },
                    });
                }
            }
        }

        // Each write stands alone; one failing does not stop the others
        for outcome in join_all(writes).await {
            report.record(outcome);
        }

        info!(
            date = %today,
            dry_run,
            examined = report.examined,
            updated = report.updated,
            completed = report.completed,
            failed = report.failed,
            "Loan reconciliation pass finished"
        );
        Ok(report)
    }

    async fn apply(&self, loan: &Loan, expected: i64, patch: LoanPatch) -> LoanOutcome {
        let result = match self.store.apply(loan.id, &patch).await {
            Ok(()) => {
                debug!(
                    loan_id = %loan.id,
                    from = loan.paid_installments,
                    to = patch.paid_installments,
                    "Loan installments advanced"
                );
                OutcomeResult::Updated {
                    paid_installments: patch.paid_installments,
                    completed: patch.status.is_some(),
                }
            }
            Err(e) => {
                warn!(loan_id = %loan.id, error = %e, "Failed to update loan installments");
                OutcomeResult::Failed { error: e.to_string() }
            }
        };

        LoanOutcome {
            loan_id: loan.id,
            paid_before: loan.paid_installments,
            expected: Some(expected),
            result,
        }
    }
}
