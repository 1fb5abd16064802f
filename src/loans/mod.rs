//! Loan installment reconciliation.
//!
//! `schedule` holds the pure arithmetic, `reconciler` runs a pass against a
//! `LoanStore`, and `trigger` guards the once-per-session background pass.

pub mod clock;
pub mod reconciler;
pub mod schedule;
pub mod store;
pub mod trigger;

pub use clock::{Clock, FixedClock, SystemClock};
pub use reconciler::{LoanOutcome, OutcomeResult, Reconciler, SyncError, SyncReport};
pub use schedule::{expected_installments, LoanPlan, SkipReason};
pub use store::{LoanStore, LoanStoreProvider, MemoryLoanStore, PgLoanStore, PgStoreProvider, SingleStoreProvider};
pub use trigger::{AutoSync, SessionRegistry};
