pub mod loan;

pub use loan::{Loan, LoanPatch, LoanRow, LoanStatus, LOAN_TYPE};
