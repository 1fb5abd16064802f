//! JSON filter compiled to parameterized SQL.
//!
//! `{ "type": "loan", "status": "active" }` with order `"created_at asc"` becomes
//! `WHERE "status" = $1 AND "type" = $2 ORDER BY "created_at" ASC` with the
//! values bound separately.

pub mod error;
pub mod filter;
pub mod filter_order;
pub mod filter_where;
pub mod types;

pub use error::FilterError;
pub use filter::Filter;
pub use types::*;
