// HTTP handlers, one module per route group
pub mod loans;
