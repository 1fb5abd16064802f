pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod loans;
pub mod middleware;
pub mod server;

#[cfg(test)]
pub mod testing;
