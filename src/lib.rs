// Library root: re-exports all modules so integration tests and external
// consumers can access the crate's public API.

pub mod app;
pub mod config;
pub mod entry;
pub mod ledger;
pub mod parser;
pub mod replies;
pub mod telegram;
