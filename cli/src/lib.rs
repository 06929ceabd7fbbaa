//! action-hub library crate, exposes the command handlers and HTTP surface for tests.

pub mod commands;
pub mod http;
