//! HTTP surface: connector listing, execute and form endpoints behind a
//! shared-secret check.

pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
pub mod state;

pub use models::*;
pub use server::*;
pub use state::*;
