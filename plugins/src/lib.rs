pub mod connectors;
pub mod factory;
pub mod http;
pub mod runner;
pub mod source;
