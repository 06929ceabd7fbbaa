pub mod actions;
pub mod cli;
pub mod serve;
pub mod worker;
