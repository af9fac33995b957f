//! groupsync: copy security groups, their members and owners from one
//! Microsoft 365 tenant to another (e.g. commercial to GCC High).

pub mod cmd;
pub mod config;
pub mod error;
pub mod graph;
pub mod logging;
pub mod migration;
