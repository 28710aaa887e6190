pub mod cdc;
pub mod config;
pub mod datasource;
pub mod error;
pub mod job;
pub mod join;
pub mod kafka;
pub mod query;
pub mod server;
