pub mod cli;
pub mod config;
pub mod contracts;
pub mod entity;
pub mod ledger;
pub mod metrics;
pub mod sequence;
pub mod storage;
