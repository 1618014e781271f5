//! Desktop activity tracking: classify the foreground window every few
//! seconds, keep an append-only per-day log, and report where the time went.

pub mod aggregate;
pub mod category;
pub mod classifier;
pub mod config;
pub mod daily_log;
pub mod record;
pub mod remote;
pub mod server;
pub mod sink;
pub mod tracker;
