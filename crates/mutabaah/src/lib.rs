pub mod catalog;
pub mod config;
pub mod domain;
pub mod eligibility;
pub mod error;
pub mod leaderboard;
pub mod report;
pub mod router;
pub mod scoring;
pub mod service;
pub mod snapshot;
pub mod store;
pub mod telemetry;
pub mod time;

#[cfg(test)]
mod tests;
