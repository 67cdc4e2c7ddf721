//! Relais - scheduled pipeline runner
//!
//! On a cron cadence (or an on-demand dispatch), relais provisions a fresh
//! sandbox, installs a dependency manifest, OS packages and headless browser
//! engines, then invokes an external bot program and records its exit status
//! as the run's terminal state.

#![allow(missing_docs)]

pub mod api;
pub mod app;
pub mod app_info;
pub mod boot;
pub mod cli;
pub mod commands;
pub mod config;
pub mod database;
pub mod environment;
pub mod router;
pub mod run_queue;
pub mod runner;
pub mod setup_tracing;

#[cfg(any(test, feature = "test-utils"))]
pub mod tests;
