//! Stopwatch for focused work sessions. Sessions are measured with pauses excluded, stored as
//! plain per-day records and summarized into day, week and month reports right in the terminal.
//!

pub mod cli;
pub mod error;
pub mod storage;
pub mod tracking;
pub mod utils;
