//! Side-effecting adapters: configuration, processes, git, the model backend
//! and the coverage runner.

pub mod config;
pub mod coverage;
pub mod git;
pub mod model;
pub mod process;
pub mod prompt;
pub mod scan;
