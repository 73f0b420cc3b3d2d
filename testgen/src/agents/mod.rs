//! Agents driven by the generation workflow.

pub mod coverage;
pub mod generator;
