//! Scenario configuration: the TOML file model, built-in defaults, command-line
//! overrides and the merged result handed to the workflows.

pub mod builder;
pub mod defaults;
pub mod file;
pub mod models;
