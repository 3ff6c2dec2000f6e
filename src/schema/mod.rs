//! Schema module - Configuration types for the codec and CLI.

mod config;

pub use config::*;
