pub mod backend;
pub mod config;
pub mod core;
pub mod observability;
pub mod runner;

pub use anyhow::{Context, Result};
