//! Core types and utilities for the image classification pipeline.
//!
//! This crate provides the error type, data-model types, configuration and
//! metric records shared by the dataset, training and tool crates.

pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod types;

pub use cli::*;
pub use config::*;
pub use error::{Error, Result};
pub use metrics::*;
pub use types::*;
