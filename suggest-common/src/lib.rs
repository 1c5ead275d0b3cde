//! # Suggest Common Library
//!
//! Shared code for the suggestion services:
//! - Error and result types
//! - Configuration file discovery and TOML loading
//! - Logging setup
//! - Transaction id handling
//! - Shared API response bodies

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod transaction;

pub use error::{Error, Result};
