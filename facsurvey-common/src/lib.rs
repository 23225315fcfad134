//! # Facility Survey Common Library
//!
//! Shared code for the facility survey import pipeline:
//! - Error and result types
//! - Bootstrap configuration (TOML file discovery and parsing)
//! - Database initialization and schema

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
