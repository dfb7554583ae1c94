//! # Bindery Support
//!
//! Shared utilities for the Bindery container crates.
//!
//! This crate provides:
//! - Text rendering for type names, suggestions and binding tables
//! - `tracing` subscriber setup

pub mod logging;
pub mod rendering;
