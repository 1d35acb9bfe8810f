//! Shared test utilities for service-common.
//!
//! This crate provides:
//! - Proptest generators for encoded keys, tokens and configuration
//! - Mock lifecycle items that record their hook invocations
//! - Test fixtures with sample keys and environments

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod mocks;

pub use generators::*;
