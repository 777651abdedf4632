//! Shared test utilities for the SSF receiver.
//!
//! This crate provides:
//! - Proptest generators for event URIs, subjects and claim fragments
//! - Test fixtures: unsigned SET builder and transmitter metadata documents

pub mod fixtures;
pub mod generators;

pub use fixtures::*;
pub use generators::*;
