//! Shared test utilities for atelier integration tests.
//!
//! This module provides:
//! - `TestHarness` wiring a `Studio` to an isolated database and a recording sale gateway
//! - Builder patterns for workers, sales and configuration

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{drain, RecordingGateway, TestHarness};
