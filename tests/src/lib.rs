//! Shared harness for the end-to-end pipeline tests.

pub mod containers;
pub mod fixtures;
pub mod mocks;
