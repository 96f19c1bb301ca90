//! Test Module
//!
//! Cross-module test suite for the intent classifier.
//!
//! ## Test Categories
//! - `brain_tests`: Emergency recall, clinical categories, tool matching, keyword cascade
//! - `actor_tests`: Shared mocks and the LLM actor / NLU client contracts
//! - `integration_tests`: Full cascade runs with mocked and HTTP-backed services
//! - `chaos_test`: Breaker behavior, degraded mode and concurrent load

pub mod brain_tests;
pub mod chaos_test;
