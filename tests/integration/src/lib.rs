//! Integration tests for the LLM gateway
//!
//! Each adapter runs against a wiremock server speaking its vendor's wire format:
//! - single generations and error classification
//! - streaming, cancellation and truncated streams
//! - batch submit, poll, list, download and cancel
//! - registry construction from configuration files

pub mod fixtures;
pub mod mock_providers;

pub use fixtures::*;
pub use mock_providers::*;

#[cfg(test)]
mod batch_tests;
#[cfg(test)]
mod error_tests;
#[cfg(test)]
mod generate_tests;
#[cfg(test)]
mod registry_tests;
#[cfg(test)]
mod streaming_tests;
