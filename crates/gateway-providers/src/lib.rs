//! # Gateway Providers
//!
//! Vendor adapters behind the [`gateway_core::LanguageModel`] contract:
//! - Anthropic Messages API, with Message Batches
//! - OpenAI Chat Completions, with the Batch API
//! - Google Gemini API and Vertex AI, with Vertex batch prediction
//!
//! [`Registry`] builds named models from a [`gateway_config::GatewayConfig`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod anthropic;
pub mod google;
pub mod openai;
pub mod registry;

mod common;
mod http;
mod media;
mod sse;

pub use anthropic::{AnthropicClient, AnthropicFactory, AnthropicModel};
pub use common::ModelDefaults;
pub use google::{GeminiFactory, GoogleApiType, GoogleClient, GoogleModel, VertexFactory};
pub use openai::{OpenAiClient, OpenAiFactory, OpenAiModel};
pub use registry::{ProviderFactory, Registry};
