#![deny(unused)]
//! Model Gateway for Workbench.
//!
//! This crate provides:
//! - Model identifier classification
//! - Ollama, Gemini and OpenRouter adapters
//! - Per-call credential resolution
//! - The Provider Router tying them together

pub mod classifier;
pub mod credentials;
pub mod gemini;
mod http;
pub mod ollama;
pub mod openrouter;
pub mod router;

pub use classifier::{classify, ModelRoute};
pub use credentials::CredentialResolver;
pub use gemini::GeminiAdapter;
pub use ollama::OllamaAdapter;
pub use openrouter::OpenRouterAdapter;
pub use router::ProviderRouter;
