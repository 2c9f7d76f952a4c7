//! Core traits for Workbench.
//!
//! - `skills`: Tool
//! - `llm`: ProviderAdapter
//! - `store`: UserStore, SessionStore, MemoryStore

pub mod llm;
pub mod skills;
pub mod store;

pub use llm::*;
pub use skills::*;
pub use store::*;
