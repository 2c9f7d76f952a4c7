//! Core type definitions for Workbench.
//!
//! Broken down into submodules by concern and re-exported flat.

pub mod chat;
pub mod exec;
pub mod session;
pub mod tool;

pub use chat::*;
pub use exec::*;
pub use session::*;
pub use tool::*;
