#![deny(unused)]
//! Core types, traits, and error definitions for Workbench.
//!
//! This crate provides the building blocks shared by every other crate:
//! the error taxonomy, the result envelope, the sandbox path policy and
//! the traits implemented by tools, provider adapters and stores.

pub mod config;
pub mod error;
pub mod fs_policy;
pub mod mocks;
pub mod traits;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use fs_policy::{validate_entry_name, SandboxRoot};
pub use traits::*;
pub use types::*;
