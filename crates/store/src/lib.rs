#![deny(unused)]
//! In-memory persistence for the workbench gateway.
//!
//! Users, chat sessions and operation history normally live in an external
//! database. These DashMap-backed stores implement the same traits so the
//! gateway runs (and is tested) without one.

pub mod memory;

pub use memory::{InMemoryRecordStore, InMemorySessionStore, InMemoryUserStore};
