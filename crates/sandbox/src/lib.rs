#![deny(unused)]
//! Host-side confinement for Workbench.
//!
//! Isolation is path- and quota-based, not container-based:
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │  Agent Gateway / Tools                 │
//! │    ↓ paths            ↓ commands       │
//! ├───────────────────┬────────────────────┤
//! │  FileManager      │  CommandRunner     │
//! │  (SandboxRoot)    │  (timeout, quota)  │
//! ├───────────────────┴────────────────────┤
//! │  Host filesystem / child processes     │
//! └────────────────────────────────────────┘
//! ```

pub mod files;
pub mod runner;

pub use files::{EntryKind, FileEntry, FileManager, WorkspaceLayout};
pub use runner::{CommandForm, CommandRunner, ExecOptions};
