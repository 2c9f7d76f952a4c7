#![deny(unused)]
//! Tools for Workbench.
//!
//! This crate provides:
//! - Tool registry with input/output schema validation
//! - Directory-tree tools at three fidelity levels
//! - Tesseract OCR tool
//! - Script tools discovered from a directory at startup

pub mod ocr;
pub mod registry;
pub mod scripts;
pub mod tree;

pub use ocr::TesseractOcrTool;
pub use registry::ToolRegistry;
pub use scripts::{discover_scripts, ScriptTool};
pub use tree::{TreeDetail, TreeTool};
