//! File discovery and loose import extraction
//!
//! Provides the project walk, the comment/import-aware line classifier and the
//! permissive import specifier extractor the dependency graph is built from.

mod file_walker;
pub mod import_extractor;
pub mod lines;

pub use file_walker::FileWalker;
pub use import_extractor::ImportExtractor;
pub use lines::{LineContext, LineScanner, ScannedLine};
