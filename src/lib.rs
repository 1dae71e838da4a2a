//! # Goto Usage - Find Symbol Usages via Import Graphs
//!
//! Finds the usages of a class, function or variable across a JavaScript or
//! TypeScript project. Instead of scanning every file, the search is narrowed to
//! the files that import the defining file, directly or transitively, using a
//! per-project import dependency graph that is cached in memory and on disk.
//!
//! ## Key Features
//!
//! - **Symbol detection**: picks the class, function or variable at or above the cursor
//! - **Dependency graph**: loose `import`/`require`/`export from` extraction with
//!   relative, absolute and alias resolution
//! - **Incremental upkeep**: saves and deletions update the cached graph in place
//! - **Persistence**: graphs survive restarts and are refreshed from modification times
//! - **MCP Protocol**: 8 tools and 3 prompts for AI assistant integration
//!
//! ## Architecture
//!
//! ```text
//! +--------------------+     +--------------------+
//! |   editor host /    |     | GotoUsageMcpServer |
//! |   CLI              |     | (8 tools)          |
//! +---------+----------+     +---------+----------+
//!           |                          |
//!           +------------+-------------+
//!                        |
//!              +---------v---------+
//!              |  GotoUsageClient  |
//!              +----+---------+----+
//!                   |         |
//!         +---------v--+  +---v-----------------+
//!         | GraphCache |  | UsageSearchEngine   |
//!         | (+ store)  |  | (SymbolLocator,     |
//!         +-----+------+  |  UsageFinder)       |
//!               |         +---------------------+
//!     +---------v--------------+
//!     | DependencyGraphBuilder |
//!     | (walker, extractor,    |
//!     |  resolver)             |
//!     +------------------------+
//! ```
//!
//! ## Modules
//!
//! - [`client`]: Host-facing facade over the cache and search engine
//! - [`mcp_server`]: MCP protocol server implementation with tools and prompts
//! - [`search`]: Symbol detection and usage scanning
//! - [`graph`]: Dependency graph model and builder
//! - [`cache`]: Per-project graph cache with on-disk persistence
//! - [`indexer`]: File walking, line classification and import extraction
//! - [`resolver`]: Import specifier to file resolution
//! - [`config`]: Configuration management with environment variable support
//! - [`types`]: Request/response types with JSON schema
//! - [`error`]: Error types
//! - [`paths`]: Platform directories and lexical path helpers
//!
//! ## Usage Example
//!
//! ```no_run
//! use goto_usage::mcp_server::GotoUsageMcpServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let server = GotoUsageMcpServer::new()?;
//!
//!     // Serve over stdio (MCP protocol)
//!     server.serve_stdio().await?;
//!
//!     Ok(())
//! }
//! ```

/// Per-project dependency graph cache with on-disk persistence
pub mod cache;

/// Core library client for hosts and the MCP server
pub mod client;

/// Configuration management with environment variable overrides
pub mod config;

/// Error types and utilities
pub mod error;

/// Import dependency graph and its builder
pub mod graph;

/// File walking, line classification and import extraction
pub mod indexer;

/// MCP server implementation with tools and prompts
pub mod mcp_server;

/// Platform directories and path normalization
pub mod paths;

/// Project identity and folders
pub mod project;

/// Resolution of import specifiers to project files
pub mod resolver;

/// Symbol detection and usage scanning
pub mod search;

/// Request/response types with JSON schema definitions
pub mod types;

pub use client::{CommandOutput, GotoUsageClient, HostCommand};
pub use config::{Config, ProjectConfig};
pub use error::GotoUsageError;
pub use project::{Project, ProjectId};
pub use types::*;
