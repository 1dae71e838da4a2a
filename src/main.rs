//! goto-usage command line interface
//!
//! Runs the MCP server over stdio, or performs a single client operation and
//! prints the result. Logs go to stderr so stdout stays clean for MCP framing
//! and `--json` output.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use goto_usage::mcp_server::GotoUsageMcpServer;
use goto_usage::paths;
use goto_usage::{
    Config, FileDependenciesRequest, FileSavedRequest, FindUsagesRequest, GotoUsageClient,
    GotoUsageRequest, ProjectRef, RebuildRequest, StatisticsRequest, UsageResponse,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_COMMIT_HASH"),
    ", built ",
    env!("BUILD_TIMESTAMP"),
    ")"
);

#[derive(Parser)]
#[command(name = "goto-usage", version = VERSION)]
#[command(about = "Find usages of a symbol, narrowed by a cached import dependency graph")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, env = "GOTO_USAGE_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
}

/// Which project an operation applies to
#[derive(clap::Args)]
struct ProjectArgs {
    /// Project name; defaults to the name of the first folder
    #[arg(long)]
    project: Option<String>,

    /// Project folder, repeatable; defaults to the current directory
    #[arg(long = "folder")]
    folders: Vec<PathBuf>,
}

impl ProjectArgs {
    fn to_ref(&self) -> Result<ProjectRef> {
        let folders = if self.folders.is_empty() {
            vec![std::env::current_dir().context("Failed to read current directory")?]
        } else {
            self.folders.clone()
        };

        Ok(ProjectRef::new(
            self.project.clone(),
            folders.iter().map(|f| absolute(f)).collect(),
        ))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP server with stdio transport
    Serve,

    /// Find usages of the symbol defined at or above a line
    Usages {
        file: PathBuf,
        /// 1-based line number
        line: usize,
        #[command(flatten)]
        project: ProjectArgs,
    },

    /// Find usages of a named symbol defined in a file
    Find {
        symbol: String,
        /// File that defines the symbol
        file: PathBuf,
        #[command(flatten)]
        project: ProjectArgs,
    },

    /// Rebuild the project's dependency graph from scratch
    Rebuild {
        #[command(flatten)]
        project: ProjectArgs,
    },

    /// Drop every cached dependency graph
    Clear,

    /// Update the cached graph after a file was saved or deleted
    Saved {
        file: PathBuf,
        #[command(flatten)]
        project: ProjectArgs,
    },

    /// Show what a file imports and which files import it
    Deps {
        file: PathBuf,
        #[command(flatten)]
        project: ProjectArgs,
    },

    /// Show statistics about loaded and persisted graphs
    Stats {
        /// Only this project
        #[arg(long)]
        project: Option<String>,
    },
}

fn absolute(path: &Path) -> String {
    paths::normalize(path).to_string_lossy().into_owned()
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_usages(response: &UsageResponse, json: bool) -> Result<()> {
    if json {
        return print_json(response);
    }

    for usage in &response.results {
        println!(
            "{}:{}:{}: {}",
            usage.display_path,
            usage.line,
            usage.column + 1,
            usage.line_text.trim()
        );
    }
    if let Some(message) = &response.message {
        println!("{}", message);
    }
    tracing::info!(
        "{} usages in {} files scanned ({}ms)",
        response.results.len(),
        response.files_scanned,
        response.duration_ms
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if cli.verbose {
        config.logging.verbose = true;
    }
    init_logging(config.logging.verbose);

    let client = GotoUsageClient::with_config(config)?;
    let json = cli.json;

    match cli.command {
        Commands::Serve => {
            GotoUsageMcpServer::with_client(Arc::new(client))?
                .serve_stdio()
                .await?;
        }
        Commands::Usages {
            file,
            line,
            project,
        } => {
            let response = client
                .goto_usage(GotoUsageRequest {
                    project: project.to_ref()?,
                    file_path: absolute(&file),
                    line,
                })
                .await?;
            print_usages(&response, json)?;
        }
        Commands::Find {
            symbol,
            file,
            project,
        } => {
            let response = client
                .find_usages(FindUsagesRequest {
                    project: project.to_ref()?,
                    symbol,
                    defining_file: absolute(&file),
                })
                .await?;
            print_usages(&response, json)?;
        }
        Commands::Rebuild { project } => {
            let response = client
                .rebuild_dependency_graph(RebuildRequest {
                    project: project.to_ref()?,
                })
                .await?;
            if json {
                print_json(&response)?;
            } else {
                println!(
                    "Rebuilt {}: {} files, {} dependencies, {} unresolved imports ({}ms)",
                    response.project,
                    response.files_indexed,
                    response.dependencies,
                    response.unresolved_imports,
                    response.duration_ms
                );
            }
        }
        Commands::Clear => {
            let response = client.clear_dependency_graphs().await?;
            if json {
                print_json(&response)?;
            } else {
                println!(
                    "Cleared {} loaded dependency graphs and every persisted copy",
                    response.cleared
                );
            }
        }
        Commands::Saved { file, project } => {
            let response = client
                .file_saved(FileSavedRequest {
                    project: project.to_ref()?,
                    file_path: absolute(&file),
                })
                .await?;
            if json {
                print_json(&response)?;
            } else {
                println!("{}: {:?}", response.file_path, response.outcome);
            }
        }
        Commands::Deps { file, project } => {
            let response = client
                .file_dependencies(FileDependenciesRequest {
                    project: project.to_ref()?,
                    file_path: absolute(&file),
                })
                .await?;
            if json {
                print_json(&response)?;
            } else if !response.in_graph {
                println!("{} is not part of the dependency graph", response.file_path);
            } else {
                println!("Imports:");
                for dependency in &response.dependencies {
                    println!("  {}", dependency);
                }
                println!("Imported by:");
                for dependent in &response.dependents {
                    println!("  {}", dependent);
                }
                println!(
                    "{} files reachable, {} files depend on it",
                    response.transitive_dependencies.len(),
                    response.transitive_dependents.len()
                );
            }
        }
        Commands::Stats { project } => {
            let response = client
                .graph_statistics(StatisticsRequest { project })
                .await?;
            if json {
                print_json(&response)?;
            } else {
                for graph in &response.graphs {
                    println!(
                        "{}: {} files, {} dependencies, built {}",
                        graph.project, graph.files, graph.dependencies, graph.built_at
                    );
                }
                match &response.cache_directory {
                    Some(dir) => println!("{} graphs persisted in {}", response.persisted_graphs, dir),
                    None => println!("Graph persistence is disabled"),
                }
            }
        }
    }

    Ok(())
}
