//! anamnesis-mcp: JSON-RPC-over-stdio service surface (§6.2, C18).
//!
//! Wires the reference in-process store adapters and a deterministic
//! embedder into the write, read and manage paths and exposes them as
//! three MCP tools (`write`, `recall`, `manage`) over stdio. stdout is
//! reserved for the JSON-RPC wire protocol; all logging goes to
//! stderr.

mod protocol;
mod server;

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::Semaphore;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use anamnesis_core::config::AnamnesisConfig;
use anamnesis_core::embed::{Embedder, HashEmbedder};
use anamnesis_core::manage::MemoryManager;
use anamnesis_core::read::MemoryReader;
use anamnesis_core::stores::{InMemoryGraphStore, InMemorySearchIndex, InMemoryVectorStore};
use anamnesis_core::write::MemoryWriter;

use crate::protocol::stdio::StdioTransport;
use crate::server::McpServer;

fn print_help() {
    println!("anamnesis-mcp {}", anamnesis_core::VERSION);
    println!();
    println!("Agentic memory service exposed as an MCP server over stdio.");
    println!();
    println!("USAGE:");
    println!("    anamnesis-mcp [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help       Print help information");
    println!("    -V, --version    Print version information");
    println!();
    println!("ENVIRONMENT:");
    println!("    RUST_LOG                                Log level filter (e.g. debug, info, warn)");
    println!("    ANAMNESIS_MAX_CONCURRENT_REQUESTS        Admission semaphore size (default 100)");
    println!("    ANAMNESIS_TIME_BUDGET_MS                 Default recall time budget (default 5000)");
    println!("    ANAMNESIS_EMBED_DIMENSIONS                HashEmbedder output width (default 256)");
}

/// Parses the handful of flags this binary accepts; exits the process
/// for `--help`/`--version` the way a CLI conventionally does.
fn parse_args() {
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("anamnesis-mcp {}", anamnesis_core::VERSION);
                std::process::exit(0);
            }
            other => {
                eprintln!("error: unknown argument '{other}'");
                eprintln!("Try 'anamnesis-mcp --help' for more information.");
                std::process::exit(1);
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    parse_args();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(false)
        .init();

    info!("anamnesis-mcp v{} starting", anamnesis_core::VERSION);

    let config = AnamnesisConfig::default();
    let service_config = anamnesis_core::config::ServiceConfig::from_env();

    let embed_dimensions: usize = std::env::var("ANAMNESIS_EMBED_DIMENSIONS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(256);
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(embed_dimensions));

    let vector_store = Arc::new(InMemoryVectorStore::new());
    let graph_store = Arc::new(InMemoryGraphStore::new());
    let search_index = Arc::new(InMemorySearchIndex::new());

    let writer = Arc::new(
        MemoryWriter::new(
            config.memory_writer.clone(),
            config.content_processor.clone(),
            config.entity_resolver.clone(),
            embedder.clone(),
            vector_store.clone(),
            graph_store.clone(),
            search_index.clone(),
        )
        .context("failed to construct memory writer")?,
    );

    let reader = Arc::new(MemoryReader::new(
        config.clone(),
        embedder,
        vector_store.clone(),
        graph_store.clone(),
        search_index.clone(),
    ));

    let manager = Arc::new(MemoryManager::new(vector_store, graph_store, search_index));

    let admission = Arc::new(Semaphore::new(service_config.max_concurrent_requests));

    info!(
        max_concurrent_requests = service_config.max_concurrent_requests,
        default_time_budget_ms = service_config.default_time_budget.as_millis() as u64,
        "reference store adapters and service wired"
    );

    let server = McpServer::new(writer, reader, manager, admission);
    let transport = StdioTransport::new();

    info!("listening on stdio");
    transport.run(server).await.context("transport error")?;

    info!("anamnesis-mcp shutting down");
    Ok(())
}
