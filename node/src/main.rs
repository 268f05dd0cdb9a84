// Copyright (c) 2026 Chainstore Contributors. MIT License.
// See LICENSE for details.

//! # Chainstore Node
//!
//! Entry point for the `chainstore-node` binary. Parses CLI arguments,
//! initializes logging, opens the sled-backed store and either runs one
//! operation against it or serves the HTTP API and metrics endpoint.
//!
//! One-shot subcommands print JSON on stdout:
//!
//! - `define-schema`, `create`, `update` mutate and queue a transaction
//! - `get`, `list`, `search`, `info` read
//! - `mine` seals pending transactions into a block
//! - `verify` audits the chain and exits non-zero on tampering
//! - `export` dumps the whole store

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{bail, Context, Result};
use clap::Parser;
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tokio::signal;

use chainstore_core::config::DEFAULT_SCHEMA_VERSION;
use chainstore_core::schema::{FieldSpec, Fields};
use chainstore_core::storage::SledBackend;
use chainstore_core::store::RecordStore;

use cli::{ChainstoreCli, Commands, StoreArgs};
use metrics::StoreMetrics;

type Store = RecordStore<SledBackend>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = ChainstoreCli::parse();

    let default_level = match cli.command {
        Commands::Serve(_) => "chainstore_node=info,chainstore_core=info,tower_http=debug",
        _ => "chainstore_node=warn,chainstore_core=warn",
    };
    logging::init_logging(default_level, cli.log_format);

    match cli.command {
        Commands::Serve(args) => serve(&cli.store, args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
        command => {
            let mut store = open_store(&cli.store)?;
            run_command(&mut store, command)
        }
    }
}

/// Opens (creating if needed) the store in the configured data directory.
fn open_store(args: &StoreArgs) -> Result<Store> {
    std::fs::create_dir_all(&args.data_dir).with_context(|| {
        format!("failed to create data directory: {}", args.data_dir.display())
    })?;
    let backend = SledBackend::open(&args.data_dir)
        .with_context(|| format!("failed to open database at {}", args.data_dir.display()))?;
    RecordStore::open(backend, args.store_config()).context("failed to load record store")
}

fn parse_json<T: DeserializeOwned>(what: &str, text: &str) -> Result<T> {
    serde_json::from_str(text).with_context(|| format!("{what} is not valid JSON"))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Runs one store operation and prints its result.
fn run_command(store: &mut Store, command: Commands) -> Result<()> {
    match command {
        Commands::DefineSchema(args) => {
            let fields: Vec<FieldSpec> = parse_json("field list", &args.fields)?;
            let schema = store.define_schema(&args.name, fields, &args.description)?;
            print_json(&schema)
        }
        Commands::Create(args) => {
            let fields: Fields = parse_json("fields", &args.fields)?;
            let id = store.create(&args.schema, fields)?;
            print_json(&store.get(&id))
        }
        Commands::Update(args) => {
            let fields: Fields = parse_json("fields", &args.fields)?;
            store.update(&args.id, fields)?;
            print_json(&store.get(&args.id))
        }
        Commands::Get(args) => {
            let Some(record) = store.get(&args.id) else {
                bail!("record '{}' not found", args.id);
            };
            if args.history {
                print_json(&serde_json::json!({
                    "record": record,
                    "history": store.history(&args.id),
                }))
            } else {
                print_json(record)
            }
        }
        Commands::List(args) => print_json(&store.list(args.schema.as_deref())),
        Commands::Search(args) => {
            let criteria: Fields = parse_json("criteria", &args.criteria)?;
            print_json(&store.search(args.schema.as_deref(), &criteria))
        }
        Commands::Mine => match store.mine() {
            Ok(block) => print_json(&block),
            Err(e) if e.is_no_pending_work() => {
                eprintln!("nothing to mine: no pending transactions");
                Ok(())
            }
            Err(e) => Err(e).context("mining failed"),
        },
        Commands::Info => print_json(&store.info()),
        Commands::Verify => {
            let audit = store.audit();
            print_json(&audit)?;
            match audit.first_fault() {
                None => Ok(()),
                Some(index) => bail!(
                    "chain failed verification: {} fault(s), first at block {}",
                    audit.faults.len(),
                    index
                ),
            }
        }
        Commands::Export(args) => {
            let text = store.export().to_json_pretty()?;
            match args.output {
                Some(path) => std::fs::write(&path, text)
                    .with_context(|| format!("failed to write export to {}", path.display())),
                None => {
                    println!("{text}");
                    Ok(())
                }
            }
        }
        Commands::Serve(_) | Commands::Version => bail!("not a store command"),
    }
}

/// Serves the REST API and the Prometheus endpoint until shutdown.
async fn serve(store_args: &StoreArgs, args: cli::ServeArgs) -> Result<()> {
    tracing::info!(
        http_port = args.http_port,
        metrics_port = args.metrics_port,
        data_dir = %store_args.data_dir.display(),
        difficulty = store_args.difficulty,
        "starting chainstore-node"
    );

    let store = open_store(store_args)?;
    let node_metrics = Arc::new(StoreMetrics::new());
    node_metrics.observe_store(&store.info());

    let app_state = api::AppState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: Arc::new(Mutex::new(store)),
        metrics: Arc::clone(&node_metrics),
    };
    let shared_store = Arc::clone(&app_state.store);

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("{}:{}", args.bind, args.http_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("{}:{}", args.bind, args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    shared_store
        .lock()
        .backend()
        .flush()
        .context("failed to flush database on shutdown")?;
    tracing::info!("chainstore-node stopped");
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("chainstore-node {}", env!("CARGO_PKG_VERSION"));
    println!("schema format   {}", DEFAULT_SCHEMA_VERSION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
