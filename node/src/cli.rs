//! # CLI Interface
//!
//! Defines the command-line argument structure for `chainstore-node` using
//! `clap` derive. Store options are global and can be set through the
//! environment; every subcommand opens the same data directory.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use chainstore_core::config::{StoreConfig, DEFAULT_DIFFICULTY, MAX_DIFFICULTY};

use crate::logging::LogFormat;

/// Chainstore: a record store with a hash-chained audit ledger.
#[derive(Parser, Debug)]
#[command(
    name = "chainstore-node",
    about = "Schema-validated record store with a tamper-evident ledger",
    version,
    propagate_version = true
)]
pub struct ChainstoreCli {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Log output format.
    #[arg(
        long,
        global = true,
        value_enum,
        env = "CHAINSTORE_LOG_FORMAT",
        default_value = "pretty"
    )]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand that touches the store.
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Directory holding the sled database. Created on first use.
    #[arg(
        long,
        short = 'd',
        global = true,
        env = "CHAINSTORE_DATA_DIR",
        default_value = "./chainstore-data"
    )]
    pub data_dir: PathBuf,

    /// Leading zero hex digits required of each mined block hash.
    #[arg(
        long,
        global = true,
        env = "CHAINSTORE_DIFFICULTY",
        default_value_t = DEFAULT_DIFFICULTY,
        value_parser = clap::value_parser!(u32).range(0..=MAX_DIFFICULTY as i64)
    )]
    pub difficulty: u32,

    /// Give up mining a block after this many nonces.
    #[arg(long, global = true, env = "CHAINSTORE_MAX_NONCE")]
    pub max_nonce: Option<u64>,
}

impl StoreArgs {
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            max_nonce: self.max_nonce,
            ..StoreConfig::with_difficulty(self.difficulty)
        }
    }
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the HTTP API and the Prometheus endpoint.
    Serve(ServeArgs),
    /// Define a new schema from a JSON array of field specs.
    DefineSchema(DefineSchemaArgs),
    /// Create a record from a JSON object of field values.
    Create(CreateArgs),
    /// Replace a record's fields with a JSON object of field values.
    Update(UpdateArgs),
    /// Print one record.
    Get(GetArgs),
    /// List records, optionally for one schema.
    List(ListArgs),
    /// Find records whose fields equal every given criterion.
    Search(SearchArgs),
    /// Seal all pending transactions into a new block.
    Mine,
    /// Print store and ledger status.
    Info,
    /// Re-verify every block hash and link. Exits non-zero on tampering.
    Verify,
    /// Write the full store as JSON to a file or stdout.
    Export(ExportArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `serve` subcommand.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind both listeners on.
    #[arg(long, default_value = "127.0.0.1")]
    pub bind: String,

    /// Port for the REST API.
    #[arg(long, env = "CHAINSTORE_HTTP_PORT", default_value_t = 8640)]
    pub http_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "CHAINSTORE_METRICS_PORT", default_value_t = 8641)]
    pub metrics_port: u16,
}

/// Arguments for the `define-schema` subcommand.
#[derive(Args, Debug)]
pub struct DefineSchemaArgs {
    /// Schema name.
    pub name: String,

    /// Field specs, e.g. `[{"name":"email","type":"text"}]`.
    pub fields: String,

    /// Free-form description.
    #[arg(long, default_value = "")]
    pub description: String,
}

/// Arguments for the `create` subcommand.
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Schema the record belongs to.
    pub schema: String,

    /// Field values, e.g. `{"email":"ada@example.com"}`.
    pub fields: String,
}

/// Arguments for the `update` subcommand.
#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Record id.
    pub id: String,

    /// Replacement field values.
    pub fields: String,
}

/// Arguments for the `get` subcommand.
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Record id.
    pub id: String,

    /// Also print the record's ledger history.
    #[arg(long)]
    pub history: bool,
}

/// Arguments for the `list` subcommand.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only records of this schema.
    #[arg(long, short = 's')]
    pub schema: Option<String>,
}

/// Arguments for the `search` subcommand.
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Criteria as a JSON object, e.g. `{"active":true}`.
    pub criteria: String,

    /// Only records of this schema.
    #[arg(long, short = 's')]
    pub schema: Option<String>,
}

/// Arguments for the `export` subcommand.
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Output file. Prints to stdout when omitted.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        ChainstoreCli::command().debug_assert();
    }

    #[test]
    fn global_store_options_follow_the_subcommand() {
        let cli = ChainstoreCli::try_parse_from([
            "chainstore-node",
            "mine",
            "--data-dir",
            "/tmp/cs",
            "--difficulty",
            "3",
            "--max-nonce",
            "1000",
        ])
        .unwrap();

        assert!(matches!(cli.command, Commands::Mine));
        assert_eq!(cli.store.data_dir, PathBuf::from("/tmp/cs"));
        let config = cli.store.store_config();
        assert_eq!(config.difficulty, 3);
        assert_eq!(config.max_nonce, Some(1000));
    }

    #[test]
    fn difficulty_above_maximum_is_rejected() {
        let result = ChainstoreCli::try_parse_from([
            "chainstore-node",
            "info",
            "--difficulty",
            "65",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn define_schema_takes_name_and_fields() {
        let cli = ChainstoreCli::try_parse_from([
            "chainstore-node",
            "define-schema",
            "User",
            r#"[{"name":"email","type":"text"}]"#,
            "--description",
            "users",
        ])
        .unwrap();

        match cli.command {
            Commands::DefineSchema(args) => {
                assert_eq!(args.name, "User");
                assert_eq!(args.description, "users");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
