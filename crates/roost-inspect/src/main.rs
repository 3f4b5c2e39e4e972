//! Inspector binary for a Roost store.
//!
//! Opens whichever backend the configuration selects and reports on its
//! contents. No entity is written; opening the relational backend does
//! apply any pending schema migrations.
//!
//! ```text
//! roost-inspect [count]            per-class and total counts
//! roost-inspect show <Class.id>    one record as JSON
//! roost-inspect dump [Class]       every record (of one class) as JSON
//! ```
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `$ROOST_CONFIG` or `roost.yaml`
//! 2. Initialize structured logging (tracing) on stderr
//! 3. Open the configured backend
//! 4. Run the command and close the backend

mod error;

use std::path::PathBuf;

use roost_db::{Storage, StorageConfig, StorageEngine};
use roost_types::{ClassTag, IdentityKey};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::InspectError;

/// Config file used when `ROOST_CONFIG` is unset.
const DEFAULT_CONFIG_PATH: &str = "roost.yaml";

/// What to report.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    /// Per-class counts.
    Count,
    /// A single record.
    Show(IdentityKey),
    /// Every record, optionally of one class.
    Dump(Option<ClassTag>),
}

impl Command {
    /// Parse the arguments after the program name.
    fn parse(args: &[String]) -> Result<Self, InspectError> {
        let usage = |message: &str| InspectError::Usage {
            message: message.to_owned(),
        };
        match args {
            [] => Ok(Self::Count),
            [cmd] if cmd == "count" => Ok(Self::Count),
            [cmd, key] if cmd == "show" => key
                .parse()
                .map(Self::Show)
                .map_err(|e| usage(&format!("show expects Class.id ({e})"))),
            [cmd] if cmd == "dump" => Ok(Self::Dump(None)),
            [cmd, class] if cmd == "dump" => class
                .parse()
                .map(|class| Self::Dump(Some(class)))
                .map_err(|e| usage(&format!("dump expects a class name ({e})"))),
            _ => Err(usage("roost-inspect [count | show <Class.id> | dump [Class]]")),
        }
    }
}

/// Application entry point for the inspector.
///
/// # Errors
///
/// Returns an error if configuration, the backend or the command fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args)?;

    // 1. Load configuration.
    let config = load_config()?;

    // 2. Initialize structured logging.
    let level = config.logging.level.clone();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
    info!(backend = ?config.backend, "roost-inspect starting");

    // 3. Open the backend.
    let storage = Storage::open(&config).await?;

    // 4. Run the command.
    let outcome = run(&storage, &command).await;
    storage.close().await;
    outcome?;
    Ok(())
}

async fn run(storage: &Storage, command: &Command) -> Result<(), InspectError> {
    match command {
        Command::Count => {
            for class in ClassTag::ALL {
                println!("{:<8} {}", class.as_str(), storage.count(Some(class)).await?);
            }
            println!("{:<8} {}", "total", storage.count(None).await?);
        }
        Command::Show(key) => match storage.get(key.class(), key.id()).await? {
            Some(entity) => println!("{}", serde_json::to_string_pretty(&entity.to_record()?)?),
            None => println!("{key} not found"),
        },
        Command::Dump(class) => {
            let mut records = serde_json::Map::new();
            for (key, entity) in storage.all(*class).await? {
                records.insert(key.to_string(), entity.to_record()?);
            }
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
    }
    Ok(())
}

/// Load the storage configuration.
///
/// Uses `$ROOST_CONFIG` when set, else `roost.yaml` in the working
/// directory. A missing file means defaults plus environment overrides.
fn load_config() -> Result<StorageConfig, InspectError> {
    let path = std::env::var_os("ROOST_CONFIG")
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    if path.exists() {
        Ok(StorageConfig::from_file(&path)?)
    } else {
        Ok(StorageConfig::parse("")?)
    }
}
