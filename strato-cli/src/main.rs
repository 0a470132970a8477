//! strato: converges cloud resources to declarative documents.
//!
//! Each invocation runs one lifecycle operation for one document:
//! - `apply` creates or updates the resource so it matches a desired document
//! - `read` refreshes the persisted document from the control plane
//! - `delete` and `import` remove or adopt a resource
//!
//! The control plane is emulated in process. Pass `--cloud-file` to share it
//! between invocations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use strato_core::audit::create_audit_logger;
use strato_core::translate::{SnapshotTranslator, StorageAccountTranslator};
use strato_core::{
    DeclaredResource, EngineConfig, InMemoryCloud, Observed, Reconciler, Snapshot,
    SnapshotReconciler, StorageAccount, StorageAccountReconciler, migrate,
};

mod document;

/// strato resource reconciler
#[derive(Parser, Debug)]
#[command(name = "strato", version, about)]
struct Args {
    /// Engine configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// File backing the emulated control plane (kept in memory if omitted)
    #[arg(long)]
    cloud_file: Option<PathBuf>,

    /// Reads a new resource reports Creating for before it succeeds
    #[arg(long, default_value = "0")]
    settle_after: u32,

    /// Create poll timeout in seconds (overrides the config file)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    poll_timeout_secs: Option<u64>,

    /// Create poll interval in seconds (overrides the config file)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Kind {
    StorageAccount,
    Snapshot,
}

/// The persisted document an operation works on.
#[derive(clap::Args, Debug)]
struct Target {
    /// Resource kind
    #[arg(long, value_enum)]
    kind: Kind,

    /// Persisted document
    #[arg(long)]
    state: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create or update the resource to match a desired document
    Apply {
        #[command(flatten)]
        target: Target,

        /// Desired document
        #[arg(long)]
        desired: PathBuf,
    },

    /// Refresh the persisted document from the control plane
    Read {
        #[command(flatten)]
        target: Target,
    },

    /// Delete the resource recorded in the persisted document
    Delete {
        #[command(flatten)]
        target: Target,
    },

    /// Adopt an existing resource by identifier
    Import {
        #[command(flatten)]
        target: Target,

        /// Resource identifier
        id: String,
    },

    /// Check a desired document without contacting the control plane
    Validate {
        /// Resource kind
        #[arg(long, value_enum)]
        kind: Kind,

        /// Desired document
        #[arg(long)]
        desired: PathBuf,
    },

    /// Upgrade a persisted storage account document to the current layout
    MigrateState {
        /// Persisted document
        #[arg(long)]
        state: PathBuf,
    },
}

enum Operation {
    Apply(PathBuf),
    Read,
    Delete,
    Import(String),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "strato=info,strato_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = load_config(&args).await?;

    let (target, operation) = match args.command {
        Command::Validate { kind, desired } => return validate(kind, &desired, &config).await,
        Command::MigrateState { state } => return migrate_state(&state).await,
        Command::Apply { target, desired } => (target, Operation::Apply(desired)),
        Command::Read { target } => (target, Operation::Read),
        Command::Delete { target } => (target, Operation::Delete),
        Command::Import { target, id } => (target, Operation::Import(id)),
    };

    let cloud = Arc::new(open_cloud(args.cloud_file.as_deref(), args.settle_after, &config).await?);
    let audit = create_audit_logger("strato");

    match target.kind {
        Kind::StorageAccount => {
            let reconciler = StorageAccountReconciler::new(cloud, &config, audit);
            run(&reconciler, &target, operation).await
        }
        Kind::Snapshot => {
            let reconciler = SnapshotReconciler::new(cloud, &config, audit);
            run(&reconciler, &target, operation).await
        }
    }
}

async fn load_config(args: &Args) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .await
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(timeout) = args.poll_timeout_secs {
        config.create_poll.timeout_secs = timeout;
    }
    if let Some(interval) = args.poll_interval_secs {
        config.create_poll.interval_secs = interval;
    }
    config.validate().map_err(anyhow::Error::msg)?;
    Ok(config)
}

async fn open_cloud(
    path: Option<&Path>,
    settle_after: u32,
    config: &EngineConfig,
) -> Result<InMemoryCloud> {
    let cloud = match path {
        Some(path) => {
            info!(path = %path.display(), "Opening control plane");
            InMemoryCloud::open(path, config.subscription_id.clone())
                .await
                .with_context(|| format!("failed to open control plane {}", path.display()))?
        }
        None => InMemoryCloud::new(config.subscription_id.clone()),
    };
    Ok(cloud.with_settle_after(settle_after))
}

async fn run<R>(reconciler: &R, target: &Target, operation: Operation) -> Result<()>
where
    R: Reconciler,
    R::Resource: Serialize + DeserializeOwned,
{
    let kind = R::Resource::KIND;
    let path = target.state.as_path();

    match operation {
        Operation::Apply(desired_path) => {
            let desired: R::Resource = document::load(&desired_path).await?;
            let mut state: R::Resource = document::load_state(path, target.kind)
                .await?
                .unwrap_or_default();

            let result = reconciler.apply(&mut state, &desired).await;
            // Identifiers recorded by a failed create or a partial update must survive.
            if result.is_ok() || state.id().is_some() {
                document::save(path, &state).await?;
            }
            result.with_context(|| format!("failed to apply {} {}", kind, desired.coordinates()))?;
            info!(id = state.id().unwrap_or_default(), "Applied {}", kind);
        }
        Operation::Read => {
            let mut doc: R::Resource = document::load_state(path, target.kind)
                .await?
                .with_context(|| format!("no persisted {} at {}", kind, path.display()))?;
            let observed = reconciler
                .read(&mut doc)
                .await
                .with_context(|| format!("failed to read {} {}", kind, doc.coordinates()))?;
            if observed == Observed::Absent {
                warn!("{} {} no longer exists", kind, doc.coordinates());
            }
            document::save(path, &doc).await?;
            print_document(&doc)?;
        }
        Operation::Delete => {
            let Some(mut doc) = document::load_state::<R::Resource>(path, target.kind).await? else {
                info!(path = %path.display(), "Nothing to delete");
                return Ok(());
            };
            reconciler
                .delete(&mut doc)
                .await
                .with_context(|| format!("failed to delete {} {}", kind, doc.coordinates()))?;
            document::save(path, &doc).await?;
        }
        Operation::Import(id) => {
            let doc = reconciler
                .import(&id)
                .await
                .with_context(|| format!("failed to import {} {}", kind, id))?;
            document::save(path, &doc).await?;
            print_document(&doc)?;
        }
    }
    Ok(())
}

async fn validate(kind: Kind, desired: &Path, config: &EngineConfig) -> Result<()> {
    match kind {
        Kind::StorageAccount => {
            let doc: StorageAccount = document::load(desired).await?;
            StorageAccountTranslator::from_config(config)
                .validate(&doc)
                .with_context(|| format!("invalid storage account {}", doc.coordinates()))?;
        }
        Kind::Snapshot => {
            let doc: Snapshot = document::load(desired).await?;
            SnapshotTranslator
                .validate(&doc)
                .with_context(|| format!("invalid snapshot {}", doc.coordinates()))?;
        }
    }
    info!(path = %desired.display(), "Document is valid");
    Ok(())
}

async fn migrate_state(path: &Path) -> Result<()> {
    let doc: Value = document::load(path).await?;
    if !migrate::needs_migration(&doc) {
        info!(path = %path.display(), "Document is already current");
        return Ok(());
    }
    let upgraded = migrate::migrate_storage_account(doc)
        .with_context(|| format!("failed to upgrade {}", path.display()))?;
    document::save(path, &upgraded).await?;
    info!(path = %path.display(), "Upgraded document");
    Ok(())
}

fn print_document<T: Serialize>(doc: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(doc)?);
    Ok(())
}
