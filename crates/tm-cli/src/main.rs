mod commands;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tm_engine::LocalCache;
use tm_sync::{pull_snapshot, RemoteStore};

#[derive(Parser)]
#[command(name = "tm")]
#[command(about = "Transfer market admin CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base first, overrides after)
        #[arg(required = true)]
        paths: Vec<String>,

        /// Fail if any config key is not read by the market config
        #[arg(long, default_value_t = false)]
        strict: bool,
    },

    /// Activity log utilities
    Audit {
        #[command(subcommand)]
        cmd: AuditCmd,
    },

    /// Remote store schema commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Remote snapshot commands
    Sync {
        #[command(subcommand)]
        cmd: SyncCmd,
    },

    /// Market gate commands
    Market {
        #[command(subcommand)]
        cmd: MarketCmd,
    },
}

#[derive(Subcommand)]
enum AuditCmd {
    /// Verify the hash chain of an activity JSONL file
    Verify {
        #[arg(long)]
        path: PathBuf,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    /// Apply the embedded SQL migrations
    Migrate {
        /// NAME of the env var holding the Postgres URL
        #[arg(long, default_value = "TM_DATABASE_URL")]
        url_env: String,
    },
}

#[derive(Subcommand)]
enum SyncCmd {
    /// Pull the full remote snapshot and print counts
    Pull {
        /// Local cache file to diff against
        #[arg(long)]
        cache: Option<PathBuf>,

        #[arg(long, default_value = "TM_DATABASE_URL")]
        url_env: String,

        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },
}

#[derive(Subcommand)]
enum MarketCmd {
    /// Print the market flag, from the local cache if given, else the remote
    Status {
        #[arg(long)]
        cache: Option<PathBuf>,

        #[arg(long, default_value = "TM_DATABASE_URL")]
        url_env: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist.
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths, strict } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = tm_config::load_layered_yaml(&path_refs)?;
            let policy = if strict {
                tm_config::UnusedKeyPolicy::Fail
            } else {
                tm_config::UnusedKeyPolicy::Warn
            };
            let unused = tm_config::report_unused_keys(&loaded.config_json, policy)?;
            for key in &unused.unused_leaf_pointers {
                eprintln!("unused_key={key}");
            }
            tm_config::MarketConfig::from_json(&loaded.config_json)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Audit { cmd } => match cmd {
            AuditCmd::Verify { path } => {
                let (ok, line) = commands::audit::verify(&path)?;
                if !ok {
                    bail!("{line}");
                }
                println!("{line}");
            }
        },

        Commands::Db { cmd } => match cmd {
            DbCmd::Migrate { url_env } => {
                let store = commands::connect_store(&url_env, 2).await?;
                store.migrate().await?;
                tracing::info!(url_env = %url_env, "migrations applied");
                println!("migrations_applied=true");
            }
        },

        Commands::Sync { cmd } => match cmd {
            SyncCmd::Pull {
                cache,
                url_env,
                timeout_secs,
            } => {
                let store = commands::connect_store(&url_env, 2).await?;
                let remote = pull_snapshot(&store, Duration::from_secs(timeout_secs)).await?;
                for line in commands::sync::snapshot_lines("remote", &remote) {
                    println!("{line}");
                }
                if let Some(path) = cache {
                    println!("{}", commands::sync::drift_against_cache(&path, &remote)?);
                }
            }
        },

        Commands::Market { cmd } => match cmd {
            MarketCmd::Status { cache, url_env } => {
                let (source, market) = match cache {
                    Some(path) => {
                        let snap = LocalCache::new(&path)?.load()?;
                        ("local", snap.and_then(|s| s.market))
                    }
                    None => {
                        let store = commands::connect_store(&url_env, 1).await?;
                        let row = store.fetch_market_status().await?;
                        ("remote", row.map(Into::into))
                    }
                };
                println!("source={source}");
                for line in commands::sync::market_lines("market", market.as_ref()) {
                    println!("{line}");
                }
            }
        },
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}
