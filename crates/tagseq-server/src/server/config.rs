use std::path::PathBuf;

use anyhow::bail;
use clap::{Parser, ValueEnum};
use tagseq::{CollisionPolicy, CommitStrategy};

/// Runtime configuration for the `tagseq-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file is loaded first), with defaults suitable for local use.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "tagseq-server",
    version,
    about = "An HTTP service for allocating per-category asset tags"
)]
pub struct CliArgs {
    /// Address to listen on.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:8080"))]
    pub server_addr: String,

    /// Where tag formats and assets are stored.
    ///
    /// `memory` keeps everything in process memory, `sqlite::memory:` uses an
    /// in-memory SQLite database, and anything else is treated as a SQLite
    /// file path (an optional `sqlite://` scheme is stripped).
    ///
    /// Environment variable: `DATABASE_URL`
    #[arg(long, env = "DATABASE_URL", default_value_t = String::from("memory"))]
    pub database_url: String,

    /// What to do when the next tag is already used by an existing asset.
    ///
    /// Environment variable: `COLLISION_POLICY`
    #[arg(long, env = "COLLISION_POLICY", value_enum, default_value_t = CollisionPolicyArg::Bounded)]
    pub collision_policy: CollisionPolicyArg,

    /// Candidates checked before giving up under the `bounded` policy.
    ///
    /// Environment variable: `COLLISION_MAX_ATTEMPTS`
    #[arg(long, env = "COLLISION_MAX_ATTEMPTS", default_value_t = tagseq::DEFAULT_MAX_ATTEMPTS)]
    pub collision_max_attempts: u32,

    /// How a consumed tag advances the stored counter.
    ///
    /// Environment variable: `COMMIT_STRATEGY`
    #[arg(long, env = "COMMIT_STRATEGY", value_enum, default_value_t = CommitStrategyArg::AtomicWithFallback)]
    pub commit_strategy: CommitStrategyArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionPolicyArg {
    SingleRetry,
    Bounded,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStrategyArg {
    Atomic,
    AtomicWithFallback,
    ReadModifyWrite,
}

impl From<CommitStrategyArg> for CommitStrategy {
    fn from(arg: CommitStrategyArg) -> Self {
        match arg {
            CommitStrategyArg::Atomic => Self::Atomic,
            CommitStrategyArg::AtomicWithFallback => Self::AtomicWithFallback,
            CommitStrategyArg::ReadModifyWrite => Self::ReadModifyWrite,
        }
    }
}

/// Storage backend selected by `DATABASE_URL`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    SqliteInMemory,
    Sqlite(PathBuf),
}

impl StoreBackend {
    fn parse(raw: &str) -> anyhow::Result<Self> {
        let raw = raw.trim();
        match raw {
            "" => bail!("DATABASE_URL must not be empty"),
            "memory" => Ok(Self::Memory),
            "sqlite::memory:" | ":memory:" => Ok(Self::SqliteInMemory),
            _ => {
                let path = raw.strip_prefix("sqlite://").unwrap_or(raw);
                if path.is_empty() {
                    bail!("DATABASE_URL `{raw}` has no path");
                }
                Ok(Self::Sqlite(PathBuf::from(path)))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub store: StoreBackend,
    pub collision_policy: CollisionPolicy,
    pub commit_strategy: CommitStrategy,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.server_addr.trim().is_empty() {
            bail!("SERVER_ADDR must not be empty");
        }

        let collision_policy = match args.collision_policy {
            CollisionPolicyArg::SingleRetry => CollisionPolicy::SingleRetry,
            CollisionPolicyArg::Bounded => {
                if args.collision_max_attempts == 0 {
                    bail!("COLLISION_MAX_ATTEMPTS must be greater than 0");
                }
                CollisionPolicy::Bounded {
                    max_attempts: args.collision_max_attempts,
                }
            }
        };

        Ok(Self {
            server_addr: args.server_addr,
            store: StoreBackend::parse(&args.database_url)?,
            collision_policy,
            commit_strategy: args.commit_strategy.into(),
        })
    }
}
