use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::fmt::{Display, Formatter};

pub const STORAGE_BACKEND_ENV: &str = "SLUGLINE_STORAGE_BACKEND";
pub const MYSQL_DSN_ENV: &str = "SLUGLINE_MYSQL_DSN";
pub const BASE_URL_ENV: &str = "SLUGLINE_BASE_URL";
pub const AUTO_NORMALIZE_ENV: &str = "SLUGLINE_AUTO_NORMALIZE";
pub const TOKEN_LENGTH_ENV: &str = "SLUGLINE_TOKEN_LENGTH";
pub const MAX_ATTEMPTS_ENV: &str = "SLUGLINE_MAX_ATTEMPTS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "mysql")]
    Mysql,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::Mysql => write!(f, "mysql"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "slugline", about = "Shorten, resolve and expire URLs")]
pub struct CLI {
    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::InMemory
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = MYSQL_DSN_ENV, required_if_eq("storage", "mysql"))]
    pub mysql_dsn: Option<String>,

    /// Prefix of the printed short links.
    #[arg(long, env = BASE_URL_ENV, default_value = slugline_resolver::service::DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Canonicalize URLs before storing them.
    #[arg(
        long,
        env = AUTO_NORMALIZE_ENV,
        action = ArgAction::Set,
        default_value_t = true
    )]
    pub auto_normalize: bool,

    #[arg(
        long,
        env = TOKEN_LENGTH_ENV,
        default_value_t = slugline_generator::random::DEFAULT_LENGTH
    )]
    pub token_length: usize,

    #[arg(
        long,
        env = MAX_ATTEMPTS_ENV,
        default_value_t = slugline_resolver::token::DEFAULT_MAX_ATTEMPTS
    )]
    pub max_attempts: usize,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    #[command(flatten)]
    Op(Operation),
    /// Read one operation per line from stdin, e.g. `create https://example.com`.
    Shell,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Operation {
    /// Map a URL to a generated or custom slug.
    Create {
        url: String,
        #[arg(long)]
        slug: Option<String>,
    },
    /// Print the destination of a live slug.
    Resolve { slug: String },
    /// Retire a live slug.
    Expire { slug: String },
}

/// A single line read by the `shell` subcommand.
#[derive(Debug, Parser)]
#[command(name = "slugline", no_binary_name = true)]
pub struct ShellLine {
    #[command(subcommand)]
    pub operation: Operation,
}
