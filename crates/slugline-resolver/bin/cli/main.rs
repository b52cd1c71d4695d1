mod cli;

use crate::cli::{Command, Operation, ShellLine, StorageBackendArg, CLI};
use anyhow::{anyhow, bail, Context};
use clap::Parser;
use slugline_core::RecordStore;
use slugline_generator::{GeneratorSettings, RandomGenerator};
use slugline_resolver::{
    ResolutionService, ServiceSettings, Shortener, SlugResolver, TokenGenerator, TokenSettings,
};
use slugline_storage::{InMemoryRepository, MySqlRepository};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = CLI::parse();

    info!(
        storage_backend = %config.storage,
        base_url = %config.base_url,
        auto_normalize = config.auto_normalize,
        "starting slugline"
    );

    match config.storage {
        StorageBackendArg::InMemory => run(InMemoryRepository::new(), &config).await,
        StorageBackendArg::Mysql => {
            let mysql_dsn = config
                .mysql_dsn
                .as_deref()
                .context("mysql dsn is required when storage backend is mysql")?;
            let repository = MySqlRepository::connect(mysql_dsn).await?;
            repository.ensure_schema().await?;
            run(repository, &config).await
        }
    }
}

async fn run<S: RecordStore>(store: S, config: &CLI) -> anyhow::Result<()> {
    let generator = RandomGenerator::new(
        GeneratorSettings::builder()
            .length(config.token_length)
            .build(),
    )?;
    let tokens = TokenGenerator::new(
        generator,
        TokenSettings::builder()
            .max_attempts(config.max_attempts)
            .build(),
    );
    let resolver = SlugResolver::new(Arc::new(store), tokens);
    let service = ResolutionService::new(
        resolver,
        ServiceSettings::builder()
            .base_url(config.base_url.clone())
            .auto_normalize(config.auto_normalize)
            .build(),
    );

    match &config.command {
        Command::Op(operation) => {
            let line = execute(&service, operation).await?;
            println!("{line}");
            Ok(())
        }
        Command::Shell => shell(&service).await,
    }
}

/// Runs one operation and renders its outcome. Not-found is an error here
/// so that the process exits non-zero.
async fn execute(service: &dyn Shortener, operation: &Operation) -> anyhow::Result<String> {
    match operation {
        Operation::Create { url, slug } => {
            let created = service.create(url, slug.as_deref()).await?;
            Ok(format!("{}\t{}", created.short_url, created.record.url))
        }
        Operation::Resolve { slug } => service
            .resolve(slug)
            .await?
            .ok_or_else(|| anyhow!("slug '{slug}' not found")),
        Operation::Expire { slug } => {
            if !service.expire(slug).await? {
                bail!("slug '{slug}' not found");
            }
            Ok(format!("expired {slug}"))
        }
    }
}

async fn shell(service: &dyn Shortener) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut failures = 0usize;

    while let Some(line) = lines.next_line().await? {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() || words[0].starts_with('#') {
            continue;
        }

        let outcome = match ShellLine::try_parse_from(words) {
            Ok(parsed) => execute(service, &parsed.operation).await,
            Err(err) => Err(err.into()),
        };

        match outcome {
            Ok(output) => println!("{output}"),
            Err(err) => {
                failures += 1;
                warn!(line = %line, "operation failed");
                println!("error: {err:#}");
            }
        }
    }

    if failures > 0 {
        bail!("{failures} operation(s) failed");
    }
    Ok(())
}
