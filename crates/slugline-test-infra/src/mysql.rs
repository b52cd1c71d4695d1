use crate::{Result, TestInfraError};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use std::time::Duration;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::ImageExt;
use testcontainers::{ContainerAsync, GenericImage};
use typed_builder::TypedBuilder;

const MYSQL_PORT: u16 = 3306;

#[derive(Debug, Clone, TypedBuilder)]
pub struct MysqlConfig {
    /// `mysql` image tag.
    #[builder(default = "8.4".to_string(), setter(into))]
    tag: String,
    #[builder(default = "slugline".to_string(), setter(into))]
    database: String,
    #[builder(default = "slugline".to_string(), setter(into))]
    username: String,
    #[builder(default = "slugline".to_string(), setter(into))]
    password: String,
    /// How often [`MySqlServer::connect`] tries before giving up.
    #[builder(default = 20)]
    connect_attempts: u32,
    #[builder(default = Duration::from_millis(500))]
    connect_backoff: Duration,
}

impl Default for MysqlConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A disposable MySQL server holding one empty database.
///
/// The container is stopped when the value is dropped, so keep it alive for
/// as long as any pool connected to it.
pub struct MySqlServer {
    _container: ContainerAsync<GenericImage>,
    database_url: String,
    connect_attempts: u32,
    connect_backoff: Duration,
}

impl MySqlServer {
    pub async fn start(config: MysqlConfig) -> Result<Self> {
        let container = GenericImage::new("mysql", config.tag.as_str())
            .with_exposed_port(MYSQL_PORT.tcp())
            .with_wait_for(WaitFor::message_on_stderr("ready for connections"))
            .with_env_var("MYSQL_DATABASE", config.database.as_str())
            .with_env_var("MYSQL_USER", config.username.as_str())
            .with_env_var("MYSQL_PASSWORD", config.password.as_str())
            .with_env_var("MYSQL_ROOT_PASSWORD", "root")
            .start()
            .await?;

        let host = container.get_host().await?;
        let port = container.get_host_port_ipv4(MYSQL_PORT).await?;
        let database_url = format!(
            "mysql://{}:{}@{}:{}/{}",
            config.username, config.password, host, port, config.database
        );

        Ok(Self {
            _container: container,
            database_url,
            connect_attempts: config.connect_attempts.max(1),
            connect_backoff: config.connect_backoff,
        })
    }

    /// Connection string for the test database, as accepted by sqlx.
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Opens a pool to the test database.
    ///
    /// MySQL logs "ready for connections" once during initialization before
    /// it restarts, so early connects may be refused. They are retried.
    pub async fn connect(&self) -> Result<MySqlPool> {
        let mut attempt = 1;
        loop {
            match MySqlPoolOptions::new()
                .max_connections(5)
                .connect(&self.database_url)
                .await
            {
                Ok(pool) => return Ok(pool),
                Err(_) if attempt < self.connect_attempts => {
                    attempt += 1;
                    tokio::time::sleep(self.connect_backoff).await;
                }
                Err(err) => return Err(TestInfraError::Database(err)),
            }
        }
    }
}
