use thiserror::Error;

/// Errors raised while preparing integration test infrastructure.
#[derive(Debug, Error)]
pub enum TestInfraError {
    #[error("Container error: {0}")]
    Container(#[from] testcontainers::TestcontainersError),
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, TestInfraError>;
