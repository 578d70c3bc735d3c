pub mod error;
pub mod models;
pub mod repository;
pub mod seed;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

use error::{Result, StorageError};

/// Handle to the local meet database (a single SQLite file).
///
/// Reads may run concurrently; all state-changing commands are serialized
/// upstream by the per-meet command lock, so the pool never sees competing
/// writers for the same meet.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(sqlx::Error::from)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Private in-memory database. Single connection: each SQLite
    /// `:memory:` connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Platform loading works in 0.5 kg steps; every stored weight must land
/// on one. Quantized values are exactly representable, so equality
/// comparisons on stored weights are reliable.
pub fn ensure_half_kg(kg: f64) -> Result<()> {
    if !kg.is_finite() || kg < 0.0 {
        return Err(StorageError::BadInput(format!(
            "weight must be a non-negative number, got {kg}"
        )));
    }
    if (kg * 2.0).fract() != 0.0 {
        return Err(StorageError::BadInput(format!(
            "weight must be divisible by 0.5 kg, got {kg}"
        )));
    }
    Ok(())
}
