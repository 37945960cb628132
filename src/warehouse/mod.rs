pub mod bigquery;
pub mod sqlite;

use async_trait::async_trait;

use crate::config::{Config, WarehouseKind};
use crate::error::Result;
use crate::types::{TableId, TypedRow};

pub use bigquery::{BigQueryWarehouse, DefaultCredentials, StaticToken, TokenSource};
pub use sqlite::SqliteWarehouse;

/// Load collaborator. Appends are all-or-nothing and never touch existing rows.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Appends `rows` to `table`, returning the number of rows written once
    /// the warehouse has acknowledged the write.
    async fn append(&self, table: &TableId, rows: &[TypedRow]) -> Result<usize>;
}

/// Builds the warehouse selected by `WAREHOUSE`.
pub async fn connect(cfg: &Config) -> Result<Box<dyn Warehouse>> {
    match cfg.warehouse {
        WarehouseKind::BigQuery => {
            let tokens: Box<dyn TokenSource> = match &cfg.bigquery_access_token {
                Some(token) => Box::new(StaticToken(token.clone())),
                None => Box::new(DefaultCredentials::discover().await?),
            };
            Ok(Box::new(BigQueryWarehouse::new(
                &cfg.bigquery_api_url,
                tokens,
                cfg.bigquery_location.clone(),
                cfg.load_timeout,
            )?))
        }
        WarehouseKind::Sqlite => Ok(Box::new(SqliteWarehouse::connect(&cfg.sqlite_path).await?)),
    }
}
