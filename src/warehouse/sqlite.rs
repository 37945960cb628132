use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::error::Result;
use crate::types::{TableId, TypedRow};
use crate::warehouse::Warehouse;

/// Local append-only table, one per `TableId` table segment.
pub struct SqliteWarehouse {
    pool: SqlitePool,
}

impl SqliteWarehouse {
    pub async fn connect(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        info!("SQLite warehouse ready at {path}");
        Ok(Self { pool })
    }

    #[cfg(test)]
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Warehouse for SqliteWarehouse {
    async fn append(&self, table: &TableId, rows: &[TypedRow]) -> Result<usize> {
        // TableId segments are restricted to [A-Za-z0-9_-], so quoting is enough.
        let name = &table.table;
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{name}" (
                name_symbol       TEXT NOT NULL,
                current_price     REAL NOT NULL,
                Change_24_hours   TEXT NOT NULL,
                Change_7_days     TEXT NOT NULL,
                market_cap        REAL NOT NULL,
                volume_24_hour    REAL NOT NULL,
                volume_change     TEXT NOT NULL,
                percentage_change REAL,
                zscore_price      REAL,
                rolling_avg       REAL,
                datetime_ist      TEXT NOT NULL
            )
            "#
        ))
        .execute(&mut *tx)
        .await?;

        let insert = format!(
            r#"
            INSERT INTO "{name}" (
                name_symbol, current_price, Change_24_hours, Change_7_days,
                market_cap, volume_24_hour, volume_change,
                percentage_change, zscore_price, rolling_avg, datetime_ist
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        );
        for row in rows {
            sqlx::query(&insert)
                .bind(&row.name_symbol)
                .bind(row.current_price)
                .bind(&row.change_24h)
                .bind(&row.change_7d)
                .bind(row.market_cap)
                .bind(row.volume_24h)
                .bind(&row.volume_change)
                .bind(row.percentage_change)
                .bind(row.zscore_price)
                .bind(row.rolling_avg)
                .bind(&row.datetime_ist)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(rows.len())
    }
}
