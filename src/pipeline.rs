use tracing::info;

use crate::error::Result;
use crate::extract::{Extractor, PageSession};
use crate::transform::{ist_now, transform};
use crate::types::TableId;
use crate::warehouse::Warehouse;

/// One scrape, one transform, one load. Nothing reaches the warehouse unless
/// extraction and transformation both succeed for the whole batch.
pub async fn run_once<S: PageSession + ?Sized>(
    extractor: &Extractor,
    session: &mut S,
    warehouse: &dyn Warehouse,
    table: &TableId,
) -> Result<usize> {
    let raw = extractor.extract(session).await?;
    info!(rows = raw.len(), "Extraction complete");

    let batch = transform(raw, ist_now())?;
    info!(rows = batch.len(), "Transform complete");

    let appended = warehouse.append(table, &batch).await?;
    info!(rows = appended, %table, "Data appended to warehouse table");
    Ok(appended)
}
