//! Schema selection
//!
//! Picks the VIN schemas linked to the resolved WMI that are active for the
//! resolved model year, and materializes their pattern lists for the
//! matcher. An unknown year keeps every schema in play.

use std::sync::Arc;

use tracing::debug;

use vin_catalog::{CatalogResult, CatalogStore, PatternRecord, SchemaHit, WmiKey};

/// A selected schema with its pattern list.
#[derive(Debug, Clone)]
pub struct SelectedSchema {
    pub hit: SchemaHit,
    pub patterns: Arc<[PatternRecord]>,
}

pub async fn select(
    store: &dyn CatalogStore,
    wmi: WmiKey,
    model_year: Option<i32>,
) -> CatalogResult<Vec<SelectedSchema>> {
    let hits = store.schemas_for_wmi(wmi, model_year).await?;
    let mut selected = Vec::with_capacity(hits.len());
    for hit in hits {
        let patterns = store.patterns_for_schema(hit.key).await?;
        selected.push(SelectedSchema { hit, patterns });
    }
    debug!(
        ?wmi,
        year = ?model_year,
        schemas = selected.len(),
        "schemas selected"
    );
    Ok(selected)
}
