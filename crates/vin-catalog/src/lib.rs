//! Embedded automotive catalog for offline VIN decoding
//!
//! This crate owns the entity tables derived from the NHTSA vPIC dataset,
//! the read-only [`CatalogStore`] capability the decoder consumes, the
//! in-memory layered catalog, the SQLite loader, and community-overlay
//! composition.

pub mod entities;
pub mod overlay;
pub mod sqlite;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use entities::{
    AttributeRef, ElementRecord, IdName, LookupTable, PatternKeys, PatternRecord, PatternSource,
    SchemaKey, VinSchemaRecord, WmiKey, WmiRecord, WmiVinSchemaRecord,
};
pub use overlay::{OverlayBundle, OverlayPattern, OverlaySchema, OverlayWmi};
pub use store::{CatalogData, MemoryCatalog};

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("catalog query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("unknown lookup table '{0}' in catalog data")]
    UnknownLookupTable(String),

    #[error("invalid pattern keys '{0}' (expected 6 characters over A-Z, 0-9, '*')")]
    InvalidPatternKeys(String),

    #[error("overlay references unknown element '{0}'")]
    UnknownElement(String),

    #[error("overlay schema '{schema}' references unknown WMI '{wmi}'")]
    UnknownOverlayWmi { schema: String, wmi: String },

    #[error("catalog layer {0} does not exist")]
    UnknownLayer(u16),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// A WMI row together with its cross-layer identity and join context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WmiHit {
    pub key: WmiKey,
    pub record: WmiRecord,
    /// Whether any `Wmi_Make` rows link this WMI to makes.
    pub has_make_link: bool,
    pub source: PatternSource,
}

/// A VIN schema selected for a WMI, with the year window that admitted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaHit {
    pub key: SchemaKey,
    pub name: String,
    pub source: PatternSource,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
}

/// Outcome of resolving a Model id under a make context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelResolution {
    pub name: String,
    /// The model exists but is not linked to the requested make.
    pub make_mismatch: bool,
}

/// Read-only query capability over the catalog.
///
/// Decoding suspends only at these reads; implementations may be backed by
/// synchronous in-memory indexes ([`MemoryCatalog`]) or by an asynchronous
/// adapter. Implementations must be safe for concurrent readers and must
/// never mutate shared state on a read path.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// All WMI rows whose code equals `code` (3 or 6 characters), across
    /// every layer, base layer first.
    async fn wmis_by_code(&self, code: &str) -> CatalogResult<Vec<WmiHit>>;

    /// Make ids linked to a WMI through `Wmi_Make`, ascending.
    async fn makes_for_wmi(&self, wmi: WmiKey) -> CatalogResult<Vec<i64>>;

    /// Schemas linked to a WMI that are active for `model_year`
    /// (`year_from <= y <= coalesce(year_to, +inf)`). `None` selects all.
    async fn schemas_for_wmi(
        &self,
        wmi: WmiKey,
        model_year: Option<i32>,
    ) -> CatalogResult<Vec<SchemaHit>>;

    /// The pattern list of a schema. Materialized once per catalog handle.
    async fn patterns_for_schema(&self, schema: SchemaKey) -> CatalogResult<Arc<[PatternRecord]>>;

    /// Element row by id, resolving through the layer's base fallback.
    async fn element(&self, layer: u16, element_id: i64) -> CatalogResult<Option<ElementRecord>>;

    /// Name for `id` in the given lookup table, checking the layer first
    /// and falling back to the base layer.
    async fn lookup_name(
        &self,
        layer: u16,
        table: LookupTable,
        id: i64,
    ) -> CatalogResult<Option<String>>;

    /// Model name resolution honoring the `Make_Model` join. With a make
    /// context, a model that exists globally but is not linked to the make
    /// reports `make_mismatch`.
    async fn model_name(
        &self,
        layer: u16,
        make_id: Option<i64>,
        model_id: i64,
    ) -> CatalogResult<Option<ModelResolution>>;

    /// Largest element weight across the catalog; the confidence normalizer.
    async fn max_element_weight(&self) -> CatalogResult<i32>;
}
