//! In-memory layered catalog
//!
//! [`MemoryCatalog`] compiles one [`CatalogData`] bundle per layer into
//! lookup indexes at construction and is immutable afterwards, so any
//! number of concurrent decodes can read it without locks. Layer 0 is the
//! official base; overlays are appended as community layers and resolve
//! name references through a base fallback.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::entities::{
    ElementRecord, IdName, LookupTable, PatternRecord, PatternSource, SchemaKey, VinSchemaRecord,
    WmiKey, WmiRecord, WmiVinSchemaRecord,
};
use crate::{CatalogError, CatalogResult, CatalogStore, ModelResolution, SchemaHit, WmiHit};

/// Raw tables of a single catalog layer, as produced by the SQLite loader
/// or built directly in tests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogData {
    pub wmis: Vec<WmiRecord>,
    /// `Wmi_Make(WmiId, MakeId)` rows.
    pub wmi_makes: Vec<(i64, i64)>,
    pub vin_schemas: Vec<VinSchemaRecord>,
    pub wmi_vin_schemas: Vec<WmiVinSchemaRecord>,
    pub elements: Vec<ElementRecord>,
    pub patterns: Vec<PatternRecord>,
    pub lookups: HashMap<LookupTable, Vec<IdName>>,
    /// `Make_Model(MakeId, ModelId)` rows.
    pub make_models: Vec<(i64, i64)>,
}

/// One compiled layer.
#[derive(Debug)]
pub(crate) struct CatalogLayer {
    pub(crate) source: PatternSource,
    pub(crate) wmis: HashMap<i64, WmiRecord>,
    pub(crate) wmi_by_code: HashMap<String, Vec<i64>>,
    pub(crate) wmi_make_links: HashMap<i64, Vec<i64>>,
    pub(crate) schemas: HashMap<i64, VinSchemaRecord>,
    pub(crate) patterns_by_schema: HashMap<i64, Arc<[PatternRecord]>>,
    pub(crate) elements: HashMap<i64, ElementRecord>,
    pub(crate) lookups: HashMap<LookupTable, HashMap<i64, String>>,
    pub(crate) make_models: HashSet<(i64, i64)>,
}

impl CatalogLayer {
    fn compile(data: CatalogData, source: PatternSource) -> Self {
        let elements: HashMap<i64, ElementRecord> =
            data.elements.into_iter().map(|e| (e.id, e)).collect();

        let schemas: HashMap<i64, VinSchemaRecord> =
            data.vin_schemas.into_iter().map(|s| (s.id, s)).collect();

        let mut grouped: HashMap<i64, Vec<PatternRecord>> = HashMap::new();
        for pattern in data.patterns {
            if !schemas.contains_key(&pattern.vin_schema_id) {
                warn!(
                    pattern_id = pattern.id,
                    schema_id = pattern.vin_schema_id,
                    "pattern references missing schema, skipped"
                );
                continue;
            }
            grouped.entry(pattern.vin_schema_id).or_default().push(pattern);
        }
        let patterns_by_schema = grouped
            .into_iter()
            .map(|(schema_id, mut rows)| {
                rows.sort_by_key(|p| p.id);
                (schema_id, Arc::from(rows.into_boxed_slice()))
            })
            .collect();

        let mut wmi_by_code: HashMap<String, Vec<i64>> = HashMap::new();
        let mut wmis = HashMap::new();
        for wmi in data.wmis {
            wmi_by_code
                .entry(wmi.code.to_ascii_uppercase())
                .or_default()
                .push(wmi.id);
            wmis.insert(wmi.id, wmi);
        }
        for ids in wmi_by_code.values_mut() {
            ids.sort_unstable();
        }

        let mut wmi_make_links: HashMap<i64, Vec<i64>> = HashMap::new();
        for (wmi_id, make_id) in data.wmi_makes {
            wmi_make_links.entry(wmi_id).or_default().push(make_id);
        }
        for makes in wmi_make_links.values_mut() {
            makes.sort_unstable();
        }

        let lookups = data
            .lookups
            .into_iter()
            .map(|(table, rows)| {
                (table, rows.into_iter().map(|r| (r.id, r.name)).collect())
            })
            .collect();

        CatalogLayer {
            source,
            wmis,
            wmi_by_code,
            wmi_make_links,
            schemas,
            patterns_by_schema,
            elements,
            lookups,
            make_models: data.make_models.into_iter().collect(),
        }
    }

    pub(crate) fn max_lookup_id(&self, table: LookupTable) -> i64 {
        self.lookups
            .get(&table)
            .and_then(|rows| rows.keys().max().copied())
            .unwrap_or(0)
    }

    fn max_weight(&self) -> i32 {
        self.elements.values().map(|e| e.weight).max().unwrap_or(0)
    }
}

/// A schema link resolved to cross-layer identities at compose time.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LinkedSchema {
    pub(crate) schema: SchemaKey,
    pub(crate) year_from: Option<i32>,
    pub(crate) year_to: Option<i32>,
}

/// Immutable, multi-layer catalog behind the [`CatalogStore`] capability.
#[derive(Debug)]
pub struct MemoryCatalog {
    pub(crate) layers: Vec<CatalogLayer>,
    pub(crate) schema_links: HashMap<WmiKey, Vec<LinkedSchema>>,
    max_weight: i32,
}

impl MemoryCatalog {
    /// Compile the official base layer.
    pub fn new(base: CatalogData) -> Self {
        let mut schema_links: HashMap<WmiKey, Vec<LinkedSchema>> = HashMap::new();
        for link in &base.wmi_vin_schemas {
            schema_links
                .entry(WmiKey { layer: 0, id: link.wmi_id })
                .or_default()
                .push(LinkedSchema {
                    schema: SchemaKey { layer: 0, id: link.vin_schema_id },
                    year_from: link.year_from,
                    year_to: link.year_to,
                });
        }

        let layer = CatalogLayer::compile(base, PatternSource::Official);
        let max_weight = layer.max_weight();
        MemoryCatalog {
            layers: vec![layer],
            schema_links,
            max_weight,
        }
    }

    pub(crate) fn base(&self) -> &CatalogLayer {
        &self.layers[0]
    }

    pub(crate) fn layer(&self, layer: u16) -> CatalogResult<&CatalogLayer> {
        self.layers
            .get(layer as usize)
            .ok_or(CatalogError::UnknownLayer(layer))
    }

    /// Number of layers, overlays included.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub(crate) fn push_layer(
        &mut self,
        data: CatalogData,
        links: Vec<(WmiKey, LinkedSchema)>,
    ) -> u16 {
        let layer = CatalogLayer::compile(data, PatternSource::Community);
        self.layers.push(layer);
        for (wmi, link) in links {
            self.schema_links.entry(wmi).or_default().push(link);
        }
        (self.layers.len() - 1) as u16
    }

    /// Name lookup with base-layer fallback for overlay layers.
    fn lookup_in(&self, layer: u16, table: LookupTable, id: i64) -> CatalogResult<Option<String>> {
        let own = self
            .layer(layer)?
            .lookups
            .get(&table)
            .and_then(|rows| rows.get(&id));
        if let Some(name) = own {
            return Ok(Some(name.clone()));
        }
        if layer != 0 {
            return Ok(self
                .base()
                .lookups
                .get(&table)
                .and_then(|rows| rows.get(&id))
                .cloned());
        }
        Ok(None)
    }

    fn make_model_linked(&self, layer: u16, make_id: i64, model_id: i64) -> CatalogResult<bool> {
        if self.layer(layer)?.make_models.contains(&(make_id, model_id)) {
            return Ok(true);
        }
        Ok(layer != 0 && self.base().make_models.contains(&(make_id, model_id)))
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn wmis_by_code(&self, code: &str) -> CatalogResult<Vec<WmiHit>> {
        let needle = code.to_ascii_uppercase();
        let mut hits = Vec::new();
        for (idx, layer) in self.layers.iter().enumerate() {
            let Some(ids) = layer.wmi_by_code.get(&needle) else {
                continue;
            };
            for id in ids {
                let record = layer.wmis[id].clone();
                hits.push(WmiHit {
                    key: WmiKey { layer: idx as u16, id: *id },
                    has_make_link: layer.wmi_make_links.contains_key(id),
                    source: layer.source,
                    record,
                });
            }
        }
        Ok(hits)
    }

    async fn makes_for_wmi(&self, wmi: WmiKey) -> CatalogResult<Vec<i64>> {
        Ok(self
            .layer(wmi.layer)?
            .wmi_make_links
            .get(&wmi.id)
            .cloned()
            .unwrap_or_default())
    }

    async fn schemas_for_wmi(
        &self,
        wmi: WmiKey,
        model_year: Option<i32>,
    ) -> CatalogResult<Vec<SchemaHit>> {
        let Some(links) = self.schema_links.get(&wmi) else {
            return Ok(Vec::new());
        };

        let mut hits = Vec::new();
        for link in links {
            if let Some(year) = model_year {
                let from_ok = link.year_from.map_or(true, |from| from <= year);
                let to_ok = link.year_to.map_or(true, |to| year <= to);
                if !(from_ok && to_ok) {
                    continue;
                }
            }
            let layer = self.layer(link.schema.layer)?;
            let Some(schema) = layer.schemas.get(&link.schema.id) else {
                warn!(schema_id = link.schema.id, "schema link references missing schema");
                continue;
            };
            hits.push(SchemaHit {
                key: link.schema,
                name: schema.name.clone(),
                source: layer.source,
                year_from: link.year_from,
                year_to: link.year_to,
            });
        }
        hits.sort_by_key(|h| h.key);
        Ok(hits)
    }

    async fn patterns_for_schema(&self, schema: SchemaKey) -> CatalogResult<Arc<[PatternRecord]>> {
        Ok(self
            .layer(schema.layer)?
            .patterns_by_schema
            .get(&schema.id)
            .cloned()
            .unwrap_or_else(|| Arc::from(Vec::new().into_boxed_slice())))
    }

    async fn element(&self, layer: u16, element_id: i64) -> CatalogResult<Option<ElementRecord>> {
        if let Some(element) = self.layer(layer)?.elements.get(&element_id) {
            return Ok(Some(element.clone()));
        }
        if layer != 0 {
            return Ok(self.base().elements.get(&element_id).cloned());
        }
        Ok(None)
    }

    async fn lookup_name(
        &self,
        layer: u16,
        table: LookupTable,
        id: i64,
    ) -> CatalogResult<Option<String>> {
        self.lookup_in(layer, table, id)
    }

    async fn model_name(
        &self,
        layer: u16,
        make_id: Option<i64>,
        model_id: i64,
    ) -> CatalogResult<Option<ModelResolution>> {
        let Some(name) = self.lookup_in(layer, LookupTable::Model, model_id)? else {
            return Ok(None);
        };
        let make_mismatch = match make_id {
            Some(make) => !self.make_model_linked(layer, make, model_id)?,
            None => false,
        };
        Ok(Some(ModelResolution { name, make_mismatch }))
    }

    async fn max_element_weight(&self) -> CatalogResult<i32> {
        Ok(self.max_weight)
    }
}
