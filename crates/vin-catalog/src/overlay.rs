//! Community overlay composition
//!
//! Overlays describe additional WMIs, schemas, and patterns by name rather
//! than by id, so contributions compose against any base catalog revision.
//! Composition resolves each name against the base layer (reusing the base
//! id when the name already exists, minting a layer-local id above the base
//! id range otherwise) and appends a community layer. The base layer is
//! never touched.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entities::{
    AttributeRef, IdName, LookupTable, PatternKeys, PatternRecord, SchemaKey, VinSchemaRecord,
    WmiKey, WmiRecord,
};
use crate::store::{CatalogData, LinkedSchema, MemoryCatalog};
use crate::{CatalogError, CatalogResult};

/// A community contribution bundle. Serde document, typically JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverlayBundle {
    pub name: Option<String>,
    #[serde(default)]
    pub wmis: Vec<OverlayWmi>,
    #[serde(default)]
    pub schemas: Vec<OverlaySchema>,
}

impl OverlayBundle {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayWmi {
    pub code: String,
    pub manufacturer: String,
    pub make: Option<String>,
    pub country: Option<String>,
    pub vehicle_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlaySchema {
    pub name: String,
    /// WMI codes this schema applies to; overlay WMIs first, then base.
    pub wmis: Vec<String>,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub patterns: Vec<OverlayPattern>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayPattern {
    pub keys: String,
    /// Element name, e.g. "Model" or "Fuel Type - Primary". Must exist in
    /// the base catalog; overlays add vocabulary, not semantics.
    pub element: String,
    /// Lookup value name for lookup-backed elements, literal text otherwise.
    pub value: String,
}

/// Name resolver that reuses base ids and mints layer-local ones above the
/// base id range.
struct LookupMinter<'a> {
    catalog: &'a MemoryCatalog,
    next_ids: HashMap<LookupTable, i64>,
    minted: HashMap<(LookupTable, String), i64>,
    rows: HashMap<LookupTable, Vec<IdName>>,
}

impl<'a> LookupMinter<'a> {
    fn new(catalog: &'a MemoryCatalog) -> Self {
        LookupMinter {
            catalog,
            next_ids: HashMap::new(),
            minted: HashMap::new(),
            rows: HashMap::new(),
        }
    }

    fn resolve(&mut self, table: LookupTable, name: &str) -> i64 {
        let base = self.catalog.base();
        if let Some(rows) = base.lookups.get(&table) {
            if let Some((id, _)) = rows
                .iter()
                .find(|(_, existing)| existing.eq_ignore_ascii_case(name))
            {
                return *id;
            }
        }

        let key = (table, name.to_ascii_lowercase());
        if let Some(id) = self.minted.get(&key) {
            return *id;
        }

        let next = self
            .next_ids
            .entry(table)
            .or_insert_with(|| base.max_lookup_id(table) + 1);
        let id = *next;
        *next += 1;
        self.minted.insert(key, id);
        self.rows
            .entry(table)
            .or_default()
            .push(IdName { id, name: name.to_string() });
        debug!(table = %table, name, id, "minted overlay lookup row");
        id
    }
}

impl MemoryCatalog {
    /// Compose a community overlay as a new layer on top of this catalog.
    pub fn with_overlay(self, bundle: &OverlayBundle) -> CatalogResult<Self> {
        let new_layer = self.layer_count() as u16;
        let mut minter = LookupMinter::new(&self);
        let base = self.base();

        let mut data = CatalogData::default();
        let mut links: Vec<(WmiKey, LinkedSchema)> = Vec::new();

        let mut next_wmi_id = base.wmis.keys().max().copied().unwrap_or(0) + 1;
        let mut overlay_wmis: HashMap<String, WmiRecord> = HashMap::new();
        for wmi in &bundle.wmis {
            let record = WmiRecord {
                id: next_wmi_id,
                code: wmi.code.trim().to_ascii_uppercase(),
                manufacturer_id: Some(minter.resolve(LookupTable::Manufacturer, &wmi.manufacturer)),
                make_id: wmi
                    .make
                    .as_deref()
                    .map(|name| minter.resolve(LookupTable::Make, name)),
                vehicle_type_id: wmi
                    .vehicle_type
                    .as_deref()
                    .map(|name| minter.resolve(LookupTable::VehicleType, name)),
                country_id: wmi
                    .country
                    .as_deref()
                    .map(|name| minter.resolve(LookupTable::Country, name)),
            };
            next_wmi_id += 1;
            overlay_wmis.insert(record.code.clone(), record.clone());
            data.wmis.push(record);
        }

        let mut next_schema_id = base.schemas.keys().max().copied().unwrap_or(0) + 1;
        let mut next_pattern_id = 1;
        for schema in &bundle.schemas {
            let schema_id = next_schema_id;
            next_schema_id += 1;

            let mut schema_make: Option<i64> = None;
            let mut linked_any = false;
            for code in &schema.wmis {
                let code = code.trim().to_ascii_uppercase();
                let link = LinkedSchema {
                    schema: SchemaKey { layer: new_layer, id: schema_id },
                    year_from: schema.year_from,
                    year_to: schema.year_to,
                };
                if let Some(record) = overlay_wmis.get(&code) {
                    links.push((WmiKey { layer: new_layer, id: record.id }, link));
                    schema_make = schema_make.or(record.make_id);
                    linked_any = true;
                } else if let Some(ids) = base.wmi_by_code.get(&code) {
                    for id in ids {
                        links.push((WmiKey { layer: 0, id: *id }, link));
                        schema_make = schema_make.or(base.wmis[id].make_id);
                    }
                    linked_any = true;
                }
            }
            if !linked_any {
                return Err(CatalogError::UnknownOverlayWmi {
                    schema: schema.name.clone(),
                    wmi: schema.wmis.join(","),
                });
            }

            data.vin_schemas.push(VinSchemaRecord {
                id: schema_id,
                name: schema.name.clone(),
                source_wmi: schema.wmis.first().cloned(),
                notes: bundle.name.clone(),
            });

            for pattern in &schema.patterns {
                let element = base
                    .elements
                    .values()
                    .find(|e| e.name.eq_ignore_ascii_case(&pattern.element))
                    .ok_or_else(|| CatalogError::UnknownElement(pattern.element.clone()))?;

                let attribute = match element.lookup_table {
                    Some(LookupTable::Model) => {
                        let model_id = minter.resolve(LookupTable::Model, &pattern.value);
                        if let Some(make_id) = schema_make {
                            data.make_models.push((make_id, model_id));
                        }
                        AttributeRef::Lookup(model_id)
                    }
                    Some(table) => AttributeRef::Lookup(minter.resolve(table, &pattern.value)),
                    None => AttributeRef::Literal(pattern.value.clone()),
                };

                data.patterns.push(PatternRecord {
                    id: next_pattern_id,
                    vin_schema_id: schema_id,
                    keys: PatternKeys::parse(&pattern.keys)?,
                    element_id: element.id,
                    attribute,
                });
                next_pattern_id += 1;
            }
        }

        data.lookups = minter.rows;

        let mut catalog = self;
        catalog.push_layer(data, links);
        Ok(catalog)
    }
}
