//! SQLite catalog loader
//!
//! Reads the canonical vPIC-shaped tables from a local catalog file into
//! [`CatalogData`]. The file is opened read-only and the connection is
//! dropped once the tables are materialized; decoding never touches the
//! database again.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use tracing::{debug, warn};

use crate::entities::{
    AttributeRef, ElementRecord, IdName, LookupTable, PatternKeys, PatternRecord, VinSchemaRecord,
    WmiRecord, WmiVinSchemaRecord,
};
use crate::store::CatalogData;
use crate::{CatalogError, CatalogResult};

#[derive(Debug, FromRow)]
struct RawWmi {
    id: i64,
    code: String,
    manufacturer_id: Option<i64>,
    make_id: Option<i64>,
    vehicle_type_id: Option<i64>,
    country_id: Option<i64>,
}

#[derive(Debug, FromRow)]
struct RawVinSchema {
    id: i64,
    name: String,
    source_wmi: Option<String>,
    notes: Option<String>,
}

#[derive(Debug, FromRow)]
struct RawWmiVinSchema {
    id: i64,
    wmi_id: i64,
    vin_schema_id: i64,
    year_from: Option<i64>,
    year_to: Option<i64>,
}

#[derive(Debug, FromRow)]
struct RawElement {
    id: i64,
    name: String,
    lookup_table: Option<String>,
    weight: Option<i64>,
}

#[derive(Debug, FromRow)]
struct RawPattern {
    id: i64,
    vin_schema_id: i64,
    keys: String,
    element_id: i64,
    attribute_id: String,
}

/// Load a full catalog layer from a read-only SQLite file.
pub async fn load_sqlite(path: &Path) -> CatalogResult<CatalogData> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .read_only(true)
        .immutable(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    let data = load_from_pool(&pool).await;
    pool.close().await;
    data
}

async fn load_from_pool(pool: &SqlitePool) -> CatalogResult<CatalogData> {
    let wmis: Vec<RawWmi> = sqlx::query_as(
        "SELECT Id AS id, Wmi AS code, ManufacturerId AS manufacturer_id, \
         MakeId AS make_id, VehicleTypeId AS vehicle_type_id, CountryId AS country_id \
         FROM Wmi",
    )
    .fetch_all(pool)
    .await?;

    let wmi_makes: Vec<(i64, i64)> =
        sqlx::query_as("SELECT WmiId, MakeId FROM Wmi_Make")
            .fetch_all(pool)
            .await?;

    let vin_schemas: Vec<RawVinSchema> = sqlx::query_as(
        "SELECT Id AS id, Name AS name, sourcewmi AS source_wmi, Notes AS notes FROM VinSchema",
    )
    .fetch_all(pool)
    .await?;

    let wmi_vin_schemas: Vec<RawWmiVinSchema> = sqlx::query_as(
        "SELECT Id AS id, WmiId AS wmi_id, VinSchemaId AS vin_schema_id, \
         YearFrom AS year_from, YearTo AS year_to \
         FROM Wmi_VinSchema",
    )
    .fetch_all(pool)
    .await?;

    let raw_elements: Vec<RawElement> = sqlx::query_as(
        "SELECT Id AS id, Name AS name, LookupTable AS lookup_table, Weight AS weight \
         FROM Element",
    )
    .fetch_all(pool)
    .await?;

    let mut elements = Vec::with_capacity(raw_elements.len());
    for raw in raw_elements {
        let lookup_table = match raw.lookup_table.as_deref() {
            None => None,
            Some(name) if name.trim().is_empty() => None,
            Some(name) => Some(LookupTable::from_str(name).map_err(|_| {
                CatalogError::UnknownLookupTable(format!("{} (element '{}')", name, raw.name))
            })?),
        };
        elements.push(ElementRecord {
            id: raw.id,
            name: raw.name,
            lookup_table,
            weight: raw.weight.unwrap_or(0) as i32,
        });
    }
    let element_index: HashMap<i64, usize> = elements
        .iter()
        .enumerate()
        .map(|(idx, e)| (e.id, idx))
        .collect();

    let raw_patterns: Vec<RawPattern> = sqlx::query_as(
        "SELECT Id AS id, VinSchemaId AS vin_schema_id, Keys AS keys, \
         ElementId AS element_id, CAST(AttributeId AS TEXT) AS attribute_id \
         FROM Pattern",
    )
    .fetch_all(pool)
    .await?;

    let mut patterns = Vec::with_capacity(raw_patterns.len());
    let mut skipped = 0usize;
    for raw in raw_patterns {
        let keys = match PatternKeys::parse(&raw.keys) {
            Ok(keys) => keys,
            Err(_) => {
                warn!(pattern_id = raw.id, keys = %raw.keys, "malformed pattern keys, skipped");
                skipped += 1;
                continue;
            }
        };
        let Some(element) = element_index.get(&raw.element_id).map(|i| &elements[*i]) else {
            warn!(pattern_id = raw.id, element_id = raw.element_id, "pattern references missing element, skipped");
            skipped += 1;
            continue;
        };

        let attribute_id = raw.attribute_id.trim();
        let attribute = match element.lookup_table {
            Some(_) => match attribute_id.parse::<i64>() {
                Ok(fk) => AttributeRef::Lookup(fk),
                // Lookup-backed elements occasionally carry free text in
                // vPIC exports; keep the text rather than lose the row.
                Err(_) => AttributeRef::Literal(attribute_id.to_string()),
            },
            None => AttributeRef::Literal(attribute_id.to_string()),
        };

        patterns.push(PatternRecord {
            id: raw.id,
            vin_schema_id: raw.vin_schema_id,
            keys,
            element_id: raw.element_id,
            attribute,
        });
    }
    if skipped > 0 {
        warn!(skipped, "skipped malformed pattern rows during catalog load");
    }

    let mut lookups = HashMap::new();
    for table in LookupTable::ALL {
        let rows = load_lookup(pool, table).await?;
        lookups.insert(table, rows);
    }

    let make_models: Vec<(i64, i64)> =
        sqlx::query_as("SELECT MakeId, ModelId FROM Make_Model")
            .fetch_all(pool)
            .await?;

    debug!(
        wmis = wmis.len(),
        schemas = vin_schemas.len(),
        patterns = patterns.len(),
        elements = elements.len(),
        "catalog tables loaded"
    );

    Ok(CatalogData {
        wmis: wmis
            .into_iter()
            .map(|raw| WmiRecord {
                id: raw.id,
                code: raw.code.trim().to_ascii_uppercase(),
                manufacturer_id: raw.manufacturer_id,
                make_id: raw.make_id,
                vehicle_type_id: raw.vehicle_type_id,
                country_id: raw.country_id,
            })
            .collect(),
        wmi_makes,
        vin_schemas: vin_schemas
            .into_iter()
            .map(|raw| VinSchemaRecord {
                id: raw.id,
                name: raw.name,
                source_wmi: raw.source_wmi,
                notes: raw.notes,
            })
            .collect(),
        wmi_vin_schemas: wmi_vin_schemas
            .into_iter()
            .map(|raw| WmiVinSchemaRecord {
                id: raw.id,
                wmi_id: raw.wmi_id,
                vin_schema_id: raw.vin_schema_id,
                year_from: raw.year_from.map(|y| y as i32),
                year_to: raw.year_to.map(|y| y as i32),
            })
            .collect(),
        elements,
        patterns,
        lookups,
        make_models,
    })
}

/// Load one `(Id, Name)` lookup table. A missing table is tolerated;
/// smaller community-built catalogs omit tables they do not populate.
async fn load_lookup(pool: &SqlitePool, table: LookupTable) -> CatalogResult<Vec<IdName>> {
    let sql = format!("SELECT Id AS id, Name AS name FROM {}", table.table_name());
    let rows: Result<Vec<(i64, String)>, sqlx::Error> =
        sqlx::query_as(&sql).fetch_all(pool).await;
    match rows {
        Ok(rows) => Ok(rows
            .into_iter()
            .map(|(id, name)| IdName { id, name })
            .collect()),
        Err(err) => {
            if err
                .as_database_error()
                .map_or(false, |db| db.message().contains("no such table"))
            {
                warn!(table = %table, "lookup table missing from catalog");
                Ok(Vec::new())
            } else {
                Err(err.into())
            }
        }
    }
}
