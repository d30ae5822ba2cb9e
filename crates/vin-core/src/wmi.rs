//! WMI resolution
//!
//! Maps positions 1..3 (and 12..14 for low-volume manufacturers) to a
//! catalog WMI row and resolves the attached manufacturer, make, country
//! and vehicle type names. A shared code across brands is disambiguated by
//! preferring rows with a direct make, then rows with a `Wmi_Make` link,
//! then the lowest (layer, id).

use serde::{Deserialize, Serialize};
use tracing::debug;

use vin_catalog::{CatalogResult, CatalogStore, LookupTable, WmiHit, WmiKey};

use crate::vin::Vin;

/// Resolved WMI context, surfaced as the `wmi` component and fed to the
/// matcher as the make context for Model resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedWmi {
    pub key: WmiKey,
    /// The catalog code that matched (3 or 6 characters).
    pub code: String,
    pub make_id: Option<i64>,
    pub manufacturer: Option<String>,
    pub make: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub vehicle_type: Option<String>,
    /// 1.0 for a direct `Wmi.MakeId`, 0.9 when recovered through `Wmi_Make`.
    pub make_confidence: f64,
}

/// ISO 3780 region band for the first VIN character.
pub fn region_for(first: char) -> Option<&'static str> {
    match first {
        'A'..='H' => Some("Africa"),
        'J'..='R' => Some("Asia"),
        'S'..='Z' => Some("Europe"),
        '1'..='5' => Some("North America"),
        '6' | '7' => Some("Oceania"),
        '8' | '9' => Some("South America"),
        _ => None,
    }
}

/// Resolve the WMI for a VIN. Returns `Ok(None)` when the catalog has no
/// row for the code; the pipeline reports that as WMI_NOT_FOUND.
pub async fn resolve(store: &dyn CatalogStore, vin: &Vin) -> CatalogResult<Option<ResolvedWmi>> {
    let mut hits = Vec::new();
    if let Some(extension) = vin.low_volume_extension() {
        let extended = format!("{}{}", vin.wmi_code(), extension);
        hits = store.wmis_by_code(&extended).await?;
        if !hits.is_empty() {
            debug!(code = %extended, "low-volume WMI matched");
        }
    }
    if hits.is_empty() {
        hits = store.wmis_by_code(vin.wmi_code()).await?;
    }

    // Preference chain for codes shared across brands.
    hits.sort_by_key(|hit| {
        (
            hit.record.make_id.is_none(),
            !hit.has_make_link,
            hit.key.layer,
            hit.record.id,
        )
    });
    let Some(hit) = hits.into_iter().next() else {
        return Ok(None);
    };

    Ok(Some(describe(store, hit, vin).await?))
}

async fn describe(
    store: &dyn CatalogStore,
    hit: WmiHit,
    vin: &Vin,
) -> CatalogResult<ResolvedWmi> {
    let layer = hit.key.layer;

    let (make_id, make_confidence) = match hit.record.make_id {
        Some(id) => (Some(id), 1.0),
        None => {
            let linked = store.makes_for_wmi(hit.key).await?;
            match linked.first() {
                Some(id) => (Some(*id), 0.9),
                None => (None, 0.0),
            }
        }
    };

    let manufacturer = match hit.record.manufacturer_id {
        Some(id) => store.lookup_name(layer, LookupTable::Manufacturer, id).await?,
        None => None,
    };
    let make = match make_id {
        Some(id) => store.lookup_name(layer, LookupTable::Make, id).await?,
        None => None,
    };
    let country = match hit.record.country_id {
        Some(id) => store.lookup_name(layer, LookupTable::Country, id).await?,
        None => None,
    };
    let vehicle_type = match hit.record.vehicle_type_id {
        Some(id) => store.lookup_name(layer, LookupTable::VehicleType, id).await?,
        None => None,
    };

    Ok(ResolvedWmi {
        key: hit.key,
        code: hit.record.code,
        make_id,
        manufacturer,
        make,
        country,
        region: region_for(vin.position(1)).map(str::to_string),
        vehicle_type,
        make_confidence,
    })
}
