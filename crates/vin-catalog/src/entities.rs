//! Catalog entity tables
//!
//! Row types mirror the canonical vPIC-shaped tables. Ids are plain `i64`
//! and are only meaningful within their catalog layer; cross-layer identity
//! is the `(layer, id)` pair carried by [`WmiKey`]/[`SchemaKey`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{CatalogError, CatalogResult};

/// Provenance of a catalog layer and the patterns it contributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternSource {
    Official,
    Community,
}

impl fmt::Display for PatternSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternSource::Official => write!(f, "official"),
            PatternSource::Community => write!(f, "community"),
        }
    }
}

/// Closed set of lookup tables an element may resolve through.
///
/// Catalog rows naming any other table are rejected at load time; the
/// decoder never builds a query from an uncontrolled table name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LookupTable {
    Make,
    Model,
    BodyStyle,
    FuelType,
    ElectrificationLevel,
    Country,
    Manufacturer,
    VehicleType,
    DriveType,
    Transmission,
}

impl LookupTable {
    pub const ALL: [LookupTable; 10] = [
        LookupTable::Make,
        LookupTable::Model,
        LookupTable::BodyStyle,
        LookupTable::FuelType,
        LookupTable::ElectrificationLevel,
        LookupTable::Country,
        LookupTable::Manufacturer,
        LookupTable::VehicleType,
        LookupTable::DriveType,
        LookupTable::Transmission,
    ];

    /// Canonical table name as it appears in the persisted catalog.
    pub fn table_name(&self) -> &'static str {
        match self {
            LookupTable::Make => "Make",
            LookupTable::Model => "Model",
            LookupTable::BodyStyle => "BodyStyle",
            LookupTable::FuelType => "FuelType",
            LookupTable::ElectrificationLevel => "ElectrificationLevel",
            LookupTable::Country => "Country",
            LookupTable::Manufacturer => "Manufacturer",
            LookupTable::VehicleType => "VehicleType",
            LookupTable::DriveType => "DriveType",
            LookupTable::Transmission => "Transmission",
        }
    }
}

impl FromStr for LookupTable {
    type Err = CatalogError;

    fn from_str(s: &str) -> CatalogResult<Self> {
        let trimmed = s.trim();
        LookupTable::ALL
            .iter()
            .copied()
            .find(|t| t.table_name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| CatalogError::UnknownLookupTable(trimmed.to_string()))
    }
}

impl fmt::Display for LookupTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Validated 6-character wildcard keys matched against VDS positions 4..9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PatternKeys([u8; 6]);

impl PatternKeys {
    pub const WILDCARD: u8 = b'*';

    /// Parse and validate keys: exactly 6 characters over {A-Z, 0-9, '*'}.
    pub fn parse(raw: &str) -> CatalogResult<Self> {
        let bytes = raw.trim().as_bytes();
        if bytes.len() != 6 {
            return Err(CatalogError::InvalidPatternKeys(raw.to_string()));
        }
        let mut keys = [0u8; 6];
        for (i, &b) in bytes.iter().enumerate() {
            let up = b.to_ascii_uppercase();
            if up == Self::WILDCARD || up.is_ascii_digit() || up.is_ascii_uppercase() {
                keys[i] = up;
            } else {
                return Err(CatalogError::InvalidPatternKeys(raw.to_string()));
            }
        }
        Ok(PatternKeys(keys))
    }

    /// Match against the six VDS bytes. Returns the specificity (count of
    /// literal positions) on a match, `None` otherwise.
    pub fn matches(&self, vds: &[u8; 6]) -> Option<u8> {
        let mut specificity = 0u8;
        for (k, v) in self.0.iter().zip(vds.iter()) {
            if *k == Self::WILDCARD {
                continue;
            }
            if k != v {
                return None;
            }
            specificity += 1;
        }
        Some(specificity)
    }

    /// Number of literal (non-wildcard) positions, 0..=6.
    pub fn specificity(&self) -> u8 {
        self.0.iter().filter(|&&b| b != Self::WILDCARD).count() as u8
    }

    pub fn as_str(&self) -> &str {
        // Validated ASCII at construction.
        std::str::from_utf8(&self.0).expect("pattern keys are ASCII")
    }
}

impl fmt::Display for PatternKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for PatternKeys {
    type Error = CatalogError;

    fn try_from(value: String) -> CatalogResult<Self> {
        PatternKeys::parse(&value)
    }
}

impl From<PatternKeys> for String {
    fn from(keys: PatternKeys) -> String {
        keys.as_str().to_string()
    }
}

/// What a pattern assigns to its element, decided once at load time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeRef {
    /// Foreign key into the element's lookup table.
    Lookup(i64),
    /// Verbatim value for elements without a lookup table.
    Literal(String),
}

/// `Wmi(Id, Wmi, ManufacturerId, MakeId?, VehicleTypeId, CountryId)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WmiRecord {
    pub id: i64,
    /// 3-character code, or 6 characters for low-volume manufacturers
    /// (positions 1..3 followed by 12..14).
    pub code: String,
    pub manufacturer_id: Option<i64>,
    pub make_id: Option<i64>,
    pub vehicle_type_id: Option<i64>,
    pub country_id: Option<i64>,
}

/// `VinSchema(Id, Name, sourcewmi, Notes?)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VinSchemaRecord {
    pub id: i64,
    pub name: String,
    pub source_wmi: Option<String>,
    pub notes: Option<String>,
}

/// `Wmi_VinSchema(Id, WmiId, VinSchemaId, YearFrom, YearTo?)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WmiVinSchemaRecord {
    pub id: i64,
    pub wmi_id: i64,
    pub vin_schema_id: i64,
    pub year_from: Option<i32>,
    /// `None` means open-ended.
    pub year_to: Option<i32>,
}

/// `Pattern(Id, VinSchemaId, Keys[6], ElementId, AttributeId)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRecord {
    pub id: i64,
    pub vin_schema_id: i64,
    pub keys: PatternKeys,
    pub element_id: i64,
    pub attribute: AttributeRef,
}

/// `Element(Id, Name, LookupTable?, Weight)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementRecord {
    pub id: i64,
    pub name: String,
    pub lookup_table: Option<LookupTable>,
    /// Integer priority; the primary ranking key during scoring.
    pub weight: i32,
}

/// One row of an `(Id, Name)` lookup table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdName {
    pub id: i64,
    pub name: String,
}

/// Cross-layer identity of a WMI row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WmiKey {
    pub layer: u16,
    pub id: i64,
}

/// Cross-layer identity of a VIN schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaKey {
    pub layer: u16,
    pub id: i64,
}
