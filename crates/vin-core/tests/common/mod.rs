//! Shared fixture catalog for the decode pipeline tests
//!
//! A miniature vPIC-shaped catalog: Ford trucks (with the F-150/F-550
//! tiebreak pair), the Honda CR-V, the BMW X1, and a community overlay
//! contributing Shanghai-built Teslas under the LRW WMI.

use std::collections::HashMap;
use std::sync::Arc;

use vin_catalog::{
    AttributeRef, CatalogData, ElementRecord, IdName, LookupTable, MemoryCatalog, OverlayBundle,
    OverlayPattern, OverlaySchema, OverlayWmi, PatternKeys, PatternRecord, VinSchemaRecord,
    WmiRecord, WmiVinSchemaRecord,
};
use vin_core::{Decoder, DecoderConfig};

pub const REFERENCE_YEAR: i32 = 2026;

fn pattern(id: i64, schema: i64, keys: &str, element: i64, attribute: AttributeRef) -> PatternRecord {
    PatternRecord {
        id,
        vin_schema_id: schema,
        keys: PatternKeys::parse(keys).unwrap(),
        element_id: element,
        attribute,
    }
}

fn lookup(id: i64, name: &str) -> IdName {
    IdName { id, name: name.into() }
}

pub fn fixture_catalog() -> CatalogData {
    CatalogData {
        wmis: vec![
            WmiRecord {
                id: 1,
                code: "1FT".into(),
                manufacturer_id: Some(1),
                make_id: Some(1),
                vehicle_type_id: Some(1),
                country_id: Some(1),
            },
            WmiRecord {
                id: 2,
                code: "2HK".into(),
                manufacturer_id: Some(2),
                make_id: Some(2),
                vehicle_type_id: Some(2),
                country_id: Some(2),
            },
            WmiRecord {
                id: 3,
                code: "WBA".into(),
                manufacturer_id: Some(3),
                make_id: Some(3),
                vehicle_type_id: Some(3),
                country_id: Some(3),
            },
        ],
        wmi_makes: Vec::new(),
        vin_schemas: vec![
            VinSchemaRecord {
                id: 101,
                name: "Ford F-150 (P702)".into(),
                source_wmi: Some("1FT".into()),
                notes: None,
            },
            VinSchemaRecord {
                id: 102,
                name: "Ford Super Duty".into(),
                source_wmi: Some("1FT".into()),
                notes: None,
            },
            VinSchemaRecord {
                id: 201,
                name: "Honda CR-V 6G".into(),
                source_wmi: Some("2HK".into()),
                notes: None,
            },
            VinSchemaRecord {
                id: 301,
                name: "BMW X1 (E84)".into(),
                source_wmi: Some("WBA".into()),
                notes: None,
            },
        ],
        wmi_vin_schemas: vec![
            WmiVinSchemaRecord { id: 1, wmi_id: 1, vin_schema_id: 101, year_from: Some(2021), year_to: None },
            WmiVinSchemaRecord { id: 2, wmi_id: 1, vin_schema_id: 102, year_from: Some(2017), year_to: None },
            WmiVinSchemaRecord { id: 3, wmi_id: 2, vin_schema_id: 201, year_from: Some(2022), year_to: Some(2023) },
            WmiVinSchemaRecord { id: 4, wmi_id: 3, vin_schema_id: 301, year_from: Some(2012), year_to: Some(2015) },
        ],
        elements: vec![
            ElementRecord { id: 26, name: "Model".into(), lookup_table: Some(LookupTable::Model), weight: 99 },
            ElementRecord { id: 5, name: "Body Class".into(), lookup_table: Some(LookupTable::BodyStyle), weight: 80 },
            ElementRecord { id: 34, name: "Series".into(), lookup_table: None, weight: 60 },
            ElementRecord { id: 15, name: "Drive Type".into(), lookup_table: Some(LookupTable::DriveType), weight: 50 },
            ElementRecord { id: 24, name: "Fuel Type - Primary".into(), lookup_table: Some(LookupTable::FuelType), weight: 50 },
            ElementRecord { id: 67, name: "Electrification Level".into(), lookup_table: Some(LookupTable::ElectrificationLevel), weight: 40 },
            ElementRecord { id: 11, name: "Displacement (L)".into(), lookup_table: None, weight: 30 },
            ElementRecord { id: 33, name: "Doors".into(), lookup_table: None, weight: 25 },
            ElementRecord { id: 31, name: "Plant City".into(), lookup_table: None, weight: 20 },
            ElementRecord { id: 75, name: "Plant Country".into(), lookup_table: Some(LookupTable::Country), weight: 20 },
        ],
        patterns: vec![
            // Ford Super Duty first: if the coherence tiebreak ever broke,
            // the lower pattern id would hand the win to the F-550.
            pattern(901, 102, "FW****", 26, AttributeRef::Lookup(11)),
            pattern(902, 102, "F*****", 5, AttributeRef::Lookup(1)),
            // Ford F-150: same Model keys, but the schema explains more of
            // the VIN.
            pattern(1001, 101, "FW****", 26, AttributeRef::Lookup(10)),
            pattern(1002, 101, "F*****", 5, AttributeRef::Lookup(1)),
            pattern(1003, 101, "*W****", 15, AttributeRef::Lookup(1)),
            pattern(1004, 101, "**5***", 34, AttributeRef::Literal("XL".into())),
            pattern(1005, 101, "***L8*", 11, AttributeRef::Literal("3.5".into())),
            // Honda CR-V.
            pattern(2001, 201, "RW****", 26, AttributeRef::Lookup(20)),
            pattern(2002, 201, "RW2***", 5, AttributeRef::Lookup(2)),
            pattern(2003, 201, "****2*", 15, AttributeRef::Lookup(2)),
            pattern(2004, 201, "RW****", 33, AttributeRef::Literal("4".into())),
            // BMW X1.
            pattern(3001, 301, "VL****", 26, AttributeRef::Lookup(30)),
            pattern(3002, 301, "VL1***", 5, AttributeRef::Lookup(2)),
            pattern(3003, 301, "VL****", 24, AttributeRef::Lookup(1)),
        ],
        lookups: HashMap::from([
            (LookupTable::Make, vec![lookup(1, "Ford"), lookup(2, "Honda"), lookup(3, "BMW")]),
            (
                LookupTable::Manufacturer,
                vec![
                    lookup(1, "Ford Motor Company"),
                    lookup(2, "Honda Motor Co., Ltd."),
                    lookup(3, "BMW AG"),
                ],
            ),
            (
                LookupTable::Country,
                vec![lookup(1, "United States (USA)"), lookup(2, "Canada"), lookup(3, "Germany")],
            ),
            (
                LookupTable::VehicleType,
                vec![
                    lookup(1, "Truck"),
                    lookup(2, "Multipurpose Passenger Vehicle (MPV)"),
                    lookup(3, "Passenger Car"),
                ],
            ),
            (
                LookupTable::Model,
                vec![lookup(10, "F-150"), lookup(11, "F-550"), lookup(20, "CR-V"), lookup(30, "X1")],
            ),
            (
                LookupTable::BodyStyle,
                vec![lookup(1, "Pickup"), lookup(2, "Sport Utility Vehicle (SUV)")],
            ),
            (
                LookupTable::DriveType,
                vec![
                    lookup(1, "4WD/4-Wheel Drive/4x4"),
                    lookup(2, "AWD/All-Wheel Drive"),
                    lookup(3, "RWD/Rear-Wheel Drive"),
                ],
            ),
            (LookupTable::FuelType, vec![lookup(1, "Gasoline"), lookup(2, "Electric")]),
            (
                LookupTable::ElectrificationLevel,
                vec![lookup(1, "BEV (Battery Electric Vehicle)")],
            ),
        ]),
        make_models: vec![(1, 10), (1, 11), (2, 20), (3, 30)],
    }
}

pub fn tesla_overlay() -> OverlayBundle {
    let p = |keys: &str, element: &str, value: &str| OverlayPattern {
        keys: keys.into(),
        element: element.into(),
        value: value.into(),
    };
    OverlayBundle {
        name: Some("cn-tesla".into()),
        wmis: vec![OverlayWmi {
            code: "LRW".into(),
            manufacturer: "Tesla, Inc.".into(),
            make: Some("Tesla".into()),
            country: Some("China".into()),
            vehicle_type: Some("Passenger Car".into()),
        }],
        schemas: vec![OverlaySchema {
            name: "Tesla Model Y (Giga Shanghai)".into(),
            wmis: vec!["LRW".into()],
            year_from: Some(2021),
            year_to: None,
            patterns: vec![
                p("Y*****", "Model", "Model Y"),
                p("Y*****", "Body Class", "Sport Utility Vehicle (SUV)"),
                p("**D***", "Fuel Type - Primary", "Electric"),
                p("**D***", "Electrification Level", "BEV (Battery Electric Vehicle)"),
                p("****E*", "Drive Type", "RWD/Rear-Wheel Drive"),
                p("****F*", "Drive Type", "AWD/All-Wheel Drive"),
                p("Y*****", "Plant City", "Shanghai"),
                p("Y*****", "Plant Country", "China"),
            ],
        }],
    }
}

pub fn config() -> DecoderConfig {
    DecoderConfig {
        reference_year: REFERENCE_YEAR,
        ..DecoderConfig::default()
    }
}

pub fn decoder() -> Decoder {
    Decoder::with_store(Arc::new(MemoryCatalog::new(fixture_catalog())), config())
}

pub fn decoder_with_overlay() -> Decoder {
    let catalog = MemoryCatalog::new(fixture_catalog())
        .with_overlay(&tesla_overlay())
        .expect("overlay composes");
    Decoder::with_store(Arc::new(catalog), config())
}
