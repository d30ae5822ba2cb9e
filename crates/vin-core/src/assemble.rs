//! Result assembly
//!
//! Groups the winning attributes into named components and computes the
//! overall confidence. Attribute-to-slot routing goes by the vPIC element
//! name; anything without a dedicated slot is still available through the
//! raw map.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::check_digit::CheckDigit;
use crate::error::DecodeError;
use crate::matcher::{MatchedAttribute, PatternMatch};
use crate::vin::Vin;
use crate::wmi::ResolvedWmi;
use crate::year::{ResolvedYear, YearSource};

/// vPIC element names the assembler routes into component slots.
pub mod elements {
    pub const MAKE: &str = "Make";
    pub const MODEL: &str = "Model";
    pub const SERIES: &str = "Series";
    pub const BODY_CLASS: &str = "Body Class";
    pub const DRIVE_TYPE: &str = "Drive Type";
    pub const FUEL_TYPE: &str = "Fuel Type - Primary";
    pub const ELECTRIFICATION: &str = "Electrification Level";
    pub const DOORS: &str = "Doors";
    pub const ENGINE_MODEL: &str = "Engine Model";
    pub const ENGINE_CYLINDERS: &str = "Engine Number of Cylinders";
    pub const DISPLACEMENT: &str = "Displacement (L)";
    pub const PLANT_CITY: &str = "Plant City";
    pub const PLANT_COUNTRY: &str = "Plant Country";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleComponent {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub series: Option<String>,
    pub body_style: Option<String>,
    pub drive_type: Option<String>,
    pub fuel_type: Option<String>,
    pub electrification_level: Option<String>,
    pub doors: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WmiComponent {
    pub manufacturer: Option<String>,
    pub make: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantComponent {
    pub country: Option<String>,
    pub city: Option<String>,
    /// Position 11.
    pub code: char,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineComponent {
    pub model: Option<String>,
    pub cylinders: Option<String>,
    pub displacement: Option<String>,
    pub fuel: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelYearComponent {
    pub year: Option<i32>,
    pub source: YearSource,
    pub confidence: f64,
}

impl Default for ModelYearComponent {
    fn default() -> Self {
        ModelYearComponent {
            year: None,
            source: YearSource::Unknown,
            confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Components {
    pub vehicle: VehicleComponent,
    pub wmi: Option<WmiComponent>,
    pub plant: Option<PlantComponent>,
    pub engine: EngineComponent,
    pub model_year: ModelYearComponent,
    pub check_digit: Option<CheckDigit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: String,
    pub micros: u128,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub stages: Vec<StageTiming>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub processing_time_ms: f64,
    /// Geometric mean over the core attribute set.
    pub confidence: f64,
    pub schema_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,
}

/// The decode result. Always returned; `valid` is false iff a fatal error
/// was recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodeResult {
    pub vin: String,
    pub valid: bool,
    pub components: Components,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patterns: Option<Vec<PatternMatch>>,
    pub errors: Vec<DecodeError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResultMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<BTreeMap<String, String>>,
}

impl DecodeResult {
    /// A result carrying only errors, for decodes rejected before or during
    /// catalog work.
    pub fn rejected(vin: String, errors: Vec<DecodeError>) -> Self {
        DecodeResult {
            vin,
            valid: !errors.iter().any(DecodeError::is_fatal),
            components: Components::default(),
            patterns: None,
            errors,
            metadata: None,
            raw: None,
        }
    }
}

/// Inputs the assembler folds into a result.
pub struct Assembly<'a> {
    pub vin: &'a Vin,
    pub wmi: Option<&'a ResolvedWmi>,
    pub year: ResolvedYear,
    pub check_digit: CheckDigit,
    pub attributes: Vec<MatchedAttribute>,
    pub ranked: Vec<PatternMatch>,
    pub schema_count: usize,
    pub errors: Vec<DecodeError>,
}

/// Options the assembler honors; a narrowed view of `DecodeOptions`.
pub struct AssemblyOptions {
    pub include_pattern_details: bool,
    pub include_raw_data: bool,
    pub confidence_threshold: Option<f64>,
}

pub fn assemble(assembly: Assembly<'_>, options: &AssemblyOptions) -> DecodeResult {
    let Assembly {
        vin,
        wmi,
        year,
        check_digit,
        attributes,
        ranked,
        schema_count,
        errors,
    } = assembly;

    let threshold = options.confidence_threshold.unwrap_or(0.0);
    let mut vehicle = VehicleComponent {
        year: year.year,
        ..VehicleComponent::default()
    };
    let mut engine = EngineComponent::default();
    let mut plant = PlantComponent {
        country: None,
        city: None,
        code: vin.plant_code(),
    };
    let mut raw = options.include_raw_data.then(BTreeMap::new);

    let mut model_confidence: Option<f64> = None;
    let mut body_confidence: Option<f64> = None;
    let mut pattern_make: Option<String> = None;

    for attribute in &attributes {
        if let Some(raw) = raw.as_mut() {
            raw.insert(attribute.element.clone(), attribute.value.clone());
        }
        if attribute.confidence < threshold {
            continue;
        }
        let value = Some(attribute.value.clone());
        match attribute.element.as_str() {
            elements::MAKE => pattern_make = value,
            elements::MODEL => {
                model_confidence = Some(attribute.confidence);
                vehicle.model = value;
            }
            elements::SERIES => vehicle.series = value,
            elements::BODY_CLASS => {
                body_confidence = Some(attribute.confidence);
                vehicle.body_style = value;
            }
            elements::DRIVE_TYPE => vehicle.drive_type = value,
            elements::FUEL_TYPE => {
                vehicle.fuel_type = value.clone();
                engine.fuel = value;
            }
            elements::ELECTRIFICATION => vehicle.electrification_level = value,
            elements::DOORS => vehicle.doors = value,
            elements::ENGINE_MODEL => engine.model = value,
            elements::ENGINE_CYLINDERS => engine.cylinders = value,
            elements::DISPLACEMENT => engine.displacement = value,
            elements::PLANT_CITY => plant.city = value,
            elements::PLANT_COUNTRY => plant.country = value,
            _ => {}
        }
    }

    // Make comes from the WMI; a pattern-encoded make only fills a gap.
    vehicle.make = wmi.and_then(|w| w.make.clone()).or(pattern_make);

    let make_confidence = wmi.and_then(|w| w.make.is_some().then_some(w.make_confidence));
    let confidence = geometric_mean(
        [
            make_confidence,
            model_confidence,
            (year.year.is_some()).then_some(year.confidence),
            body_confidence,
        ]
        .into_iter()
        .flatten(),
    );

    let valid = !errors.iter().any(DecodeError::is_fatal);
    DecodeResult {
        vin: vin.as_str().to_string(),
        valid,
        components: Components {
            vehicle,
            wmi: wmi.map(|w| WmiComponent {
                manufacturer: w.manufacturer.clone(),
                make: w.make.clone(),
                country: w.country.clone(),
                region: w.region.clone(),
            }),
            plant: Some(plant),
            engine,
            model_year: ModelYearComponent {
                year: year.year,
                source: year.source,
                confidence: year.confidence,
            },
            check_digit: Some(check_digit),
        },
        patterns: options.include_pattern_details.then_some(ranked),
        errors,
        metadata: Some(ResultMetadata {
            processing_time_ms: 0.0,
            confidence,
            schema_count,
            diagnostics: None,
        }),
        raw,
    }
}

fn geometric_mean(values: impl Iterator<Item = f64>) -> f64 {
    let mut product = 1.0f64;
    let mut count = 0u32;
    for value in values {
        product *= value.max(0.0);
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        product.powf(1.0 / count as f64)
    }
}
