//! Plain-text report generation

use std::fmt::Write;

use crate::{CoreError, CoreResult, DecodeResult};

pub fn generate(result: &DecodeResult) -> CoreResult<String> {
    let mut out = String::new();
    render(result, &mut out).map_err(|e| CoreError::Report(e.to_string()))?;
    Ok(out)
}

fn render(result: &DecodeResult, out: &mut String) -> std::fmt::Result {
    writeln!(out, "VIN: {}", result.vin)?;
    writeln!(out, "Status: {}", if result.valid { "valid" } else { "INVALID" })?;

    let vehicle = &result.components.vehicle;
    let mut headline = Vec::new();
    if let Some(year) = vehicle.year {
        headline.push(year.to_string());
    }
    if let Some(make) = &vehicle.make {
        headline.push(make.clone());
    }
    if let Some(model) = &vehicle.model {
        headline.push(model.clone());
    }
    if !headline.is_empty() {
        writeln!(out, "Vehicle: {}", headline.join(" "))?;
    }
    line(out, "  Series", vehicle.series.as_deref())?;
    line(out, "  Body class", vehicle.body_style.as_deref())?;
    line(out, "  Drive type", vehicle.drive_type.as_deref())?;
    line(out, "  Fuel", vehicle.fuel_type.as_deref())?;
    line(out, "  Electrification", vehicle.electrification_level.as_deref())?;
    line(out, "  Doors", vehicle.doors.as_deref())?;

    if let Some(wmi) = &result.components.wmi {
        writeln!(out, "WMI:")?;
        line(out, "  Manufacturer", wmi.manufacturer.as_deref())?;
        line(out, "  Make", wmi.make.as_deref())?;
        line(out, "  Country", wmi.country.as_deref())?;
        line(out, "  Region", wmi.region.as_deref())?;
    }

    if let Some(plant) = &result.components.plant {
        writeln!(out, "Plant: code '{}'", plant.code)?;
        line(out, "  City", plant.city.as_deref())?;
        line(out, "  Country", plant.country.as_deref())?;
    }

    let engine = &result.components.engine;
    if engine.model.is_some()
        || engine.cylinders.is_some()
        || engine.displacement.is_some()
        || engine.fuel.is_some()
    {
        writeln!(out, "Engine:")?;
        line(out, "  Model", engine.model.as_deref())?;
        line(out, "  Cylinders", engine.cylinders.as_deref())?;
        line(out, "  Displacement (L)", engine.displacement.as_deref())?;
        line(out, "  Fuel", engine.fuel.as_deref())?;
    }

    let year = &result.components.model_year;
    match year.year {
        Some(y) => writeln!(
            out,
            "Model year: {} ({:?}, confidence {:.2})",
            y, year.source, year.confidence
        )?,
        None => writeln!(out, "Model year: unknown")?,
    }

    if let Some(check) = &result.components.check_digit {
        if check.is_valid {
            writeln!(out, "Check digit: OK ('{}')", check.actual)?;
        } else {
            writeln!(
                out,
                "Check digit: MISMATCH (expected '{}', found '{}')",
                check.expected.unwrap_or('?'),
                check.actual
            )?;
        }
    }

    if let Some(metadata) = &result.metadata {
        writeln!(
            out,
            "Confidence: {:.2} ({} schemas, {:.1} ms)",
            metadata.confidence, metadata.schema_count, metadata.processing_time_ms
        )?;
        if let Some(diagnostics) = &metadata.diagnostics {
            writeln!(out, "Stage timings:")?;
            for stage in &diagnostics.stages {
                writeln!(out, "  {:<12} {} us", stage.stage, stage.micros)?;
            }
        }
    }

    if !result.errors.is_empty() {
        writeln!(out, "Errors:")?;
        for error in &result.errors {
            writeln!(
                out,
                "  [{:?}] {}: {}",
                error.severity, error.code, error.message
            )?;
        }
    }

    if let Some(patterns) = &result.patterns {
        writeln!(out, "Pattern matches:")?;
        for m in patterns {
            writeln!(
                out,
                "  {} {} = {} (schema '{}', keys {}, specificity {}, coherence {}, {})",
                if m.selected { "*" } else { "-" },
                m.element,
                m.value,
                m.schema,
                m.keys,
                m.specificity,
                m.schema_matches,
                m.source
            )?;
        }
    }

    Ok(())
}

fn line(out: &mut String, label: &str, value: Option<&str>) -> std::fmt::Result {
    if let Some(value) = value {
        writeln!(out, "{}: {}", label, value)?;
    }
    Ok(())
}
