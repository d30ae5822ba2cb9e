//! End-to-end decode pipeline tests over the fixture catalog.

mod common;

use std::sync::Arc;

use common::{decoder, decoder_with_overlay};
use vin_core::{DecodeOptions, ErrorCode, YearSource};

#[tokio::test]
async fn test_f150_wins_schema_coherence_tiebreak() {
    let result = decoder()
        .decode(
            "1FTFW5L86RFB45612",
            Some(DecodeOptions {
                include_pattern_details: true,
                ..DecodeOptions::default()
            }),
        )
        .await;

    assert!(result.valid, "errors: {:?}", result.errors);
    let vehicle = &result.components.vehicle;
    assert_eq!(vehicle.make.as_deref(), Some("Ford"));
    assert_eq!(vehicle.model.as_deref(), Some("F-150"));
    assert_eq!(vehicle.year, Some(2024));
    assert_eq!(vehicle.body_style.as_deref(), Some("Pickup"));
    assert_eq!(vehicle.series.as_deref(), Some("XL"));
    assert_eq!(vehicle.drive_type.as_deref(), Some("4WD/4-Wheel Drive/4x4"));
    assert_eq!(result.components.engine.displacement.as_deref(), Some("3.5"));
    assert!(result.components.check_digit.unwrap().is_valid);

    // Both Model patterns are equally specific; the F-550 loses only on
    // schema coherence and must still be visible in the ranked matches.
    let patterns = result.patterns.as_ref().unwrap();
    let models: Vec<_> = patterns.iter().filter(|m| m.element == "Model").collect();
    assert_eq!(models.len(), 2);
    assert!(models[0].selected && models[0].value == "F-150");
    assert!(!models[1].selected && models[1].value == "F-550");
    assert_eq!(models[0].specificity, models[1].specificity);
    assert!(models[0].schema_matches > models[1].schema_matches);
}

#[tokio::test]
async fn test_honda_crv_standard_path() {
    let result = decoder().decode("2HKRW2H20NH207506", None).await;

    assert!(result.valid, "errors: {:?}", result.errors);
    let vehicle = &result.components.vehicle;
    assert_eq!(vehicle.make.as_deref(), Some("Honda"));
    assert_eq!(vehicle.model.as_deref(), Some("CR-V"));
    assert_eq!(vehicle.year, Some(2022));
    assert_eq!(vehicle.doors.as_deref(), Some("4"));

    let wmi = result.components.wmi.as_ref().unwrap();
    assert_eq!(wmi.country.as_deref(), Some("Canada"));
    assert_eq!(wmi.region.as_deref(), Some("North America"));
}

#[tokio::test]
async fn test_bmw_x1_germany() {
    let result = decoder().decode("WBAVL1C5XFVY41004", None).await;

    assert!(result.valid, "errors: {:?}", result.errors);
    let vehicle = &result.components.vehicle;
    assert_eq!(vehicle.make.as_deref(), Some("BMW"));
    assert_eq!(vehicle.model.as_deref(), Some("X1"));
    assert_eq!(vehicle.year, Some(2015));
    assert_eq!(vehicle.fuel_type.as_deref(), Some("Gasoline"));

    let wmi = result.components.wmi.as_ref().unwrap();
    assert_eq!(wmi.country.as_deref(), Some("Germany"));
    assert_eq!(wmi.region.as_deref(), Some("Europe"));
}

#[tokio::test]
async fn test_tesla_model_y_via_community_overlay() {
    let result = decoder_with_overlay()
        .decode(
            "LRWYGDEE1PC010116",
            Some(DecodeOptions {
                include_pattern_details: true,
                ..DecodeOptions::default()
            }),
        )
        .await;

    assert!(result.valid, "errors: {:?}", result.errors);
    let vehicle = &result.components.vehicle;
    assert_eq!(vehicle.make.as_deref(), Some("Tesla"));
    assert_eq!(vehicle.model.as_deref(), Some("Model Y"));
    assert_eq!(vehicle.year, Some(2023));
    assert_eq!(vehicle.fuel_type.as_deref(), Some("Electric"));
    assert_eq!(
        vehicle.electrification_level.as_deref(),
        Some("BEV (Battery Electric Vehicle)")
    );
    assert_eq!(result.components.engine.fuel.as_deref(), Some("Electric"));

    let plant = result.components.plant.as_ref().unwrap();
    assert_eq!(plant.city.as_deref(), Some("Shanghai"));
    assert_eq!(plant.country.as_deref(), Some("China"));
    assert_eq!(plant.code, 'C');

    let wmi = result.components.wmi.as_ref().unwrap();
    assert_eq!(wmi.manufacturer.as_deref(), Some("Tesla, Inc."));
    assert_eq!(wmi.region.as_deref(), Some("Asia"));

    // Every contributing pattern is tagged with community provenance.
    let patterns = result.patterns.as_ref().unwrap();
    assert!(!patterns.is_empty());
    assert!(patterns
        .iter()
        .all(|m| m.source == vin_catalog::PatternSource::Community));
}

#[tokio::test]
async fn test_tesla_awd_resolved_from_position_eight() {
    let result = decoder_with_overlay().decode("LRWYGDEF4PC266095", None).await;

    assert!(result.valid, "errors: {:?}", result.errors);
    let vehicle = &result.components.vehicle;
    assert_eq!(vehicle.model.as_deref(), Some("Model Y"));
    assert_eq!(vehicle.year, Some(2023));
    assert_eq!(vehicle.drive_type.as_deref(), Some("AWD/All-Wheel Drive"));

    // The sibling RWD VIN differs only at position 8.
    let rwd = decoder_with_overlay().decode("LRWYGDEE1PC010116", None).await;
    assert_eq!(
        rwd.components.vehicle.drive_type.as_deref(),
        Some("RWD/Rear-Wheel Drive")
    );
}

#[tokio::test]
async fn test_forbidden_letter_rejected() {
    let result = decoder().decode("1HGCM826I3A004352", None).await;
    assert!(!result.valid);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code, ErrorCode::InvalidCharacters);
}

#[tokio::test]
async fn test_corrupted_check_digit_flagged() {
    let result = decoder().decode("1HGCM82643A004352", None).await;

    let check_digit_error = result
        .errors
        .iter()
        .find(|e| e.code == ErrorCode::InvalidCheckDigit)
        .expect("check digit warning");
    assert!(check_digit_error.message.contains('3'));

    let check = result.components.check_digit.unwrap();
    assert!(!check.is_valid);
    assert_eq!(check.expected, Some('3'));
    assert_eq!(check.actual, '4');

    // 1HG is not in the fixture catalog, so the result is also invalid.
    assert!(!result.valid);
    assert!(result.errors.iter().any(|e| e.code == ErrorCode::WmiNotFound));
}

#[tokio::test]
async fn test_position_ten_u_and_z_rejected() {
    for vin in ["1FTFW5L86UFB45612", "1FTFW5L86ZFB45612"] {
        let result = decoder().decode(vin, None).await;
        assert!(!result.valid);
        assert_eq!(result.errors[0].code, ErrorCode::InvalidCharacters);
    }
}

#[tokio::test]
async fn test_non_us_year_decodes_without_a_year() {
    let result = decoder().decode("1FTFW5L860FB45612", None).await;

    assert!(result.valid, "NON_US_YEAR is a warning: {:?}", result.errors);
    assert!(result.errors.iter().any(|e| e.code == ErrorCode::NonUsYear));
    assert_eq!(result.components.model_year.year, None);
    assert_eq!(result.components.model_year.source, YearSource::Unknown);
    // With the year unknown, every Ford schema stays in play and the
    // F-150 still wins on coherence.
    assert_eq!(result.components.vehicle.model.as_deref(), Some("F-150"));
}

#[tokio::test]
async fn test_model_year_override_wins() {
    let options = DecodeOptions {
        model_year: Some(2024),
        ..DecodeOptions::default()
    };
    let result = decoder().decode("1FTFW5L860FB45612", Some(options)).await;

    assert_eq!(result.components.model_year.year, Some(2024));
    assert_eq!(result.components.model_year.source, YearSource::Override);
    assert_eq!(result.components.model_year.confidence, 1.0);
}

#[tokio::test]
async fn test_input_normalization_and_idempotence() {
    let decoder = decoder();
    let first = decoder.decode("  1ftfw5l86rfb45612 ", None).await;
    assert_eq!(first.vin, "1FTFW5L86RFB45612");

    let second = decoder.decode(&first.vin, None).await;
    assert_eq!(first.components, second.components);
    assert_eq!(first.errors, second.errors);
    assert_eq!(first.valid, second.valid);
}

#[tokio::test]
async fn test_determinism_across_decodes() {
    let decoder = decoder();
    let a = decoder.decode("2HKRW2H20NH207506", None).await;
    let b = decoder.decode("2HKRW2H20NH207506", None).await;
    assert_eq!(a.components, b.components);
    assert_eq!(a.errors, b.errors);
}

#[tokio::test]
async fn test_overlay_is_a_noop_for_base_vins() {
    let base = decoder().decode("1FTFW5L86RFB45612", None).await;
    let overlaid = decoder_with_overlay().decode("1FTFW5L86RFB45612", None).await;
    assert_eq!(base.components, overlaid.components);
    assert_eq!(base.errors, overlaid.errors);
}

#[tokio::test]
async fn test_concurrent_decodes_match_sequential() {
    let decoder = Arc::new(decoder_with_overlay());
    let vins = [
        "1FTFW5L86RFB45612",
        "2HKRW2H20NH207506",
        "WBAVL1C5XFVY41004",
        "LRWYGDEF4PC266095",
    ];

    let mut sequential = Vec::new();
    for vin in vins {
        sequential.push(decoder.decode(vin, None).await);
    }

    let handles: Vec<_> = vins
        .iter()
        .map(|vin| {
            let decoder = Arc::clone(&decoder);
            let vin = vin.to_string();
            tokio::spawn(async move { decoder.decode(&vin, None).await })
        })
        .collect();

    for (expected, handle) in sequential.into_iter().zip(handles) {
        let concurrent = handle.await.unwrap();
        assert_eq!(expected.components, concurrent.components);
        assert_eq!(expected.errors, concurrent.errors);
    }
}

#[tokio::test]
async fn test_check_digit_matches_reference_algorithm() {
    // Independent rendition of the weighted mod-11 algorithm.
    fn reference(vin: &str) -> char {
        const WEIGHTS: [u32; 17] = [8, 7, 6, 5, 4, 3, 2, 10, 0, 9, 8, 7, 6, 5, 4, 3, 2];
        let value = |c: u8| -> u32 {
            match c {
                b'0'..=b'9' => (c - b'0') as u32,
                b'A'..=b'H' => (c - b'A') as u32 + 1,
                b'J'..=b'N' => (c - b'J') as u32 + 1,
                b'P' => 7,
                b'R' => 9,
                _ => (c - b'S') as u32 + 2,
            }
        };
        let sum: u32 = vin
            .bytes()
            .zip(WEIGHTS)
            .map(|(c, w)| value(c) * w)
            .sum();
        match sum % 11 {
            10 => 'X',
            d => (b'0' + d as u8) as char,
        }
    }

    let decoder = decoder();
    for vin in [
        "1FTFW5L86RFB45612",
        "2HKRW2H20NH207506",
        "WBAVL1C5XFVY41004",
        "1HGCM82643A004352",
    ] {
        let result = decoder.decode(vin, None).await;
        let check = result.components.check_digit.unwrap();
        assert_eq!(check.expected, Some(reference(vin)), "{}", vin);
    }
}

#[tokio::test]
async fn test_metadata_confidence_in_unit_range() {
    let result = decoder().decode("1FTFW5L86RFB45612", None).await;
    let metadata = result.metadata.unwrap();
    assert!(metadata.confidence > 0.0 && metadata.confidence <= 1.0);
    assert_eq!(metadata.schema_count, 2);
    assert!(metadata.diagnostics.is_none());
    assert!(result.patterns.is_none());
    assert!(result.raw.is_none());
}

#[tokio::test]
async fn test_diagnostics_and_raw_map_on_request() {
    let options = DecodeOptions {
        include_diagnostics: true,
        include_raw_data: true,
        ..DecodeOptions::default()
    };
    let result = decoder().decode("1FTFW5L86RFB45612", Some(options)).await;

    let diagnostics = result.metadata.unwrap().diagnostics.unwrap();
    let stages: Vec<_> = diagnostics.stages.iter().map(|s| s.stage.as_str()).collect();
    assert_eq!(
        stages,
        ["validate", "check_digit", "wmi", "model_year", "schemas", "match", "assemble"]
    );

    let raw = result.raw.unwrap();
    assert_eq!(raw.get("Model").map(String::as_str), Some("F-150"));
    assert_eq!(raw.get("Series").map(String::as_str), Some("XL"));
}

#[tokio::test]
async fn test_confidence_threshold_withholds_low_scores() {
    let options = DecodeOptions {
        confidence_threshold: Some(0.99),
        ..DecodeOptions::default()
    };
    let result = decoder().decode("1FTFW5L86RFB45612", Some(options)).await;
    // Nothing scores 0.99 in the fixture; components stay empty but the
    // decode itself remains valid.
    assert!(result.valid);
    assert!(result.components.vehicle.model.is_none());
}
