//! Offline VIN decoder core
//!
//! This crate turns a 17-character VIN into a structured vehicle
//! description by matching it against an embedded catalog. The pipeline
//! runs validation, check digit, WMI resolution, model-year resolution,
//! schema selection, pattern matching/scoring, and result assembly, in
//! that order; suspension points sit at catalog reads only.

pub mod assemble;
pub mod check_digit;
pub mod error;
pub mod matcher;
pub mod report;
pub mod schema;
pub mod vin;
pub mod wmi;
pub mod year;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Datelike, Utc};
use thiserror::Error;
use tracing::{debug, info};

use vin_catalog::{CatalogData, CatalogError, CatalogStore, MemoryCatalog, PatternSource};

pub use assemble::{
    Components, DecodeResult, Diagnostics, EngineComponent, ModelYearComponent, PlantComponent,
    ResultMetadata, StageTiming, VehicleComponent, WmiComponent,
};
pub use check_digit::CheckDigit;
pub use error::{DecodeError, ErrorCategory, ErrorCode, ErrorSeverity};
pub use matcher::{MatchedAttribute, PatternMatch};
pub use vin::Vin;
pub use wmi::ResolvedWmi;
pub use year::{ResolvedYear, YearSource};

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(#[from] CatalogError),

    #[error("report generation failed: {0}")]
    Report(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Where the decoder's catalog comes from.
pub enum CatalogSource {
    /// A local SQLite catalog file, loaded into memory at construction.
    SqliteFile(PathBuf),
    /// Pre-built catalog tables.
    Memory(CatalogData),
    /// An injected adapter; remote or otherwise exotic backends plug in
    /// here without the decoder knowing.
    Store(Arc<dyn CatalogStore>),
}

/// Per-decode options.
#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    /// Explicit model-year override; always wins over position 10.
    pub model_year: Option<i32>,
    pub include_pattern_details: bool,
    pub include_raw_data: bool,
    /// Attributes scoring below this are withheld from components.
    pub confidence_threshold: Option<f64>,
    pub include_diagnostics: bool,
    /// Soft deadline, checked between stages.
    pub timeout: Option<Duration>,
}

/// Decoder-wide configuration.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    pub default_options: DecodeOptions,
    /// "Now" for the model-year future-flip heuristic.
    pub reference_year: i32,
    /// Which pattern source wins same-element conflicts.
    pub source_preference: PatternSource,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig {
            default_options: DecodeOptions::default(),
            reference_year: Utc::now().year(),
            source_preference: PatternSource::Official,
        }
    }
}

/// Per-stage wall clock, kept only when diagnostics are requested.
struct StageClock {
    last: Instant,
    stages: Option<Vec<StageTiming>>,
}

impl StageClock {
    fn new(enabled: bool) -> Self {
        StageClock {
            last: Instant::now(),
            stages: enabled.then(Vec::new),
        }
    }

    fn mark(&mut self, stage: &str) {
        let now = Instant::now();
        if let Some(stages) = self.stages.as_mut() {
            stages.push(StageTiming {
                stage: stage.to_string(),
                micros: now.duration_since(self.last).as_micros(),
            });
        }
        self.last = now;
    }

    fn finish(self) -> Option<Diagnostics> {
        self.stages.map(|stages| Diagnostics { stages })
    }
}

/// The decoder. Holds the immutable catalog; concurrent decodes share it
/// freely and keep all per-decode state on the stack.
pub struct Decoder {
    store: Arc<dyn CatalogStore>,
    config: DecoderConfig,
}

impl Decoder {
    /// Open a decoder over a catalog source. Construction is the only
    /// place catalog failures surface as a Rust error.
    pub async fn open(source: CatalogSource, config: DecoderConfig) -> CoreResult<Self> {
        let store: Arc<dyn CatalogStore> = match source {
            CatalogSource::SqliteFile(path) => {
                let data = vin_catalog::sqlite::load_sqlite(&path).await?;
                Arc::new(MemoryCatalog::new(data))
            }
            CatalogSource::Memory(data) => Arc::new(MemoryCatalog::new(data)),
            CatalogSource::Store(store) => store,
        };
        Ok(Decoder { store, config })
    }

    pub fn with_store(store: Arc<dyn CatalogStore>, config: DecoderConfig) -> Self {
        Decoder { store, config }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Release the catalog handle.
    pub fn close(self) {}

    /// Decode a VIN. Always returns a result; fatal problems mark it
    /// invalid instead of escaping as errors.
    pub async fn decode(&self, raw: &str, options: Option<DecodeOptions>) -> DecodeResult {
        let options = options.unwrap_or_else(|| self.config.default_options.clone());
        let started = Instant::now();
        let deadline = options.timeout.map(|timeout| started + timeout);
        let mut clock = StageClock::new(options.include_diagnostics);

        let vin = match vin::validate(raw) {
            Ok(vin) => vin,
            Err(error) => {
                debug!(input = raw, %error, "VIN rejected by structural validation");
                return DecodeResult::rejected(vin::normalize(raw), vec![error]);
            }
        };
        clock.mark("validate");

        let mut errors = Vec::new();
        let check = check_digit::verify(&vin);
        if !check.is_valid {
            errors.push(DecodeError::new(
                ErrorCode::InvalidCheckDigit,
                format!(
                    "check digit mismatch: expected '{}', found '{}'",
                    check.expected.unwrap_or('?'),
                    check.actual
                ),
            ));
        }
        clock.mark("check_digit");
        if timed_out(deadline) {
            return timeout_result(&vin, errors);
        }

        let resolved_wmi = match wmi::resolve(self.store.as_ref(), &vin).await {
            Ok(resolved) => resolved,
            Err(err) => {
                errors.push(catalog_failure(err));
                return DecodeResult::rejected(vin.as_str().to_string(), errors);
            }
        };
        clock.mark("wmi");
        let Some(resolved_wmi) = resolved_wmi else {
            errors.push(DecodeError::new(
                ErrorCode::WmiNotFound,
                format!("WMI '{}' is not in the catalog", vin.wmi_code()),
            ));
            // The rest of the pipeline is pointless without a WMI; report
            // what validation already produced.
            return self.finish(
                assemble::Assembly {
                    vin: &vin,
                    wmi: None,
                    year: ResolvedYear::unknown(),
                    check_digit: check,
                    attributes: Vec::new(),
                    ranked: Vec::new(),
                    schema_count: 0,
                    errors,
                },
                &options,
                started,
                clock,
            );
        };
        if timed_out(deadline) {
            return timeout_result(&vin, errors);
        }

        let (year, year_errors) =
            year::resolve(&vin, options.model_year, self.config.reference_year);
        errors.extend(year_errors);
        clock.mark("model_year");
        if timed_out(deadline) {
            return timeout_result(&vin, errors);
        }

        let schemas = match schema::select(self.store.as_ref(), resolved_wmi.key, year.year).await
        {
            Ok(schemas) => schemas,
            Err(err) => {
                errors.push(catalog_failure(err));
                return DecodeResult::rejected(vin.as_str().to_string(), errors);
            }
        };
        clock.mark("schemas");
        if timed_out(deadline) {
            return timeout_result(&vin, errors);
        }

        let outcome = match matcher::match_and_score(
            self.store.as_ref(),
            &schemas,
            &vin.vds(),
            resolved_wmi.make_id,
            self.config.source_preference,
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                errors.push(catalog_failure(err));
                return DecodeResult::rejected(vin.as_str().to_string(), errors);
            }
        };
        errors.extend(outcome.errors);
        clock.mark("match");

        self.finish(
            assemble::Assembly {
                vin: &vin,
                wmi: Some(&resolved_wmi),
                year,
                check_digit: check,
                attributes: outcome.attributes,
                ranked: outcome.ranked,
                schema_count: schemas.len(),
                errors,
            },
            &options,
            started,
            clock,
        )
    }

    fn finish(
        &self,
        assembly: assemble::Assembly<'_>,
        options: &DecodeOptions,
        started: Instant,
        mut clock: StageClock,
    ) -> DecodeResult {
        let mut result = assemble::assemble(
            assembly,
            &assemble::AssemblyOptions {
                include_pattern_details: options.include_pattern_details,
                include_raw_data: options.include_raw_data,
                confidence_threshold: options.confidence_threshold,
            },
        );
        clock.mark("assemble");
        if let Some(metadata) = result.metadata.as_mut() {
            metadata.processing_time_ms = started.elapsed().as_secs_f64() * 1000.0;
            metadata.diagnostics = clock.finish();
        }
        info!(
            vin = %result.vin,
            valid = result.valid,
            errors = result.errors.len(),
            "decode complete"
        );
        result
    }
}

fn timed_out(deadline: Option<Instant>) -> bool {
    deadline.map_or(false, |deadline| Instant::now() >= deadline)
}

fn timeout_result(vin: &Vin, mut errors: Vec<DecodeError>) -> DecodeResult {
    errors.push(DecodeError::new(
        ErrorCode::Timeout,
        "decode exceeded the configured soft timeout",
    ));
    DecodeResult::rejected(vin.as_str().to_string(), errors)
}

fn catalog_failure(err: CatalogError) -> DecodeError {
    DecodeError::new(ErrorCode::CatalogUnavailable, err.to_string())
}
