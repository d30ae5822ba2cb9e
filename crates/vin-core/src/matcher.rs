//! Pattern matching and scoring
//!
//! Matches the VDS against every pattern of the selected schemas, then
//! ranks the candidates per element with a fixed tiebreak chain:
//!
//! 1. element weight (desc)
//! 2. schema coherence: how many patterns the candidate's schema matched
//!    against this VIN (desc)
//! 3. specificity: literal positions in the matching keys (desc)
//! 4. configured official/community preference
//! 5. (layer, pattern id) ascending, for determinism
//!
//! Coherence is what keeps an F-150 from decoding as an F-550: both carry
//! an equally specific Model pattern, but the F-150 schema matches more of
//! the VIN overall.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use vin_catalog::{
    AttributeRef, CatalogResult, CatalogStore, ElementRecord, LookupTable, PatternSource,
};

use crate::error::{DecodeError, ErrorCode};
use crate::schema::SelectedSchema;

/// One ranked pattern match; the provenance record behind an attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternMatch {
    pub element: String,
    pub value: String,
    pub schema: String,
    pub schema_id: i64,
    pub layer: u16,
    pub source: PatternSource,
    pub pattern_id: i64,
    pub keys: String,
    pub specificity: u8,
    /// Patterns the parent schema matched against this VIN.
    pub schema_matches: usize,
    pub weight: i32,
    pub confidence: f64,
    /// Whether this match won its element.
    pub selected: bool,
}

/// The winning value for one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedAttribute {
    pub element: String,
    pub value: String,
    pub confidence: f64,
}

#[derive(Debug, Default)]
pub struct MatchOutcome {
    pub attributes: Vec<MatchedAttribute>,
    /// Every match, grouped by element, best first.
    pub ranked: Vec<PatternMatch>,
    pub errors: Vec<DecodeError>,
}

struct Candidate {
    schema_idx: usize,
    layer: u16,
    pattern_id: i64,
    keys: String,
    element: ElementRecord,
    attribute: AttributeRef,
    specificity: u8,
    schema_matches: usize,
    source: PatternSource,
}

fn source_rank(source: PatternSource, prefer: PatternSource) -> u8 {
    u8::from(source != prefer)
}

fn rank(a: &Candidate, b: &Candidate, prefer: PatternSource) -> Ordering {
    b.element
        .weight
        .cmp(&a.element.weight)
        .then(b.schema_matches.cmp(&a.schema_matches))
        .then(b.specificity.cmp(&a.specificity))
        .then(source_rank(a.source, prefer).cmp(&source_rank(b.source, prefer)))
        .then(a.layer.cmp(&b.layer))
        .then(a.pattern_id.cmp(&b.pattern_id))
}

fn confidence(weight: i32, max_weight: i32, specificity: u8, coherence: f64) -> f64 {
    if max_weight <= 0 {
        return 0.0;
    }
    let weight_norm = (weight as f64 / max_weight as f64).clamp(0.0, 1.0);
    let specificity_term = 0.5 + 0.5 * (specificity as f64 / 6.0);
    (weight_norm * specificity_term * coherence).clamp(0.0, 1.0)
}

/// Match and score the VDS against the selected schemas.
pub async fn match_and_score(
    store: &dyn CatalogStore,
    schemas: &[SelectedSchema],
    vds: &[u8; 6],
    make_id: Option<i64>,
    prefer: PatternSource,
) -> CatalogResult<MatchOutcome> {
    let mut outcome = MatchOutcome::default();

    // First pass: raw matches and per-schema coherence counts.
    let mut raw: Vec<(usize, usize, u8)> = Vec::new(); // (schema_idx, pattern_idx, specificity)
    let mut schema_matches = vec![0usize; schemas.len()];
    for (schema_idx, selected) in schemas.iter().enumerate() {
        for (pattern_idx, pattern) in selected.patterns.iter().enumerate() {
            if let Some(specificity) = pattern.keys.matches(vds) {
                raw.push((schema_idx, pattern_idx, specificity));
                schema_matches[schema_idx] += 1;
            }
        }
    }

    if raw.is_empty() {
        outcome.errors.push(DecodeError::new(
            ErrorCode::PatternNoMatch,
            "no schema pattern matched the vehicle descriptor section",
        ));
        return Ok(outcome);
    }
    let best_matches = schema_matches.iter().copied().max().unwrap_or(1).max(1);
    let max_weight = store.max_element_weight().await?;

    // Second pass: attach element rows and group by element name.
    let mut element_cache: HashMap<(u16, i64), Option<ElementRecord>> = HashMap::new();
    let mut candidates: Vec<Candidate> = Vec::with_capacity(raw.len());
    for (schema_idx, pattern_idx, specificity) in raw {
        let selected = &schemas[schema_idx];
        let pattern = &selected.patterns[pattern_idx];
        let layer = selected.hit.key.layer;

        let cache_key = (layer, pattern.element_id);
        if !element_cache.contains_key(&cache_key) {
            let element = store.element(layer, pattern.element_id).await?;
            element_cache.insert(cache_key, element);
        }
        let Some(element) = element_cache[&cache_key].clone() else {
            warn!(
                pattern_id = pattern.id,
                element_id = pattern.element_id,
                "matched pattern references missing element"
            );
            continue;
        };

        candidates.push(Candidate {
            schema_idx,
            layer,
            pattern_id: pattern.id,
            keys: pattern.keys.to_string(),
            element,
            attribute: pattern.attribute.clone(),
            specificity,
            schema_matches: schema_matches[schema_idx],
            source: selected.hit.source,
        });
    }

    let mut by_element: HashMap<String, Vec<Candidate>> = HashMap::new();
    for candidate in candidates {
        by_element
            .entry(candidate.element.name.clone())
            .or_default()
            .push(candidate);
    }

    // Stable output order: heaviest element first, name as tiebreak.
    let mut groups: Vec<(String, Vec<Candidate>)> = by_element.into_iter().collect();
    groups.sort_by(|(a_name, a), (b_name, b)| {
        let a_weight = a.iter().map(|c| c.element.weight).max().unwrap_or(0);
        let b_weight = b.iter().map(|c| c.element.weight).max().unwrap_or(0);
        b_weight.cmp(&a_weight).then(a_name.cmp(b_name))
    });

    for (element_name, mut group) in groups {
        group.sort_by(|a, b| rank(a, b, prefer));

        for (idx, candidate) in group.iter().enumerate() {
            let selected = idx == 0;
            let value = resolve_value(
                store,
                candidate,
                make_id,
                selected.then_some(&mut outcome.errors),
            )
            .await?;
            let coherence = candidate.schema_matches as f64 / best_matches as f64;
            let confidence = confidence(
                candidate.element.weight,
                max_weight,
                candidate.specificity,
                coherence,
            );

            if selected {
                outcome.attributes.push(MatchedAttribute {
                    element: element_name.clone(),
                    value: value.clone(),
                    confidence,
                });
            }
            outcome.ranked.push(PatternMatch {
                element: element_name.clone(),
                value,
                schema: schemas[candidate.schema_idx].hit.name.clone(),
                schema_id: schemas[candidate.schema_idx].hit.key.id,
                layer: candidate.layer,
                source: candidate.source,
                pattern_id: candidate.pattern_id,
                keys: candidate.keys.clone(),
                specificity: candidate.specificity,
                schema_matches: candidate.schema_matches,
                weight: candidate.element.weight,
                confidence,
                selected,
            });
        }
    }

    debug!(
        attributes = outcome.attributes.len(),
        matches = outcome.ranked.len(),
        "pattern matching complete"
    );
    Ok(outcome)
}

/// Resolve a candidate's attribute to a display value. Lookup misses fall
/// back to the literal id text; diagnostics are only emitted for winners.
async fn resolve_value(
    store: &dyn CatalogStore,
    candidate: &Candidate,
    make_id: Option<i64>,
    errors: Option<&mut Vec<DecodeError>>,
) -> CatalogResult<String> {
    let mut sink = errors;
    match &candidate.attribute {
        AttributeRef::Literal(text) => Ok(text.clone()),
        AttributeRef::Lookup(id) => match candidate.element.lookup_table {
            Some(LookupTable::Model) => {
                match store.model_name(candidate.layer, make_id, *id).await? {
                    Some(resolution) => {
                        if resolution.make_mismatch {
                            if let Some(errors) = sink.as_mut() {
                                errors.push(DecodeError::new(
                                    ErrorCode::ModelMakeMismatch,
                                    format!(
                                        "model '{}' is not registered under the resolved make",
                                        resolution.name
                                    ),
                                ));
                            }
                        }
                        Ok(resolution.name)
                    }
                    None => {
                        if let Some(errors) = sink.as_mut() {
                            errors.push(DecodeError::new(
                                ErrorCode::LookupMiss,
                                format!("Model row {} missing from catalog", id),
                            ));
                        }
                        Ok(id.to_string())
                    }
                }
            }
            Some(table) => match store.lookup_name(candidate.layer, table, *id).await? {
                Some(name) => Ok(name),
                None => {
                    if let Some(errors) = sink.as_mut() {
                        errors.push(DecodeError::new(
                            ErrorCode::LookupMiss,
                            format!("{} row {} missing from catalog", table, id),
                        ));
                    }
                    Ok(id.to_string())
                }
            },
            // Lookup refs are only minted for lookup-backed elements; keep
            // the id visible if catalog data disagrees with itself.
            None => Ok(id.to_string()),
        },
    }
}
