//! JSON report generation

use crate::{CoreError, CoreResult, DecodeResult};

pub fn generate(result: &DecodeResult) -> CoreResult<String> {
    serde_json::to_string_pretty(result)
        .map_err(|e| CoreError::Report(format!("JSON serialization failed: {}", e)))
}
