//! Report generation

pub mod json;
pub mod text;

use crate::CoreResult;
use crate::DecodeResult;

/// Report format
pub enum ReportFormat {
    Text,
    Json,
}

/// Generate report in specified format
pub fn generate_report(result: &DecodeResult, format: ReportFormat) -> CoreResult<String> {
    match format {
        ReportFormat::Text => text::generate(result),
        ReportFormat::Json => json::generate(result),
    }
}
