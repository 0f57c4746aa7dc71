use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::core::AnalysisReport;

/// Writes an [`AnalysisReport`] as JSON.
///
/// Output is a pure function of the report, so unchanged sources give
/// byte-identical files.
pub struct JsonReportFormatter {
    pretty: bool,
}

impl JsonReportFormatter {
    pub fn new() -> Self {
        Self { pretty: true }
    }

    /// Single-line output for piping into other tools.
    pub fn compact() -> Self {
        Self { pretty: false }
    }

    pub fn format(&self, report: &AnalysisReport) -> Result<String> {
        let mut json = if self.pretty {
            serde_json::to_string_pretty(report)?
        } else {
            serde_json::to_string(report)?
        };
        json.push('\n');
        Ok(json)
    }

    pub fn format_to_file(&self, report: &AnalysisReport, output_path: &Path) -> Result<()> {
        let json = self.format(report)?;
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(output_path, json)
            .with_context(|| format!("Failed to write report to {}", output_path.display()))?;
        Ok(())
    }
}

impl Default for JsonReportFormatter {
    fn default() -> Self {
        Self::new()
    }
}
