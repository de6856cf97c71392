//! JSON report generation
//!
//! Collects the analyzer outputs into one serializable document and writes it
//! to a timestamped file in the output directory.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use ecu_log_core::{
    ChannelSeries, ExtractorStats, LoadStatistics, LogDetail, ParsedLog, ServiceBusReconstructor,
    SoaReport, SummarySeries, TrapSummary,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Everything one analysis run produced
#[derive(Debug, Serialize)]
pub struct AnalysisReport {
    pub generated_at: String,
    pub tool_version: String,
    pub library_version: String,
    pub load_statistics: LoadStatistics,
    pub trap_summary: Option<TrapSummary>,
    pub extractor_stats: ExtractorStats,
    pub soa: Option<SoaSection>,
    pub files: Vec<ParsedLog>,
}

/// SOA results in chart-ready form
#[derive(Debug, Serialize)]
pub struct SoaSection {
    #[serde(flatten)]
    pub report: SoaReport,
    pub channel_series: Vec<ChannelSeries>,
    pub summary_series: SummarySeries,
    pub log_details: Vec<LogDetail>,
}

impl SoaSection {
    /// `None` if the reconstructor has nothing to report
    pub fn from_reconstructor(soa: &ServiceBusReconstructor) -> Option<Self> {
        Some(Self {
            report: soa.report()?,
            channel_series: soa.channel_series(),
            summary_series: soa.summary_series(),
            log_details: soa.log_details(),
        })
    }
}

impl AnalysisReport {
    pub fn new(
        generated_at: DateTime<Local>,
        files: Vec<ParsedLog>,
        extractor_stats: ExtractorStats,
        soa: Option<SoaSection>,
    ) -> Self {
        Self {
            generated_at: generated_at.to_rfc3339(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            library_version: ecu_log_core::VERSION.to_string(),
            load_statistics: LoadStatistics::from_logs(&files),
            trap_summary: TrapSummary::from_logs(&files),
            extractor_stats,
            soa,
            files,
        }
    }
}

/// Write the report as `ecu_report_<YYYYMMDD_HHMMSS>.json` under `output_dir`
pub fn write_report(
    report: &AnalysisReport,
    generated_at: DateTime<Local>,
    output_dir: &Path,
    pretty: bool,
) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory: {:?}", output_dir))?;

    let path = output_dir.join(format!(
        "ecu_report_{}.json",
        generated_at.format("%Y%m%d_%H%M%S")
    ));

    let json = if pretty {
        serde_json::to_string_pretty(report)
    } else {
        serde_json::to_string(report)
    }
    .context("Failed to serialize report")?;

    fs::write(&path, json).with_context(|| format!("Failed to write report: {:?}", path))?;
    log::info!("Report written to {:?}", path);
    Ok(path)
}
