//! Channel manifest loading and counter line parsing

use crate::config::SoaConfig;
use crate::text;
use crate::types::{AnalyzerError, ChannelCounterSample, CounterKind, Result};
use regex::{Captures, Regex};
use std::path::Path;

/// Load the ordered channel names from a manifest file
pub fn load_manifest(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Err(AnalyzerError::FileNotFound(path.to_path_buf()));
    }
    let content = text::read_to_string_lossy(path)?;
    manifest_from_json(&content)
}

/// Extract the channel list from manifest JSON
///
/// `TOPIC` is checked before `topic`.
pub fn manifest_from_json(json: &str) -> Result<Vec<String>> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    let Some(object) = value.as_object() else {
        return Err(AnalyzerError::Manifest("top level is not an object".to_string()));
    };

    let Some(list) = object.get("TOPIC").or_else(|| object.get("topic")) else {
        let keys: Vec<&str> = object.keys().map(String::as_str).collect();
        return Err(AnalyzerError::Manifest(format!(
            "no TOPIC or topic key, available keys: {:?}",
            keys
        )));
    };

    let Some(entries) = list.as_array() else {
        return Err(AnalyzerError::Manifest("topic list is not an array".to_string()));
    };

    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            entry
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| AnalyzerError::Manifest(format!("entry {} is not a string", i)))
        })
        .collect()
}

/// Recognizes `SOA cnt on` and `SOA ASW drop cnt on` lines
#[derive(Debug, Clone)]
pub struct SoaLineParser {
    count: Regex,
    drop: Regex,
    raw_text_limit: usize,
    max_slot_index: usize,
}

impl SoaLineParser {
    pub fn new(config: &SoaConfig) -> Result<Self> {
        Ok(Self {
            count: text::compile_pattern(&config.count_pattern)?,
            drop: text::compile_pattern(&config.drop_pattern)?,
            raw_text_limit: config.raw_text_limit,
            max_slot_index: config.max_slot_index,
        })
    }

    /// Parse one line; `None` for unrelated or malformed lines
    pub fn parse_line(
        &self,
        line: &str,
        source_file: &Path,
        source_line: usize,
    ) -> Option<ChannelCounterSample> {
        let (caps, kind) = if let Some(caps) = self.count.captures(line) {
            (caps, CounterKind::Count)
        } else {
            (self.drop.captures(line)?, CounterKind::Drop)
        };

        let (timestamp, base_offset, values) = match self.fields(&caps) {
            Some(fields) => fields,
            None => {
                log::trace!("Malformed SOA line {}:{}", source_file.display(), source_line);
                return None;
            }
        };

        Some(ChannelCounterSample {
            timestamp,
            base_offset,
            values,
            kind,
            source_file: source_file.to_path_buf(),
            source_line,
            raw_text: text::truncate_for_display(line.trim(), self.raw_text_limit),
        })
    }

    fn fields(&self, caps: &Captures<'_>) -> Option<(String, usize, Vec<u64>)> {
        let base_offset: usize = caps[2].parse().ok()?;
        let values = caps[3]
            .split(',')
            .filter(|piece| !piece.is_empty())
            .map(|piece| piece.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()?;

        let end = base_offset.checked_add(values.len())?;
        if end > self.max_slot_index {
            return None;
        }
        Some((caps[1].to_string(), base_offset, values))
    }

    /// Parse every counter line in `content`
    pub fn parse_content(&self, content: &str, source_file: &Path) -> Vec<ChannelCounterSample> {
        content
            .lines()
            .enumerate()
            .filter_map(|(i, line)| self.parse_line(line, source_file, i + 1))
            .collect()
    }

    /// Stream a log file and parse its counter lines
    pub fn parse_log_file(&self, path: &Path) -> Result<Vec<ChannelCounterSample>> {
        if !path.exists() {
            return Err(AnalyzerError::FileNotFound(path.to_path_buf()));
        }

        let mut samples = Vec::new();
        for (i, line) in text::lines_lossy(path)?.enumerate() {
            if let Some(sample) = self.parse_line(&line?, path, i + 1) {
                samples.push(sample);
            }
        }

        if !samples.is_empty() {
            log::info!("Parsed {} SOA counter lines from {:?}", samples.len(), path);
        }
        Ok(samples)
    }
}
