//! Per-channel time series reconstruction

use super::parser::{self, SoaLineParser};
use crate::config::SoaConfig;
use crate::types::{
    Channel, ChannelCounterSample, CounterKind, CounterPoint, Result, SoaReport, SoaStatistics,
};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// Chart-ready series for one channel
///
/// A zero receive/send count becomes a gap (`None`); drop counts keep zeros.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelSeries {
    pub name: String,
    pub received: Option<Vec<(String, Option<u64>)>>,
    pub sent: Option<Vec<(String, Option<u64>)>>,
    pub dropped: Option<Vec<CounterPoint>>,
}

/// Totals across all channels with data, per timestamp
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SummarySeries {
    pub timestamps: Vec<String>,
    pub received: Vec<u64>,
    pub sent: Vec<u64>,
    pub dropped: Vec<u64>,
}

/// One counter line for the detail table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogDetail {
    pub file_name: String,
    pub line_number: usize,
    pub raw_text: String,
    pub kind: CounterKind,
    pub timestamp: String,
}

/// Receive and send slot of one channel
#[derive(Debug, Clone, Copy)]
struct Slots {
    receive: usize,
    send: Option<usize>,
}

/// Rebuilds channel time series from counter dumps and a manifest
#[derive(Debug)]
pub struct ServiceBusReconstructor {
    line_parser: SoaLineParser,
    manifest: Vec<String>,
    samples: Vec<ChannelCounterSample>,
    channels: Vec<Channel>,
}

impl ServiceBusReconstructor {
    pub fn new(config: &SoaConfig) -> Result<Self> {
        Ok(Self {
            line_parser: SoaLineParser::new(config)?,
            manifest: Vec::new(),
            samples: Vec::new(),
            channels: Vec::new(),
        })
    }

    /// Load the channel manifest; failures are logged and reported as `false`
    pub fn load_manifest(&mut self, path: &Path) -> bool {
        match parser::load_manifest(path) {
            Ok(manifest) => {
                log::info!("Loaded {} channel names from {:?}", manifest.len(), path);
                self.manifest = manifest;
                true
            }
            Err(e) => {
                log::warn!("Failed to load channel manifest {:?}: {}", path, e);
                false
            }
        }
    }

    pub fn set_manifest(&mut self, manifest: Vec<String>) {
        self.manifest = manifest;
    }

    pub fn manifest(&self) -> &[String] {
        &self.manifest
    }

    /// Parse a log file and keep its counter samples
    ///
    /// Returns the number of samples added; an unreadable file adds none.
    pub fn parse_log_file(&mut self, path: &Path) -> usize {
        match self.line_parser.parse_log_file(path) {
            Ok(samples) => {
                let count = samples.len();
                self.samples.extend(samples);
                count
            }
            Err(e) => {
                log::warn!("Skipping SOA scan of {:?}: {}", path, e);
                0
            }
        }
    }

    /// Parse in-memory log content and keep its counter samples
    pub fn parse_content(&mut self, content: &str, source_file: &Path) -> usize {
        let samples = self.line_parser.parse_content(content, source_file);
        let count = samples.len();
        self.samples.extend(samples);
        count
    }

    pub fn add_samples(&mut self, samples: impl IntoIterator<Item = ChannelCounterSample>) {
        self.samples.extend(samples);
    }

    pub fn samples(&self) -> &[ChannelCounterSample] {
        &self.samples
    }

    /// Rebuild channel series from the collected samples
    ///
    /// Returns `false` (and leaves the channels empty) when the manifest or the
    /// sample list is empty.
    pub fn process(&mut self) -> bool {
        self.channels.clear();

        if self.manifest.is_empty() {
            log::warn!("Channel manifest is empty, cannot reconstruct SOA series");
            return false;
        }
        if self.samples.is_empty() {
            log::warn!("No SOA counter samples collected");
            return false;
        }

        let (mut channels, slots) = self.channel_slots();
        let width = self.manifest.len();

        for (timestamp, group) in self.timestamp_groups() {
            if let Some(counts) = flatten(&group, CounterKind::Count, width) {
                for (channel, slot) in channels.iter_mut().zip(&slots) {
                    if let Some(&value) = counts.get(slot.receive) {
                        channel.received.push((timestamp.to_string(), value));
                    }
                    if let Some(&value) = slot.send.and_then(|s| counts.get(s)) {
                        channel.sent.push((timestamp.to_string(), value));
                    }
                }
            }

            if let Some(drops) = flatten(&group, CounterKind::Drop, width) {
                for (channel, slot) in channels.iter_mut().zip(&slots) {
                    if let Some(&value) = drops.get(slot.receive) {
                        channel.dropped.push((timestamp.to_string(), value));
                    }
                }
            }
        }

        log::info!("Reconstructed SOA series for {} channels", channels.len());
        self.channels = channels;
        true
    }

    /// One empty channel per distinct manifest name, with its slots
    fn channel_slots(&self) -> (Vec<Channel>, Vec<Slots>) {
        let mut channels: Vec<Channel> = Vec::new();
        let mut slots: Vec<Slots> = Vec::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();

        for (index, name) in self.manifest.iter().enumerate() {
            match positions.get(name.as_str()) {
                Some(&pos) => {
                    if slots[pos].send.is_none() {
                        slots[pos].send = Some(index);
                    }
                }
                None => {
                    positions.insert(name.as_str(), channels.len());
                    channels.push(Channel::new(name.clone()));
                    slots.push(Slots {
                        receive: index,
                        send: None,
                    });
                }
            }
        }
        (channels, slots)
    }

    /// Samples grouped by exact timestamp, groups in first-seen order
    fn timestamp_groups(&self) -> Vec<(&str, Vec<&ChannelCounterSample>)> {
        let mut groups: Vec<(&str, Vec<&ChannelCounterSample>)> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();

        for sample in &self.samples {
            let ts = sample.timestamp.as_str();
            match index.get(ts) {
                Some(&i) => groups[i].1.push(sample),
                None => {
                    index.insert(ts, groups.len());
                    groups.push((ts, vec![sample]));
                }
            }
        }
        groups
    }

    /// Channels in manifest order (empty before [`process`](Self::process))
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.name == name)
    }

    /// Aggregate statistics
    ///
    /// Counts are taken per manifest entry, so a channel listed twice is counted
    /// twice. An entry with no reconstructed channel (nothing processed yet)
    /// counts as without data. Lost data is summed once per channel.
    pub fn statistics(&self) -> SoaStatistics {
        let mut stats = SoaStatistics {
            topic_count: self.manifest.len(),
            ..SoaStatistics::default()
        };

        for name in &self.manifest {
            let channel = self.channel(name);
            stats.data_points += channel.map_or(0, Channel::data_points);
            if channel.is_some_and(Channel::has_data) {
                stats.topics_with_data += 1;
            } else {
                stats.topics_without_data += 1;
            }
        }

        stats.total_lost_data = self.channels.iter().map(Channel::total_dropped).sum();
        stats
    }

    /// Series for every channel that carries data
    pub fn channel_series(&self) -> Vec<ChannelSeries> {
        self.channels
            .iter()
            .filter(|c| c.has_data())
            .map(|c| ChannelSeries {
                name: c.name.clone(),
                received: gapped(&c.received),
                sent: gapped(&c.sent),
                dropped: (!c.dropped.is_empty()).then(|| c.dropped.clone()),
            })
            .collect()
    }

    /// Totals per timestamp over channels with data
    ///
    /// Timestamps are the sorted union across all channels.
    pub fn summary_series(&self) -> SummarySeries {
        let timestamps: BTreeSet<&str> = self
            .channels
            .iter()
            .flat_map(|c| c.received.iter().chain(&c.sent).chain(&c.dropped))
            .map(|(ts, _)| ts.as_str())
            .collect();

        if timestamps.is_empty() {
            log::warn!("No SOA timestamps, summary series is empty");
            return SummarySeries::default();
        }

        let mut summary = SummarySeries {
            timestamps: timestamps.iter().map(|ts| ts.to_string()).collect(),
            received: vec![0; timestamps.len()],
            sent: vec![0; timestamps.len()],
            dropped: vec![0; timestamps.len()],
        };

        for channel in self.channels.iter().filter(|c| c.has_data()) {
            for (i, ts) in timestamps.iter().enumerate() {
                summary.received[i] += value_at(&channel.received, ts);
                summary.sent[i] += value_at(&channel.sent, ts);
                summary.dropped[i] += value_at(&channel.dropped, ts);
            }
        }
        summary
    }

    /// One entry per collected sample, sorted by file name then line
    pub fn log_details(&self) -> Vec<LogDetail> {
        let mut details: Vec<LogDetail> = self
            .samples
            .iter()
            .map(|s| LogDetail {
                file_name: file_name(&s.source_file),
                line_number: s.source_line,
                raw_text: s.raw_text.clone(),
                kind: s.kind,
                timestamp: s.timestamp.clone(),
            })
            .collect();
        details.sort_by(|a, b| {
            a.file_name
                .cmp(&b.file_name)
                .then(a.line_number.cmp(&b.line_number))
        });
        details
    }

    /// Channels and statistics, or `None` if nothing was reconstructed
    pub fn report(&self) -> Option<SoaReport> {
        if self.channels.is_empty() {
            return None;
        }
        Some(SoaReport {
            channels: self.channels.clone(),
            statistics: self.statistics(),
        })
    }
}

/// Overlay all samples of one kind onto a zeroed flat vector
///
/// Slots at or past `width` are dropped, so the vector never outgrows the
/// manifest whatever offset a sample carries.
fn flatten(group: &[&ChannelCounterSample], kind: CounterKind, width: usize) -> Option<Vec<u64>> {
    let samples: Vec<&ChannelCounterSample> =
        group.iter().copied().filter(|s| s.kind == kind).collect();
    if samples.is_empty() {
        return None;
    }

    let len = samples
        .iter()
        .filter(|s| s.base_offset < width)
        .map(|s| s.base_offset.saturating_add(s.values.len()).min(width))
        .max()
        .unwrap_or(0);
    let mut flat = vec![0u64; len];
    for sample in samples {
        if sample.base_offset >= len {
            continue;
        }
        let end = sample.base_offset.saturating_add(sample.values.len()).min(len);
        let count = end - sample.base_offset;
        flat[sample.base_offset..end].copy_from_slice(&sample.values[..count]);
    }
    Some(flat)
}

fn gapped(series: &[CounterPoint]) -> Option<Vec<(String, Option<u64>)>> {
    if !series.iter().any(|(_, count)| *count > 0) {
        return None;
    }
    Some(
        series
            .iter()
            .map(|(ts, count)| (ts.clone(), (*count > 0).then_some(*count)))
            .collect(),
    )
}

fn value_at(series: &[CounterPoint], timestamp: &str) -> u64 {
    series
        .iter()
        .find(|(ts, _)| ts == timestamp)
        .map(|(_, count)| *count)
        .unwrap_or(0)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string())
}
