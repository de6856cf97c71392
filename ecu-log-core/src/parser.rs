//! Per-file log parsing and directory batches
//!
//! [`LogRecordParser`] pulls the file-level metadata out of one ECU log
//! (project, software baseline, last CPU load sample, capture time) and hands
//! the text to the [`TrapEventExtractor`]. Directory batches run on a bounded
//! rayon pool; a file that fails to parse is logged and left out of the batch.

use crate::config::{AnalyzerConfig, ParserConfig};
use crate::text;
use crate::trap::TrapEventExtractor;
use crate::types::{AnalyzerError, ParsedLog, Result};
use rayon::prelude::*;
use regex::Regex;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Metadata patterns, compiled once per parser
#[derive(Debug, Clone)]
struct MetadataPatterns {
    /// `2025-08-25 16:53:41.276 BZCU I 02c5 ...`
    line_prefix_project: Regex,
    rmr_project: Regex,
    file_name_project: Regex,
    labelled_project: Vec<Regex>,
    baseline: Vec<Regex>,
    tagged_core_load: Regex,
    core_load: Regex,
    file_name_timestamp: Vec<Regex>,
    content_timestamp: Vec<Regex>,
}

impl MetadataPatterns {
    fn compile() -> Result<Self> {
        Ok(Self {
            line_prefix_project: text::compile_pattern(
                r"\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2}(?:\.\d+)?\s+([A-Z]+[A-Z0-9_]*)\s+[A-Z]\s+[a-f0-9]+",
            )?,
            rmr_project: text::compile_pattern(r"RMR:([^;:,\s]+)")?,
            file_name_project: text::compile_pattern(r"([A-Z]+[A-Z0-9_]*)-[0-9]+")?,
            labelled_project: compile_all(&[
                r"(?i)Project:\s*([^\n\r]+)",
                r"项目:\s*([^\n\r]+)",
                r"(?i)ECU:\s*([^\n\r]+)",
            ])?,
            baseline: compile_all(&[
                r"(?i)SWVerNum\s*:\s*([0-9a-fA-Fx]+)",
                r"(?i)version:\s*([0-9a-fA-Fx]+)",
            ])?,
            tagged_core_load: text::compile_pattern(
                r"(?i)\[CPU_LOAD\]:core\s+load:\s*([\d.][\d.,\t ]*)",
            )?,
            core_load: text::compile_pattern(r"(?i)core\s+load:\s*([\d.][\d.,\t ]*)")?,
            file_name_timestamp: compile_all(&[r"(\d{4}_\d{2}_\d{2}_\d{2}_\d{2}_\d{2})", r"(\d{8}_\d{6})"])?,
            content_timestamp: compile_all(&[
                r"(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2})",
                r"(\d{4}/\d{2}/\d{2} \d{2}:\d{2}:\d{2})",
            ])?,
        })
    }

    /// `<date> <time> <PROJECT> <L> <hex>` log prefix, then `RMR:<name>`
    fn project_in_log_lines(&self, content: &str) -> Option<String> {
        self.line_prefix_project
            .captures(content)
            .or_else(|| self.rmr_project.captures(content))
            .map(|caps| caps[1].trim().to_string())
    }

    /// `Project:` / `项目:` / `ECU:` labels
    fn project_in_labels(&self, content: &str) -> Option<String> {
        self.labelled_project
            .iter()
            .find_map(|re| re.captures(content))
            .map(|caps| caps[1].trim().to_string())
    }

    /// Project name found in log text alone
    fn project_in_text(&self, content: &str) -> Option<String> {
        self.project_in_log_lines(content)
            .or_else(|| self.project_in_labels(content))
    }

    /// Project name with full precedence: log prefix, `RMR:`, file name, labels
    fn project_name(&self, content: &str, file_name: &str) -> Option<String> {
        self.project_in_log_lines(content)
            .or_else(|| self.project_in_file_name(file_name))
            .or_else(|| self.project_in_labels(content))
    }

    fn project_in_file_name(&self, file_name: &str) -> Option<String> {
        self.file_name_project
            .captures(file_name)
            .map(|caps| caps[1].to_string())
    }

    fn baseline(&self, content: &str) -> Option<String> {
        self.baseline
            .iter()
            .find_map(|re| re.captures(content))
            .map(|caps| caps[1].trim().to_string())
    }

    /// Last core load sample; an unparseable sample yields no loads
    fn core_loads(&self, content: &str) -> Option<Vec<f64>> {
        let last = self
            .tagged_core_load
            .captures_iter(content)
            .last()
            .or_else(|| self.core_load.captures_iter(content).last())?;

        let values = last[1]
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| v.parse::<f64>().ok())
            .collect::<Option<Vec<f64>>>()
            .unwrap_or_default();
        Some(values)
    }

    fn timestamp_in_file_name(&self, file_name: &str) -> Option<String> {
        self.file_name_timestamp
            .iter()
            .find_map(|re| re.captures(file_name))
            .map(|caps| caps[1].to_string())
    }

    fn timestamp_in_text(&self, content: &str) -> Option<String> {
        self.content_timestamp
            .iter()
            .find_map(|re| re.captures(content))
            .map(|caps| caps[1].to_string())
    }
}

fn compile_all(patterns: &[&str]) -> Result<Vec<Regex>> {
    patterns.iter().map(|p| text::compile_pattern(p)).collect()
}

/// Parses ECU log files into [`ParsedLog`] records
#[derive(Debug)]
pub struct LogRecordParser {
    config: ParserConfig,
    patterns: MetadataPatterns,
    extractor: TrapEventExtractor,
}

impl LogRecordParser {
    /// Create a parser around an existing TRAP extractor
    pub fn new(config: &AnalyzerConfig, extractor: TrapEventExtractor) -> Result<Self> {
        Ok(Self {
            config: config.parser.clone(),
            patterns: MetadataPatterns::compile()?,
            extractor,
        })
    }

    /// Create a parser and its TRAP extractor, loading the map file if given
    pub fn with_map_file(config: &AnalyzerConfig, map_file: Option<&Path>) -> Result<Self> {
        let extractor = TrapEventExtractor::with_map_file(config, map_file)?;
        Self::new(config, extractor)
    }

    pub fn extractor(&self) -> &TrapEventExtractor {
        &self.extractor
    }

    /// Parse one log file
    ///
    /// Small files are read whole. Files above the streaming threshold are
    /// scanned line by line for metadata only; TRAP extraction is skipped.
    pub fn parse_file(&self, path: &Path) -> Result<ParsedLog> {
        log::info!("Parsing log file: {:?}", path);

        if !path.exists() {
            log::error!("Log file not found: {:?}", path);
            return Err(AnalyzerError::FileNotFound(path.to_path_buf()));
        }

        let size = std::fs::metadata(path)?.len();
        if size > self.config.max_file_size {
            log::error!(
                "Log file too large: {:?} ({} bytes, limit {} bytes)",
                path,
                size,
                self.config.max_file_size
            );
            return Err(AnalyzerError::FileTooLarge {
                path: path.to_path_buf(),
                size,
                limit: self.config.max_file_size,
            });
        }

        if size > self.config.streaming_threshold {
            log::info!("Streaming large log file ({} bytes): {:?}", size, path);
            return self.parse_streaming(path);
        }

        let content = text::read_to_string_lossy(path).map_err(|e| {
            log::error!("Failed to read {:?}: {}", path, e);
            e
        })?;
        Ok(self.parse_content(&content, path))
    }

    /// Parse already-loaded log text
    pub fn parse_content(&self, content: &str, path: &Path) -> ParsedLog {
        let file_name = file_name(path);

        ParsedLog {
            file_path: path.to_path_buf(),
            project_name: self.patterns.project_name(content, &file_name),
            baseline_version: self.patterns.baseline(content),
            core_loads: self.patterns.core_loads(content).unwrap_or_default(),
            timestamp: self
                .patterns
                .timestamp_in_file_name(&file_name)
                .or_else(|| self.patterns.timestamp_in_text(content)),
            trap_events: self.extractor.extract(content),
        }
    }

    /// Line-by-line metadata scan for files too big to hold in memory
    ///
    /// Each field keeps the last value seen; an empty load sample is ignored.
    fn parse_streaming(&self, path: &Path) -> Result<ParsedLog> {
        let file_name = file_name(path);
        let mut parsed = ParsedLog::empty(path);
        let mut text_timestamp = None;

        for line in text::lines_lossy(path)? {
            let line = line?;
            if line.is_empty() {
                continue;
            }

            if let Some(project) = self.patterns.project_in_text(&line) {
                parsed.project_name = Some(project);
            }
            if let Some(baseline) = self.patterns.baseline(&line) {
                parsed.baseline_version = Some(baseline);
            }
            match self.patterns.core_loads(&line) {
                Some(loads) if !loads.is_empty() => parsed.core_loads = loads,
                _ => {}
            }
            if let Some(timestamp) = self.patterns.timestamp_in_text(&line) {
                text_timestamp = Some(timestamp);
            }
        }

        if parsed.project_name.is_none() {
            parsed.project_name = self.patterns.project_in_file_name(&file_name);
        }
        parsed.timestamp = self
            .patterns
            .timestamp_in_file_name(&file_name)
            .or(text_timestamp);
        Ok(parsed)
    }

    /// Log files under `dir`, recursively, in sorted order
    ///
    /// A file qualifies if it has one of the configured extensions
    /// (case-insensitive) or no extension at all.
    pub fn collect_log_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        self.collect_into(dir, &mut files)?;
        files.sort();
        Ok(files)
    }

    fn collect_into(&self, dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                self.collect_into(&path, files)?;
            } else if self.is_log_file(&path) {
                files.push(path);
            }
        }
        Ok(())
    }

    fn is_log_file(&self, path: &Path) -> bool {
        let name = file_name(path).to_lowercase();
        if path.extension().is_none() {
            return true;
        }
        self.config
            .log_extensions
            .iter()
            .any(|ext| name.ends_with(&ext.to_lowercase()))
    }

    /// Parse every log file in a directory tree
    ///
    /// Never fails: a missing directory or unreadable file is logged and yields
    /// fewer results.
    pub fn parse_directory(&self, dir: &Path, parallel: bool) -> Vec<ParsedLog> {
        if !dir.is_dir() {
            log::error!("Log directory not found: {:?}", dir);
            return Vec::new();
        }

        let files = match self.collect_log_files(dir) {
            Ok(files) => files,
            Err(e) => {
                log::error!("Failed to scan {:?}: {}", dir, e);
                return Vec::new();
            }
        };

        if files.is_empty() {
            log::warn!("No log files found in {:?}", dir);
            return Vec::new();
        }

        log::info!("Found {} log files in {:?}", files.len(), dir);
        self.parse_files(&files, parallel)
    }

    /// Parse a batch of files, skipping the ones that fail
    ///
    /// Parallel results are not guaranteed to follow the input order.
    pub fn parse_files(&self, paths: &[PathBuf], parallel: bool) -> Vec<ParsedLog> {
        let started = Instant::now();

        let results = if parallel && paths.len() > 1 {
            let workers = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
                .min(self.config.max_workers)
                .max(1);

            match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
                Ok(pool) => {
                    log::info!("Parsing {} files on {} workers", paths.len(), workers);
                    pool.install(|| {
                        paths
                            .par_iter()
                            .filter_map(|path| self.parse_guarded(path))
                            .collect::<Vec<_>>()
                    })
                }
                Err(e) => {
                    log::warn!("Failed to start worker pool ({}), parsing serially", e);
                    self.parse_serial(paths)
                }
            }
        } else {
            self.parse_serial(paths)
        };

        log::info!(
            "Parsed {}/{} files in {:.2}s",
            results.len(),
            paths.len(),
            started.elapsed().as_secs_f64()
        );
        results
    }

    fn parse_serial(&self, paths: &[PathBuf]) -> Vec<ParsedLog> {
        paths.iter().filter_map(|path| self.parse_guarded(path)).collect()
    }

    /// Parse one batch member; errors and panics become `None`
    fn parse_guarded(&self, path: &Path) -> Option<ParsedLog> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.parse_file(path))) {
            Ok(Ok(parsed)) => Some(parsed),
            Ok(Err(e)) => {
                log::error!("Skipping {:?}: {}", path, e);
                None
            }
            Err(_) => {
                log::error!("Parser panicked on {:?}, skipping", path);
                None
            }
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn parser() -> LogRecordParser {
        let config = AnalyzerConfig::default();
        LogRecordParser::new(&config, TrapEventExtractor::new(&config, None).unwrap()).unwrap()
    }

    #[test]
    fn test_project_precedence() {
        let p = parser();
        let content = "ECU: Body\nRMR:GATEWAY;\n2025-08-25 16:53:41.276 BZCU I 02c5 boot\n";
        assert_eq!(p.parse_content(content, Path::new("x.log")).project_name.as_deref(), Some("BZCU"));

        let content = "ECU: Body\nRMR:GATEWAY;\n";
        assert_eq!(
            p.parse_content(content, Path::new("DZCU-01.log")).project_name.as_deref(),
            Some("GATEWAY")
        );

        let content = "Project: Front Zone \n";
        assert_eq!(
            p.parse_content(content, Path::new("DZCU-01.log")).project_name.as_deref(),
            Some("DZCU")
        );
        assert_eq!(
            p.parse_content(content, Path::new("trace.log")).project_name.as_deref(),
            Some("Front Zone")
        );
        assert_eq!(
            p.parse_content("项目: 左域\n", Path::new("trace.log")).project_name.as_deref(),
            Some("左域")
        );
    }

    #[test]
    fn test_baseline_version() {
        let p = parser();
        let parsed = p.parse_content("version: 1a2b\nSWVerNum : 0x00FF\n", Path::new("x.log"));
        assert_eq!(parsed.baseline_version.as_deref(), Some("0x00FF"));

        let parsed = p.parse_content("Version: 1a2b\n", Path::new("x.log"));
        assert_eq!(parsed.baseline_version.as_deref(), Some("1a2b"));
    }

    #[test]
    fn test_core_loads_takes_last_sample() {
        let p = parser();
        let content = "\
[CPU_LOAD]:core load: 10.0, 20.0
core load: 99.0
[CPU_LOAD]:core load: 12.5, 30.25, 7, mcu_version: 3
";
        let parsed = p.parse_content(content, Path::new("x.log"));
        assert_eq!(parsed.core_loads, vec![12.5, 30.25, 7.0]);

        let parsed = p.parse_content("core load: 1.5,2.5,\n", Path::new("x.log"));
        assert_eq!(parsed.core_loads, vec![1.5, 2.5]);

        let parsed = p.parse_content("core load: 1.5 2.5\n", Path::new("x.log"));
        assert!(parsed.core_loads.is_empty());

        // a non-numeric reading is not a sample
        let parsed = p.parse_content("core load: 10,20\ncore load: n/a\n", Path::new("x.log"));
        assert_eq!(parsed.core_loads, vec![10.0, 20.0]);
    }

    #[test]
    fn test_timestamp_sources() {
        let p = parser();
        let content = "2025-08-25 16:53:41.276 boot\n";
        assert_eq!(
            p.parse_content(content, Path::new("BZCU_2025_08_25_16_00_00.log")).timestamp.as_deref(),
            Some("2025_08_25_16_00_00")
        );
        assert_eq!(
            p.parse_content(content, Path::new("dump_20250825_160000.log")).timestamp.as_deref(),
            Some("20250825_160000")
        );
        assert_eq!(
            p.parse_content(content, Path::new("x.log")).timestamp.as_deref(),
            Some("2025-08-25 16:53:41")
        );
        assert_eq!(
            p.parse_content("at 2025/08/25 16:53:41\n", Path::new("x.log")).timestamp.as_deref(),
            Some("2025/08/25 16:53:41")
        );
    }

    #[test]
    fn test_parse_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let p = parser();
        assert!(matches!(
            p.parse_file(&dir.path().join("missing.log")),
            Err(AnalyzerError::FileNotFound(_))
        ));

        let config = AnalyzerConfig::default();
        let mut small = config.clone();
        small.parser.max_file_size = 4;
        let p = LogRecordParser::new(&small, TrapEventExtractor::new(&config, None).unwrap()).unwrap();
        let big = dir.path().join("big.log");
        fs::write(&big, "0123456789").unwrap();
        assert!(matches!(p.parse_file(&big), Err(AnalyzerError::FileTooLarge { size: 10, .. })));
    }

    #[test]
    fn test_streaming_mode_keeps_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("GW-7.log");
        fs::write(
            &path,
            "\
boot
SWVerNum: 0x12
2025-08-25 16:53:41 up
core load: 1,2
{TRAP-RST}:Reset Info:
{TRAP-RST}:Reset Type: 3
core load: 3,4
SWVerNum: 0x13
2025-08-25 17:02:10 reflash
core load: n/a
core load: 5 6
",
        )
        .unwrap();

        let mut config = AnalyzerConfig::default();
        config.parser.streaming_threshold = 8;
        let p = LogRecordParser::new(&config, TrapEventExtractor::new(&config, None).unwrap()).unwrap();

        let parsed = p.parse_file(&path).unwrap();
        assert_eq!(parsed.project_name.as_deref(), Some("GW"));
        assert_eq!(parsed.baseline_version.as_deref(), Some("0x13"));
        assert_eq!(parsed.core_loads, vec![3.0, 4.0]);
        assert_eq!(parsed.timestamp.as_deref(), Some("2025-08-25 17:02:10"));
        assert!(parsed.trap_events.is_empty());

        let named = dir.path().join("GW-7_2025_08_25_16_00_00.log");
        fs::copy(&path, &named).unwrap();
        let parsed = p.parse_file(&named).unwrap();
        assert_eq!(parsed.timestamp.as_deref(), Some("2025_08_25_16_00_00"));
    }

    #[test]
    fn test_streaming_project_is_last_seen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("GW-7.log");
        fs::write(
            &path,
            "2025-08-25 16:53:41.276 BZCU I 02c5 boot\nRMR:PZCU;\n",
        )
        .unwrap();

        let mut config = AnalyzerConfig::default();
        config.parser.streaming_threshold = 8;
        let p = LogRecordParser::new(&config, TrapEventExtractor::new(&config, None).unwrap()).unwrap();

        let parsed = p.parse_file(&path).unwrap();
        assert_eq!(parsed.project_name.as_deref(), Some("PZCU"));
    }

    #[test]
    fn test_collect_log_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("a.log"), "").unwrap();
        fs::write(dir.path().join("b.TXT"), "").unwrap();
        fs::write(dir.path().join("nested").join("console"), "").unwrap();
        fs::write(dir.path().join("nested").join("c.out"), "").unwrap();
        fs::write(dir.path().join("image.png"), "").unwrap();

        let files = parser().collect_log_files(dir.path()).unwrap();
        let names: Vec<String> = files.iter().map(|p| file_name(p)).collect();
        assert_eq!(names, vec!["a.log", "b.TXT", "c.out", "console"]);
    }

    #[test]
    fn test_missing_directory_is_empty_batch() {
        assert!(parser().parse_directory(Path::new("/nonexistent/logs"), true).is_empty());
    }
}
