// Sidecar log file written next to the analyzed input: `scan.txt` gets
// `scan.txt.log`. The record holds the plain-text analysis and the raw
// model reply; the API key never reaches this module.

use crate::analysis::AnalysisResponse;
use crate::config::LogMode;
use crate::error::{Result, VortexError};
use crate::ui::Renderer;
use chrono::{DateTime, SecondsFormat, Utc};
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const LOG_SUFFIX: &str = ".log";

/// Everything persisted for one invocation.
#[derive(Debug, Clone)]
pub struct LogRecord<'a> {
    pub source_file_path: &'a Path,
    pub timestamp: DateTime<Utc>,
    pub query: &'a str,
    pub response: &'a AnalysisResponse,
}

impl<'a> LogRecord<'a> {
    pub fn new(source_file_path: &'a Path, query: &'a str, response: &'a AnalysisResponse) -> Self {
        LogRecord {
            source_file_path,
            timestamp: Utc::now(),
            query,
            response,
        }
    }

    /// Text written to the log file.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("=== vortexai analysis ===\n");
        out.push_str(&format!("source: {}\n", self.source_file_path.display()));
        out.push_str(&format!(
            "timestamp: {}\n",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
        ));
        out.push_str(&format!("query: {}\n\n", self.query));
        out.push_str(&Renderer::plain().format(self.response));
        out.push_str("\n--- Raw Response ---\n");
        out.push_str(&self.response.raw_text);
        if !self.response.raw_text.ends_with('\n') {
            out.push('\n');
        }
        out
    }
}

/// `source` with the log suffix appended to its full file name.
pub fn log_path_for(source: &Path) -> PathBuf {
    let mut name = OsString::from(source.as_os_str());
    name.push(LOG_SUFFIX);
    PathBuf::from(name)
}

/// Write `record` to its log path and return that path.
///
/// The file handle is scoped to this call and closed on every path out of
/// it, including a failed write.
pub fn write(record: &LogRecord<'_>, mode: LogMode) -> Result<PathBuf> {
    let path = log_path_for(record.source_file_path);
    let to_error = |source: std::io::Error| VortexError::LogWrite {
        path: path.clone(),
        source,
    };

    let mut options = OpenOptions::new();
    options.create(true);
    match mode {
        LogMode::Overwrite => options.write(true).truncate(true),
        LogMode::Append => options.append(true),
    };

    let file = options.open(&path).map_err(to_error)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(record.render().as_bytes()).map_err(to_error)?;
    writer.flush().map_err(to_error)?;

    tracing::debug!(path = %path.display(), ?mode, "analysis log written");
    Ok(path)
}
