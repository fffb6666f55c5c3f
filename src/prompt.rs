// Prompt builder: reads the scan results file and pairs it with the user
// query. The resulting `AnalysisRequest` is immutable; the API client only
// borrows it.

use crate::error::{Result, VortexError};
use std::path::{Path, PathBuf};

/// Default cap on the scan content forwarded to the model (1 MiB).
pub const DEFAULT_MAX_INPUT_BYTES: usize = 1024 * 1024;

const TRUNCATION_MARKER: &str = "\n[... content truncated by vortexai ...]\n";

/// One analysis request: scan content plus the user's instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    source_path: PathBuf,
    scan_results_text: String,
    query: String,
    truncated: bool,
}

impl AnalysisRequest {
    /// Build a request from in-memory text. `build` is the usual entry point.
    pub fn new(source_path: impl Into<PathBuf>, scan_results_text: String, query: &str) -> Result<Self> {
        let query = query.trim();
        if query.is_empty() {
            return Err(VortexError::EmptyQuery);
        }
        Ok(AnalysisRequest {
            source_path: source_path.into(),
            scan_results_text,
            query: query.to_string(),
            truncated: false,
        })
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn scan_results_text(&self) -> &str {
        &self.scan_results_text
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// Full instruction sent to the model, asking for the JSON layout that
    /// `analysis::AnalysisResponse::parse` understands.
    pub fn prompt_text(&self) -> String {
        format!(
            r#"
Analyze the following content and {query}.
Provide your analysis in a structured JSON format. The JSON should be an array of vulnerability objects.
Each vulnerability object must contain:
- "name": A concise name for the vulnerability.
- "description": A short, parsed explanation of the vulnerability.
- "metasploit_modules": An array of suggested Metasploit module paths (e.g., "exploit/windows/smb/ms17_010_eternalblue"). If none, use an empty array.
- "exploit_links": An array of relevant URLs for exploit details or PoCs. If none, use an empty array.
- "other_tools_and_formats": An array of other relevant tools and their likely output formats (e.g., "Nessus (HTML, XML, CSV)", "Nmap (XML, Nmap Script Output)", "Nikto (TXT, HTML)"). If none, use an empty array.

--- Content Start ---
{content}
--- Content End ---
"#,
            query = self.query,
            content = self.scan_results_text,
        )
    }
}

/// Read `file_path` and build the request for `query`.
///
/// The query is validated before the file is touched. Content larger than
/// `max_input_bytes` is cut on a character boundary and tagged with a marker.
pub fn build(file_path: &Path, query: &str, max_input_bytes: usize) -> Result<AnalysisRequest> {
    if query.trim().is_empty() {
        return Err(VortexError::EmptyQuery);
    }

    let read_error = |reason: String| VortexError::FileRead {
        path: file_path.to_path_buf(),
        reason,
    };

    let meta = std::fs::metadata(file_path).map_err(|e| read_error(e.to_string()))?;
    if !meta.is_file() {
        return Err(read_error("not a regular file".into()));
    }
    let bytes = std::fs::read(file_path).map_err(|e| read_error(e.to_string()))?;

    let mut text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!(path = %file_path.display(), "results file is not valid UTF-8, replacing invalid bytes");
            String::from_utf8_lossy(err.as_bytes()).into_owned()
        }
    };

    let truncated = truncate_to(&mut text, max_input_bytes);
    if truncated {
        tracing::warn!(
            path = %file_path.display(),
            limit = max_input_bytes,
            "results file exceeds the input limit and was truncated"
        );
        text.push_str(TRUNCATION_MARKER);
    }

    let mut request = AnalysisRequest::new(file_path, text, query)?;
    request.truncated = truncated;
    tracing::debug!(bytes = request.scan_results_text.len(), "analysis request built");
    Ok(request)
}

/// Shrink `text` to at most `limit` bytes without splitting a character.
fn truncate_to(text: &mut String, limit: usize) -> bool {
    if text.len() <= limit {
        return false;
    }
    let mut cut = limit;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    true
}
