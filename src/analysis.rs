// Turns the model's reply into categorized sections.
//
// Two reply shapes are understood:
// - the JSON vulnerability array requested by `prompt::AnalysisRequest`
// - free text with headings such as "Vulnerabilities:" or "## Exploit Links"
//
// Anything that does not fit lands in `Category::Other`; no content line is
// ever dropped.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

/// Section categories, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Vulnerabilities,
    MetasploitModules,
    Tools,
    ExploitLinks,
    Other,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Vulnerabilities,
        Category::MetasploitModules,
        Category::Tools,
        Category::ExploitLinks,
        Category::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::Vulnerabilities => "Vulnerabilities",
            Category::MetasploitModules => "Metasploit Modules",
            Category::Tools => "Tools",
            Category::ExploitLinks => "Exploit Links",
            Category::Other => "Other",
        }
    }

    /// Key used for this category in the `[colors]` config table.
    pub fn config_key(self) -> &'static str {
        match self {
            Category::Vulnerabilities => "vulnerabilities",
            Category::MetasploitModules => "metasploit_modules",
            Category::Tools => "tools",
            Category::ExploitLinks => "exploit_links",
            Category::Other => "other",
        }
    }

    pub fn from_config_key(key: &str) -> Option<Category> {
        Category::ALL.into_iter().find(|c| c.config_key() == key)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Recognized heading texts, already lowercased. "Other" is deliberately
/// absent: it is the fallback bucket, not a heading the model is asked for.
const HEADERS: &[(&str, Category)] = &[
    ("vulnerabilities", Category::Vulnerabilities),
    ("vulnerability", Category::Vulnerabilities),
    ("metasploit modules", Category::MetasploitModules),
    ("metasploit module", Category::MetasploitModules),
    ("metasploit", Category::MetasploitModules),
    ("tools", Category::Tools),
    ("other tools", Category::Tools),
    ("other tools and formats", Category::Tools),
    ("other tools & formats", Category::Tools),
    ("other suggested tools & formats", Category::Tools),
    ("exploit links", Category::ExploitLinks),
    ("exploit link", Category::ExploitLinks),
    ("exploits", Category::ExploitLinks),
];

/// The model's reply, raw and categorized.
///
/// `findings` keeps each structured vulnerability with its own modules,
/// tools and links; it is empty when the reply was free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResponse {
    pub raw_text: String,
    pub sections: BTreeMap<Category, Vec<String>>,
    pub findings: Vec<Finding>,
}

/// One vulnerability object from a structured reply.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Finding {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub metasploit_modules: Vec<String>,
    #[serde(default)]
    pub exploit_links: Vec<String>,
    #[serde(default)]
    pub other_tools_and_formats: Vec<String>,
}

impl Finding {
    fn is_blank(&self) -> bool {
        self.metasploit_modules
            .iter()
            .chain(&self.exploit_links)
            .chain(&self.other_tools_and_formats)
            .chain([&self.name, &self.description])
            .all(|item| item.trim().is_empty())
    }
}

impl AnalysisResponse {
    /// Categorize `raw_text`. Deterministic: the same text always produces
    /// the same sections.
    pub fn parse(raw_text: impl Into<String>) -> Self {
        let raw_text = raw_text.into();
        let (sections, findings) = match parse_findings(&raw_text) {
            Some(mut findings) => {
                findings.retain(|f| !f.is_blank());
                (sections_from_findings(&findings), findings)
            }
            None => (sections_from_text(&raw_text), Vec::new()),
        };
        AnalysisResponse {
            raw_text,
            sections,
            findings,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty() && self.sections.values().all(Vec::is_empty)
    }

    pub fn entries(&self, category: Category) -> &[String] {
        self.sections.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn parse_findings(raw: &str) -> Option<Vec<Finding>> {
    let body = strip_code_fence(raw.trim());
    if !body.starts_with('[') {
        return None;
    }
    serde_json::from_str(body).ok()
}

/// Remove a surrounding ```json ... ``` fence if present.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn sections_from_findings(findings: &[Finding]) -> BTreeMap<Category, Vec<String>> {
    let mut sections = BTreeMap::new();
    for finding in findings {
        let name = finding.name.trim();
        let description = finding.description.trim();
        let headline = match (name.is_empty(), description.is_empty()) {
            (false, false) => Some(format!("{name}: {description}")),
            (false, true) => Some(name.to_string()),
            (true, false) => Some(description.to_string()),
            (true, true) => None,
        };
        if let Some(headline) = headline {
            push_unique(&mut sections, Category::Vulnerabilities, &headline);
        }
        for module in &finding.metasploit_modules {
            push_unique(&mut sections, Category::MetasploitModules, module);
        }
        for tool in &finding.other_tools_and_formats {
            push_unique(&mut sections, Category::Tools, tool);
        }
        for link in &finding.exploit_links {
            push_unique(&mut sections, Category::ExploitLinks, link);
        }
    }
    sections
}

fn push_unique(sections: &mut BTreeMap<Category, Vec<String>>, category: Category, entry: &str) {
    let entry = entry.trim();
    if entry.is_empty() {
        return;
    }
    let bucket = sections.entry(category).or_default();
    if !bucket.iter().any(|e| e == entry) {
        bucket.push(entry.to_string());
    }
}

fn sections_from_text(raw: &str) -> BTreeMap<Category, Vec<String>> {
    let mut sections: BTreeMap<Category, Vec<String>> = BTreeMap::new();
    let mut current = Category::Other;

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(category) = header_category(line) {
            current = category;
            continue;
        }
        let entry = strip_bullet(line);
        if !entry.is_empty() {
            sections.entry(current).or_default().push(entry.to_string());
        }
    }
    sections
}

/// Match a whole line against the header table, ignoring markdown
/// decoration and one trailing colon.
fn header_category(line: &str) -> Option<Category> {
    let decoration = |c: char| c == '#' || c == '*' || c == '_' || c.is_whitespace();
    let text = line.trim_matches(decoration);
    let text = text.strip_suffix(':').unwrap_or(text).trim_matches(decoration);
    if text.is_empty() {
        return None;
    }
    let normalized = text.to_lowercase();
    HEADERS
        .iter()
        .find(|(label, _)| *label == normalized)
        .map(|(_, category)| *category)
}

fn strip_bullet(line: &str) -> &str {
    for marker in ["- ", "* ", "• ", "+ "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return rest.trim();
        }
    }
    // Numbered items: "1. foo" / "12) foo"
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return rest.trim();
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_recognized_headers() {
        let resp = AnalysisResponse::parse(
            "Vulnerabilities:\n- CVE-1234\nMetasploit Modules:\n- exploit/ssh/foo",
        );
        let expected = BTreeMap::from([
            (Category::Vulnerabilities, vec!["CVE-1234".to_string()]),
            (Category::MetasploitModules, vec!["exploit/ssh/foo".to_string()]),
        ]);
        assert_eq!(resp.sections, expected);
    }

    #[test]
    fn headers_match_case_insensitively_with_markdown() {
        let resp = AnalysisResponse::parse(
            "## EXPLOIT LINKS\n* https://example.com/poc\n**Tools:**\n1. nikto\n2) nmap",
        );
        assert_eq!(resp.entries(Category::ExploitLinks), ["https://example.com/poc"]);
        assert_eq!(resp.entries(Category::Tools), ["nikto", "nmap"]);
    }

    #[test]
    fn unstructured_text_goes_to_other() {
        let raw = "The host looks fine.\n\nNothing to report: really.";
        let resp = AnalysisResponse::parse(raw);
        assert_eq!(resp.sections.len(), 1);
        assert_eq!(
            resp.entries(Category::Other),
            ["The host looks fine.", "Nothing to report: really."]
        );
    }

    #[test]
    fn text_before_first_header_is_kept() {
        let resp = AnalysisResponse::parse("Summary first\nVulnerabilities\n- CVE-1");
        assert_eq!(resp.entries(Category::Other), ["Summary first"]);
        assert_eq!(resp.entries(Category::Vulnerabilities), ["CVE-1"]);
    }

    #[test]
    fn unknown_headings_are_content_not_headers() {
        let resp = AnalysisResponse::parse("Vulnerabilities found in SSH:\n- CVE-9");
        assert_eq!(
            resp.entries(Category::Other),
            ["Vulnerabilities found in SSH:", "CVE-9"]
        );
    }

    #[test]
    fn repeated_headers_append() {
        let resp = AnalysisResponse::parse("Tools:\n- a\nVulnerabilities:\n- v\nTools:\n- b");
        assert_eq!(resp.entries(Category::Tools), ["a", "b"]);
    }

    #[test]
    fn json_findings_are_categorized() {
        let raw = r#"[
          {"name": "EternalBlue", "description": "SMBv1 RCE",
           "metasploit_modules": ["exploit/windows/smb/ms17_010_eternalblue"],
           "exploit_links": ["https://www.exploit-db.com/exploits/42315"],
           "other_tools_and_formats": ["Nmap (XML)"]},
          {"name": "Weak SSH", "description": "",
           "metasploit_modules": [],
           "exploit_links": [],
           "other_tools_and_formats": ["Nmap (XML)", "Hydra (TXT)"]}
        ]"#;
        let resp = AnalysisResponse::parse(raw);
        assert_eq!(
            resp.entries(Category::Vulnerabilities),
            ["EternalBlue: SMBv1 RCE", "Weak SSH"]
        );
        assert_eq!(
            resp.entries(Category::MetasploitModules),
            ["exploit/windows/smb/ms17_010_eternalblue"]
        );
        assert_eq!(resp.entries(Category::Tools), ["Nmap (XML)", "Hydra (TXT)"]);
        assert_eq!(resp.entries(Category::ExploitLinks).len(), 1);
        assert!(resp.entries(Category::Other).is_empty());
    }

    #[test]
    fn unnamed_finding_keeps_its_lists() {
        let raw = r#"[{"name": "", "description": "",
            "metasploit_modules": ["exploit/x"],
            "exploit_links": ["https://poc"],
            "other_tools_and_formats": []}]"#;
        let resp = AnalysisResponse::parse(raw);
        assert!(resp.entries(Category::Vulnerabilities).is_empty());
        assert_eq!(resp.entries(Category::MetasploitModules), ["exploit/x"]);
        assert_eq!(resp.entries(Category::ExploitLinks), ["https://poc"]);
        assert_eq!(resp.findings.len(), 1);
        assert!(!resp.is_empty());
    }

    #[test]
    fn findings_keep_their_own_lists() {
        let raw = r#"[
          {"name": "A", "description": "a", "metasploit_modules": ["m1"], "exploit_links": [], "other_tools_and_formats": ["nmap"]},
          {"name": "B", "description": "b", "metasploit_modules": ["m2"], "exploit_links": [], "other_tools_and_formats": ["nmap"]}
        ]"#;
        let resp = AnalysisResponse::parse(raw);
        assert_eq!(resp.findings.len(), 2);
        assert_eq!(resp.findings[0].metasploit_modules, ["m1"]);
        assert_eq!(resp.findings[1].metasploit_modules, ["m2"]);
        assert_eq!(resp.findings[1].other_tools_and_formats, ["nmap"]);
        assert_eq!(resp.entries(Category::Tools), ["nmap"]);
    }

    #[test]
    fn entirely_blank_findings_are_dropped() {
        let resp = AnalysisResponse::parse(r#"[{"name": " ", "description": ""}]"#);
        assert!(resp.findings.is_empty());
        assert!(resp.is_empty());
    }

    #[test]
    fn text_replies_have_no_findings() {
        assert!(AnalysisResponse::parse("Tools:\n- nmap").findings.is_empty());
    }

    #[test]
    fn fenced_json_is_accepted() {
        let raw = "```json\n[{\"name\": \"X\", \"description\": \"y\"}]\n```";
        let resp = AnalysisResponse::parse(raw);
        assert_eq!(resp.entries(Category::Vulnerabilities), ["X: y"]);
    }

    #[test]
    fn empty_json_array_has_no_sections() {
        let resp = AnalysisResponse::parse("[]");
        assert!(resp.is_empty());
        assert_eq!(resp.raw_text, "[]");
    }

    #[test]
    fn parsing_is_deterministic() {
        let raw = "intro\nTools:\n- a\nExploits:\n- b\nstray";
        assert_eq!(AnalysisResponse::parse(raw), AnalysisResponse::parse(raw));
    }

    #[test]
    fn config_keys_round_trip() {
        for category in Category::ALL {
            assert_eq!(Category::from_config_key(category.config_key()), Some(category));
        }
        assert_eq!(Category::from_config_key("nope"), None);
    }
}
