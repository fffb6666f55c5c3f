// UI layer: renders an `AnalysisResponse` for the terminal and provides the
// small console helpers (spinner, warning and error lines) used by `app`.
// Rendering is a pure function of the response so the same text can also be
// written, uncolored, to the log file.

use crate::analysis::{AnalysisResponse, Category, Finding};
use crate::error::{Result, VortexError};
use crossterm::style::{Color, Stylize};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Display color per category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: BTreeMap<Category, Color>,
}

impl Default for Palette {
    fn default() -> Self {
        let colors = BTreeMap::from([
            (Category::Vulnerabilities, Color::Green),
            (Category::MetasploitModules, Color::Magenta),
            (Category::Tools, Color::Blue),
            (Category::ExploitLinks, Color::Yellow),
            (Category::Other, Color::Cyan),
        ]);
        Palette { colors }
    }
}

impl Palette {
    /// Defaults overridden by a `{category: color}` table from the config
    /// file. Unknown categories or color names are rejected.
    pub fn with_overrides(overrides: &HashMap<String, String>) -> Result<Self> {
        let mut palette = Palette::default();
        for (key, name) in overrides {
            let category = Category::from_config_key(key)
                .ok_or_else(|| VortexError::Config(format!("unknown color category '{key}'")))?;
            let color = parse_color(name)
                .ok_or_else(|| VortexError::Config(format!("unknown color '{name}' for '{key}'")))?;
            palette.colors.insert(category, color);
        }
        Ok(palette)
    }

    pub fn color(&self, category: Category) -> Color {
        self.colors.get(&category).copied().unwrap_or(Color::Reset)
    }
}

/// Recognized color names for the `[colors]` config table.
pub fn parse_color(name: &str) -> Option<Color> {
    let color = match name.trim().to_ascii_lowercase().as_str() {
        "black" => Color::Black,
        "red" => Color::Red,
        "green" => Color::Green,
        "yellow" => Color::Yellow,
        "blue" => Color::Blue,
        "magenta" => Color::Magenta,
        "cyan" => Color::Cyan,
        "white" => Color::White,
        "grey" | "gray" => Color::Grey,
        "dark_red" => Color::DarkRed,
        "dark_green" => Color::DarkGreen,
        "dark_yellow" => Color::DarkYellow,
        "dark_blue" => Color::DarkBlue,
        "dark_magenta" => Color::DarkMagenta,
        "dark_cyan" => Color::DarkCyan,
        "dark_grey" | "dark_gray" => Color::DarkGrey,
        _ => return None,
    };
    Some(color)
}

/// Formats an analysis as console text, optionally with ANSI colors.
#[derive(Debug, Clone)]
pub struct Renderer {
    palette: Palette,
    color: bool,
}

impl Renderer {
    pub fn new(palette: Palette, color: bool) -> Self {
        Renderer { palette, color }
    }

    /// Plain-text renderer, as used for the log file.
    pub fn plain() -> Self {
        Renderer::new(Palette::default(), false)
    }

    /// Render the analysis. Structured replies are shown one block per
    /// finding; free-text replies as non-empty sections in category order.
    pub fn format(&self, response: &AnalysisResponse) -> String {
        let mut out = String::new();
        out.push_str(&self.paint("--- Gemini AI Vulnerability Analysis ---", Color::Green, false));
        out.push('\n');

        if response.is_empty() {
            out.push('\n');
            out.push_str(&self.paint(
                "No vulnerabilities identified or structured response received.",
                Color::Yellow,
                false,
            ));
            out.push('\n');
        }

        for (index, finding) in response.findings.iter().enumerate() {
            self.push_finding(&mut out, index + 1, finding);
        }

        let categories = if response.findings.is_empty() {
            &Category::ALL[..]
        } else {
            &[][..]
        };
        for &category in categories {
            let entries = response.entries(category);
            if entries.is_empty() {
                continue;
            }
            out.push('\n');
            let heading = format!("{}:", category.label());
            out.push_str(&self.paint(&heading, self.palette.color(category), true));
            out.push('\n');
            for entry in entries {
                out.push_str("  - ");
                out.push_str(entry);
                out.push('\n');
            }
        }

        out.push('\n');
        out.push_str(&self.paint("--- Analysis Complete ---", Color::Green, false));
        out.push('\n');
        out
    }

    fn push_finding(&self, out: &mut String, number: usize, finding: &Finding) {
        let name = non_blank(&finding.name).unwrap_or("N/A");
        let description = non_blank(&finding.description).unwrap_or("N/A");

        out.push('\n');
        let heading = format!("Vulnerability {number}: {name}");
        out.push_str(&self.paint(&heading, self.palette.color(Category::Vulnerabilities), true));
        out.push('\n');
        out.push_str(&format!("{} {description}\n", self.paint("  Description:", Color::Cyan, false)));

        let lists = [
            (Category::MetasploitModules, "Metasploit Modules:", &finding.metasploit_modules, "None suggested."),
            (Category::Tools, "Other Suggested Tools & Formats:", &finding.other_tools_and_formats, "None suggested."),
            (Category::ExploitLinks, "Exploit Links:", &finding.exploit_links, "None provided."),
        ];
        for (category, label, items, none) in lists {
            let label = self.paint(&format!("  {label}"), self.palette.color(category), false);
            let items: Vec<&str> = items.iter().filter_map(|i| non_blank(i)).collect();
            if items.is_empty() {
                out.push_str(&format!("{label} {none}\n"));
                continue;
            }
            out.push_str(&label);
            out.push('\n');
            for item in items {
                out.push_str("    - ");
                out.push_str(item);
                out.push('\n');
            }
        }
    }

    fn paint(&self, text: &str, color: Color, bold: bool) -> String {
        if !self.color {
            return text.to_string();
        }
        let styled = text.with(color);
        if bold {
            styled.bold().to_string()
        } else {
            styled.to_string()
        }
    }
}

fn non_blank(text: &str) -> Option<&str> {
    let text = text.trim();
    (!text.is_empty()).then_some(text)
}

/// Spinner shown on stderr while waiting for the API. Hidden automatically
/// when stderr is not a terminal.
pub fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

pub fn print_note(message: &str, color: bool) {
    if color {
        println!("{}", message.with(Color::Blue));
    } else {
        println!("{message}");
    }
}

pub fn print_warning(message: &str, color: bool) {
    if color {
        eprintln!("{}", format!("Warning: {message}").with(Color::Yellow));
    } else {
        eprintln!("Warning: {message}");
    }
}

pub fn print_error(message: &str, color: bool) {
    if color {
        eprintln!("{}", format!("Error: {message}").with(Color::Red));
    } else {
        eprintln!("Error: {message}");
    }
}
