use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ExportError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "figma_export.toml";
const ENV_PREFIX: &str = "FIGMA";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub pages: Vec<PageConfig>,
    #[serde(default = "default_components")]
    pub components: Vec<String>,
    #[serde(default = "default_output")]
    pub output: String,
    #[serde(default = "default_headings")]
    pub headings: Vec<String>,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_sentinels")]
    pub sentinels: Vec<String>,
    #[serde(default)]
    pub markers: Markers,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PageConfig {
    pub id: String,
}

/// Substrings used to find properties and text layers inside an instance.
/// Property keys carry decorative prefixes ("🟣 ID"), so these are partial matches.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Markers {
    pub id: String,
    pub required: String,
    pub header_card: String,
    pub header_property: String,
    pub question_label: String,
    pub current_label: String,
    pub no_change_label: String,
}

impl Default for Markers {
    fn default() -> Self {
        Markers {
            id: "ID".into(),
            required: "Required".into(),
            header_card: "Header".into(),
            header_property: "Header text".into(),
            question_label: "Text input label".into(),
            current_label: "Question (Current)".into(),
            no_change_label: "Question (No Change)".into(),
        }
    }
}

fn default_components() -> Vec<String> {
    vec!["Application Question".into()]
}

fn default_output() -> String {
    "./data".into()
}

fn default_headings() -> Vec<String> {
    ["ID", "Required", "Question", "Current", "No Change", "Flow", "Section"]
        .iter()
        .map(|h| h.to_string())
        .collect()
}

fn default_delimiter() -> String {
    ", ".into()
}

fn default_api_base() -> String {
    "https://api.figma.com/v1".into()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_sentinels() -> Vec<String> {
    vec!["Current: Last name".into(), "No Change: Last name".into()]
}

impl Settings {
    /// Load settings from an optional TOML file, then `FIGMA_*` environment variables.
    pub fn load(path: &Path) -> Result<Self> {
        let settings: Settings = config::Config::builder()
            .add_source(
                config::File::new(&path.to_string_lossy(), config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from a TOML string, without consulting the environment.
    #[cfg(test)]
    pub fn from_toml(source: &str) -> Result<Self> {
        let settings: Settings = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        if self.token.trim().is_empty() {
            problems.push("token is empty (set it in the file or FIGMA_TOKEN)");
        }
        if self.file.trim().is_empty() {
            problems.push("file is empty (set it in the file or FIGMA_FILE)");
        }
        if self.pages.is_empty() {
            problems.push("no pages configured");
        }
        if self.components.iter().all(|c| c.is_empty()) {
            problems.push("no target components configured");
        }
        if self.headings.is_empty() {
            problems.push("no column headings configured");
        }
        if self.delimiter.is_empty() {
            problems.push("delimiter is empty");
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ExportError::Config(problems.join("; ")))
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Pages to run: all configured pages, or just the one named on the command line.
    pub fn select_pages(&self, only: Option<&str>) -> Result<Vec<PageConfig>> {
        match only {
            None => Ok(self.pages.clone()),
            Some(id) => self
                .pages
                .iter()
                .find(|p| p.id == id)
                .cloned()
                .map(|p| vec![p])
                .ok_or_else(|| ExportError::Config(format!("page {} is not configured", id))),
        }
    }

    /// Token with everything but the last four characters hidden.
    pub fn masked_token(&self) -> String {
        let chars: Vec<char> = self.token.chars().collect();
        let keep = chars.len().min(4);
        let tail: String = chars[chars.len() - keep..].iter().collect();
        format!("{}{}", "*".repeat(chars.len() - keep), tail)
    }
}
