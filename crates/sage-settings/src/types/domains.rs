//! Domain table settings.

use serde::{Deserialize, Serialize};

/// One row of the domain table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainSettings {
    /// Domain identifier (`[a-z0-9_-]+`).
    pub id: String,
    /// Keywords that select this domain (matched case-insensitively at a
    /// word start).
    pub keywords: Vec<String>,
    /// Curated knowledge file name inside the knowledge directory.
    /// Defaults to `<id>.md`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl DomainSettings {
    /// Create a domain row with the default file name.
    pub fn new(id: impl Into<String>, keywords: &[&str]) -> Self {
        Self {
            id: id.into(),
            keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
            file: None,
        }
    }

    /// File name of this domain's curated knowledge file.
    pub fn curated_file(&self) -> String {
        self.file
            .clone()
            .unwrap_or_else(|| format!("{}.md", self.id))
    }
}

/// Built-in domain table, highest priority first.
pub fn default_domains() -> Vec<DomainSettings> {
    vec![
        DomainSettings::new(
            "render",
            &["render", "manim", "scene", "animation", "explainclip"],
        ),
        DomainSettings::new(
            "sharing",
            &["share", "upload", "discord", "slack", "publish"],
        ),
        DomainSettings::new(
            "notion",
            &["notion", "markdown table", "page block"],
        ),
        DomainSettings::new(
            "maps",
            &["google maps", "geocode", "directions", "place id", "places api"],
        ),
    ]
}
