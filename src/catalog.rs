use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const CATALOG_SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageInfo {
    pub file_name: String,
    pub size_bytes: u64,
    pub download_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemePaths {
    pub theme_dir: String,
    pub theme_json: String,
    pub preview: Option<String>,
    pub gallery: Vec<String>,
}

/// One successfully ingested package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeRecord {
    pub id: String,
    pub source_id: String,
    pub name: String,
    pub version: String,
    pub author: String,
    pub description: String,
    pub schema_version: String,
    pub min_app_version: String,
    pub min_platform_version: u64,
    pub tags: Vec<String>,
    pub updated_at: String,
    pub package: PackageInfo,
    pub paths: ThemePaths,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogDocument {
    pub schema_version: String,
    pub generated_at: String,
    pub count: usize,
    pub themes: Vec<ThemeRecord>,
    pub warnings: Vec<String>,
}

/// Case-folded ordering with the raw text as tie-break.
///
/// This is not a locale collation: after case folding, text compares by code
/// point, so Chinese names order by Unicode value rather than by pinyin.
pub fn collate(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// RFC 3339 in UTC with second precision and a `Z` suffix.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl CatalogDocument {
    /// Full rebuild from this run's records and warnings; themes are ordered by name.
    pub fn assemble(mut themes: Vec<ThemeRecord>, warnings: Vec<String>) -> Self {
        themes.sort_by(|a, b| collate(&a.name, &b.name));
        Self {
            schema_version: CATALOG_SCHEMA_VERSION.to_string(),
            generated_at: timestamp(Utc::now()),
            count: themes.len(),
            themes,
            warnings,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        Ok(text)
    }

    /// Write the document, replacing any previous catalog in one rename.
    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = self.to_json().map_err(io::Error::other)?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, text)?;
        fs::rename(&staging, path)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
