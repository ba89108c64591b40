use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Where packages are read from and where the published site lives.
///
/// ```text
/// <packages>/*.zip          input packages
/// <public>/themes/<id>/     extracted theme trees
/// <public>/downloads/       copies of the input packages
/// <public>/data/themes.json catalog document
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub packages_dir: PathBuf,
    pub public_root: PathBuf,
}

impl Layout {
    pub fn new(packages_dir: impl Into<PathBuf>, public_root: impl Into<PathBuf>) -> Self {
        Self {
            packages_dir: packages_dir.into(),
            public_root: public_root.into(),
        }
    }

    /// Default layout: `packages/` under `root`, published files directly in `root`.
    pub fn from_root(root: &Path) -> Self {
        Self::new(root.join("packages"), root)
    }

    pub fn themes_dir(&self) -> PathBuf {
        self.public_root.join("themes")
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.public_root.join("downloads")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.public_root.join("data")
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.data_dir().join("themes.json")
    }

    /// Site-relative URL (`./a/b`) for a path under the public root.
    pub fn public_url(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.public_root).ok()?;
        let parts: Vec<_> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(format!("./{}", parts.join("/")))
    }
}

/// Values recorded for fields a manifest leaves out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogDefaults {
    pub version: String,
    pub author: String,
    pub description: String,
    pub schema_version: String,
    pub min_app_version: String,
    pub min_platform_version: u64,
    /// Fallback id when neither the manifest nor the file name yields one.
    pub theme_id: String,
}

impl Default for CatalogDefaults {
    fn default() -> Self {
        Self {
            version: "1.0.0".to_string(),
            author: "未知作者".to_string(),
            description: "暂无描述".to_string(),
            schema_version: "1.0".to_string(),
            min_app_version: "1.0.0".to_string(),
            min_platform_version: 1000,
            theme_id: "theme".to_string(),
        }
    }
}

impl CatalogDefaults {
    /// Read overrides from a JSON file; keys it leaves out keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read defaults {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid defaults file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_layout_from_root() {
        let layout = Layout::from_root(Path::new("/site"));
        assert_eq!(layout.packages_dir, PathBuf::from("/site/packages"));
        assert_eq!(layout.themes_dir(), PathBuf::from("/site/themes"));
        assert_eq!(layout.downloads_dir(), PathBuf::from("/site/downloads"));
        assert_eq!(layout.catalog_path(), PathBuf::from("/site/data/themes.json"));
    }

    #[test]
    fn test_public_url() {
        let layout = Layout::from_root(Path::new("/site"));
        assert_eq!(
            layout.public_url(Path::new("/site/themes/aurora/preview.png")),
            Some("./themes/aurora/preview.png".to_string())
        );
        assert_eq!(layout.public_url(Path::new("/elsewhere/x")), None);
    }

    #[test]
    fn test_defaults_deserialize_partially() {
        let defaults: CatalogDefaults =
            serde_json::from_str(r#"{"author": "Anonymous", "minPlatformVersion": 7}"#).unwrap();
        assert_eq!(defaults.author, "Anonymous");
        assert_eq!(defaults.min_platform_version, 7);
        assert_eq!(defaults.version, "1.0.0");
    }

    #[test]
    fn test_defaults_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("defaults.json");
        std::fs::write(&path, r#"{"description": "No description"}"#).unwrap();
        let defaults = CatalogDefaults::load(&path).unwrap();
        assert_eq!(defaults.description, "No description");
        assert_eq!(defaults.author, CatalogDefaults::default().author);

        std::fs::write(&path, "[]").unwrap();
        assert!(CatalogDefaults::load(&path).is_err());
        assert!(CatalogDefaults::load(&dir.path().join("missing.json")).is_err());
    }
}
