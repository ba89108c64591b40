//! `theme.json`: lookup inside a package, parsing, and schema checks.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value, json};

use crate::archive::DecodedEntry;
use crate::error::ManifestError;
use crate::path;

pub const MANIFEST_NAME: &str = "theme.json";
pub const SCHEMA_VERSION: &str = "1.0";

pub const REQUIRED_COLOR_KEYS: [&str; 7] = [
    "theme",
    "background",
    "text_primary",
    "text_secondary",
    "slider_selected",
    "slider_block",
    "slider_unselected",
];

static ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_]+$").expect("static regex"));

/// Parsed manifest. Only guaranteed to be a JSON object; every field is optional.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    fields: Map<String, Value>,
}

impl Manifest {
    pub fn parse(bytes: &[u8]) -> Result<Self, ManifestError> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let text = String::from_utf8_lossy(bytes);
        match serde_json::from_str::<Value>(&text)? {
            Value::Object(fields) => Ok(Self { fields }),
            _ => Err(ManifestError::NotObject),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Text value of a field; numbers and booleans are rendered, empty strings count as absent.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// String elements of `tags`; anything else is dropped.
    pub fn tags(&self) -> Vec<String> {
        match self.get("tags") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// `minPlatformVersion` as a non-negative integer, if it can be read as a number.
    pub fn min_platform_version(&self) -> Option<u64> {
        let number = match self.get("minPlatformVersion")? {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        if !number.is_finite() {
            return None;
        }
        Some(number.max(0.0).trunc() as u64)
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

/// Find the manifest among decoded entries.
///
/// Priority: `{root}/theme.json`, then `theme.json`, then the first entry
/// whose path ends in `/theme.json`. Directory entries and paths failing
/// normalization are never candidates.
pub fn locate<'a>(entries: &'a [DecodedEntry], root: Option<&str>) -> Option<&'a DecodedEntry> {
    let named: Vec<(String, &DecodedEntry)> = entries
        .iter()
        .filter(|e| !e.is_directory)
        .filter_map(|e| path::normalize(&e.raw_path).ok().map(|p| (p, e)))
        .collect();
    let exact = |wanted: &str| {
        named
            .iter()
            .find(|(name, _)| name == wanted)
            .map(|(_, e)| *e)
    };

    let suffix = format!("/{MANIFEST_NAME}");
    root.and_then(|root| exact(&format!("{root}/{MANIFEST_NAME}")))
        .or_else(|| exact(MANIFEST_NAME))
        .or_else(|| {
            named
                .iter()
                .find(|(name, _)| name.to_lowercase().ends_with(&suffix))
                .map(|(_, e)| *e)
        })
}

/// Check a manifest against the published theme schema.
///
/// Returns one message per violation; an empty list means valid.
pub fn validate(data: &Value) -> Vec<String> {
    let mut errors = Vec::new();
    let field = |key: &str| data.get(key).and_then(Value::as_str).unwrap_or("");

    if field("schemaVersion") != SCHEMA_VERSION {
        errors.push(format!("schemaVersion must be {SCHEMA_VERSION}"));
    }
    if !ID_PATTERN.is_match(field("id")) {
        errors.push("id must match ^[a-z0-9_]+$".to_string());
    }
    if field("name").trim().is_empty() {
        errors.push("name is required".to_string());
    }
    match data.get("colors") {
        Some(Value::Object(colors)) => {
            for key in REQUIRED_COLOR_KEYS {
                let present = colors
                    .get(key)
                    .and_then(Value::as_str)
                    .is_some_and(|v| !v.trim().is_empty());
                if !present {
                    errors.push(format!("colors.{key} is required"));
                }
            }
        }
        _ => errors.push("colors must be object".to_string()),
    }
    errors
}

/// Starter manifest for a new theme.
pub fn template(id: &str, name: &str, author: &str, description: &str) -> Value {
    json!({
        "schemaVersion": SCHEMA_VERSION,
        "id": id,
        "name": name,
        "version": "1.0.0",
        "author": author,
        "description": description,
        "minAppVersion": "1.0.0",
        "minPlatformVersion": 1000,
        "colors": {
            "theme": "#00E5FF",
            "background": "#0D1221",
            "text_primary": "rgba(255,244,220,0.92)",
            "text_secondary": "rgba(255,244,220,0.65)",
            "slider_selected": "#00E5FF",
            "slider_block": "#00E5FF",
            "slider_unselected": "rgba(255,244,220,0.2)"
        },
        "text": {
            "title": "rgba(255,244,220,0.92)",
            "body": "rgba(255,244,220,0.82)",
            "caption": "rgba(255,244,220,0.6)",
            "danger": "#E35A5A"
        },
        "backgrounds": {
            "app": { "type": "color", "value": "#0D1221" },
            "card": { "type": "color", "value": "rgba(13,18,33,0.55)" }
        },
        "buttons": {
            "primary": {
                "bg": "rgba(0,229,255,0.18)",
                "text": "#E6FCFF",
                "border": "rgba(0,229,255,0.4)",
                "image": "buttons/primary.png"
            },
            "danger": {
                "bg": "rgba(227,90,90,0.2)",
                "text": "#E35A5A",
                "border": "rgba(227,90,90,0.4)",
                "image": "buttons/danger.png"
            }
        },
        "lyric": {
            "active": "#00E5FF",
            "normal": "#FFF2D9",
            "active_bg": "rgba(0,229,255,0.25)"
        },
        "icons": { "dark_mode": false, "path": "icons" },
        "assets": { "base": ".", "images": "images", "buttons": "buttons" }
    })
}

/// Whether `id` is acceptable as a published theme id.
pub fn is_valid_id(id: &str) -> bool {
    ID_PATTERN.is_match(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::Method;

    fn file(path: &str, bytes: &[u8]) -> DecodedEntry {
        DecodedEntry {
            raw_path: path.to_string(),
            bytes: bytes.to_vec(),
            is_directory: false,
            modified: None,
            method: Method::Stored,
        }
    }

    #[test]
    fn test_locate_prefers_root_manifest() {
        let entries = vec![
            file("aurora/extra/theme.json", b"deep"),
            file("aurora/theme.json", b"root"),
        ];
        let found = locate(&entries, Some("aurora")).unwrap();
        assert_eq!(found.bytes, b"root");
    }

    #[test]
    fn test_locate_top_level_then_nested() {
        let entries = vec![file("x/theme.json", b"nested"), file("theme.json", b"top")];
        assert_eq!(locate(&entries, None).unwrap().bytes, b"top");

        let entries = vec![file("a/readme.md", b""), file("b\\THEME.JSON", b"nested")];
        assert_eq!(locate(&entries, None).unwrap().bytes, b"nested");
    }

    #[test]
    fn test_locate_ignores_directories_and_traversal() {
        let mut dir = file("theme.json/", b"");
        dir.is_directory = true;
        let entries = vec![dir, file("../theme.json", b"evil")];
        assert!(locate(&entries, None).is_none());
    }

    #[test]
    fn test_parse_rejects_non_objects() {
        assert!(matches!(
            Manifest::parse(b"[1, 2]"),
            Err(ManifestError::NotObject)
        ));
        assert!(matches!(
            Manifest::parse(b"\"aurora\""),
            Err(ManifestError::NotObject)
        ));
        assert!(matches!(
            Manifest::parse(b"{not json"),
            Err(ManifestError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_strips_bom() {
        let manifest = Manifest::parse(b"\xEF\xBB\xBF{\"name\": \"A\"}").unwrap();
        assert_eq!(manifest.text("name").as_deref(), Some("A"));
    }

    #[test]
    fn test_field_coercions() {
        let text = r#"{
            "name": "",
            "version": 2,
            "tags": ["dark", 3, "blue"],
            "minPlatformVersion": "1200.7"
        }"#;
        let manifest = Manifest::parse(text.as_bytes()).unwrap();
        assert_eq!(manifest.text("name"), None);
        assert_eq!(manifest.text("version").as_deref(), Some("2"));
        assert_eq!(manifest.tags(), vec!["dark", "blue"]);
        assert_eq!(manifest.min_platform_version(), Some(1200));

        let negative = Manifest::parse(br#"{"minPlatformVersion": -5}"#).unwrap();
        assert_eq!(negative.min_platform_version(), Some(0));
        let junk = Manifest::parse(br#"{"minPlatformVersion": "soon"}"#).unwrap();
        assert_eq!(junk.min_platform_version(), None);
    }

    #[test]
    fn test_template_is_valid() {
        let data = template("aurora", "极光", "Mindrift", "");
        assert!(validate(&data).is_empty(), "{:?}", validate(&data));
    }

    #[test]
    fn test_validate_reports_each_problem() {
        let data = json!({
            "schemaVersion": "2.0",
            "id": "Bad-Id",
            "name": " ",
            "colors": { "theme": "#fff", "background": "" }
        });
        let errors = validate(&data);
        assert!(errors.contains(&"schemaVersion must be 1.0".to_string()));
        assert!(errors.contains(&"id must match ^[a-z0-9_]+$".to_string()));
        assert!(errors.contains(&"name is required".to_string()));
        assert!(errors.contains(&"colors.background is required".to_string()));
        assert!(!errors.contains(&"colors.theme is required".to_string()));
        assert_eq!(errors.len(), 3 + 6);
    }

    #[test]
    fn test_validate_requires_colors_object() {
        let errors = validate(&json!({"schemaVersion": "1.0", "id": "a", "name": "A"}));
        assert_eq!(errors, vec!["colors must be object".to_string()]);
    }

    #[test]
    fn test_is_valid_id() {
        assert!(is_valid_id("aurora_2"));
        assert!(!is_valid_id("Aurora"));
        assert!(!is_valid_id(""));
    }
}
