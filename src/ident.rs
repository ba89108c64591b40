use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9_]+").expect("static regex"));
static UNDERSCORE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_+").expect("static regex"));

/// Lowercase, collapse runs outside `[a-z0-9_]` to `_`, trim underscores.
///
/// May return an empty string; callers supply their own fallback.
pub fn sanitize_id(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let replaced = DISALLOWED.replace_all(&lowered, "_");
    UNDERSCORE_RUNS
        .replace_all(&replaced, "_")
        .trim_matches('_')
        .to_string()
}

/// Ids handed out during one catalog build.
///
/// Collisions get `_2`, `_3`, ... appended, taking the first free suffix.
#[derive(Debug, Default)]
pub struct IdRegistry {
    used: HashSet<String>,
}

impl IdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// First free id derived from `base`, without claiming it.
    pub fn propose(&self, base: &str) -> String {
        if !self.contains(base) {
            return base.to_string();
        }
        (2u32..)
            .map(|n| format!("{base}_{n}"))
            .find(|candidate| !self.contains(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    pub fn commit(&mut self, id: String) {
        self.used.insert(id);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.used.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_id() {
        assert_eq!(sanitize_id("Aurora"), "aurora");
        assert_eq!(sanitize_id("  Night-Sky v2 "), "night_sky_v2");
        assert_eq!(sanitize_id("__a__b__"), "a_b");
        assert_eq!(sanitize_id("极光 theme!"), "theme");
        assert_eq!(sanitize_id("极光"), "");
        assert_eq!(sanitize_id(""), "");
    }

    #[test]
    fn test_sanitize_is_stable() {
        for raw in ["Aurora", "a--b", "x_1"] {
            let once = sanitize_id(raw);
            assert_eq!(sanitize_id(&once), once);
        }
    }

    #[test]
    fn test_collisions_take_first_free_suffix() {
        let mut ids = IdRegistry::new();
        for expected in ["aurora", "aurora_2", "aurora_3"] {
            let id = ids.propose("aurora");
            assert_eq!(id, expected);
            ids.commit(id);
        }
    }

    #[test]
    fn test_suffix_skips_taken_names() {
        let mut ids = IdRegistry::new();
        ids.commit("aurora".to_string());
        ids.commit("aurora_2".to_string());
        assert_eq!(ids.propose("aurora"), "aurora_3");
        assert_eq!(ids.propose("aurora_2"), "aurora_2_2");
        assert!(ids.contains("aurora_2"));
        assert!(!ids.contains("aurora_3"));
    }

    #[test]
    fn test_propose_does_not_claim() {
        let ids = IdRegistry::new();
        assert_eq!(ids.propose("x"), "x");
        assert!(!ids.contains("x"));
    }
}
