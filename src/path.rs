//! Normalization and containment checks for every path crossing the archive boundary.
//!
//! Entry names inside a zip are untrusted: they may use backslashes, start
//! with `/`, or carry `..` segments aimed at escaping the extraction
//! directory. Everything written to disk goes through [`normalize`] and then
//! [`resolve_within`].

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use crate::error::PathError;

/// Canonical forward-slash relative form of an entry path.
///
/// Backslashes become `/`, leading slashes are stripped, empty and `.`
/// segments are dropped. Rejects the empty result and any `..` segment.
pub fn normalize(raw: &str) -> Result<String, PathError> {
    let unified = raw.replace('\\', "/");
    let mut segments = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(PathError::Traversal(raw.to_string())),
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        return Err(PathError::Empty);
    }
    Ok(segments.join("/"))
}

fn first_segment(path: &str) -> Option<&str> {
    path.split('/').find(|s| !s.is_empty())
}

/// The single wrapper directory shared by every path, if there is one.
///
/// Paths that fail normalization are ignored. A path consisting of a single
/// segment sits at the top level, so its presence rules out a wrapper.
pub fn extraction_root<'a, I>(paths: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut roots = BTreeSet::new();
    for raw in paths {
        let Ok(normalized) = normalize(raw) else {
            continue;
        };
        let Some((first, _rest)) = normalized.split_once('/') else {
            return None;
        };
        roots.insert(first.to_string());
        if roots.len() > 1 {
            return None;
        }
    }
    roots.into_iter().next()
}

/// Normalize `raw` and remove the wrapper directory `root` when it leads the path.
pub fn strip_root(raw: &str, root: Option<&str>) -> Result<String, PathError> {
    let normalized = normalize(raw)?;
    let Some(root) = root else {
        return Ok(normalized);
    };
    if first_segment(&normalized) != Some(root) {
        return Ok(normalized);
    }
    match normalized.split_once('/') {
        Some((_, rest)) => normalize(rest),
        None => Err(PathError::Empty),
    }
}

/// Join a relative entry path onto `dest` and prove the result stays inside it.
///
/// `dest` must exist; it is canonicalized so the prefix check compares real
/// locations rather than spellings.
pub fn resolve_within(dest: &Path, relative: &str) -> Result<PathBuf, PathError> {
    let safe = normalize(relative)?;
    let base = dest
        .canonicalize()
        .map_err(|_| PathError::Escapes(dest.to_path_buf()))?;

    let mut target = base.clone();
    for component in Path::new(&safe).components() {
        match component {
            Component::Normal(part) => target.push(part),
            Component::CurDir => {}
            Component::ParentDir => return Err(PathError::Traversal(relative.to_string())),
            Component::RootDir | Component::Prefix(_) => {
                return Err(PathError::Escapes(PathBuf::from(relative)));
            }
        }
    }

    if target == base || !target.starts_with(&base) {
        return Err(PathError::Escapes(target));
    }
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_normalize_separators_and_leading_slashes() {
        assert_eq!(normalize("a\\b\\c.png").unwrap(), "a/b/c.png");
        assert_eq!(normalize("///etc/theme.json").unwrap(), "etc/theme.json");
        assert_eq!(normalize("\\\\share\\x").unwrap(), "share/x");
        assert_eq!(normalize("a//./b/").unwrap(), "a/b");
    }

    #[test]
    fn test_normalize_rejects_empty() {
        assert_eq!(normalize(""), Err(PathError::Empty));
        assert_eq!(normalize("///"), Err(PathError::Empty));
        assert_eq!(normalize("./."), Err(PathError::Empty));
    }

    #[test]
    fn test_normalize_rejects_traversal() {
        assert!(matches!(
            normalize("../../etc/passwd"),
            Err(PathError::Traversal(_))
        ));
        assert!(matches!(normalize("a/../../b"), Err(PathError::Traversal(_))));
        assert!(matches!(normalize("a/b/../c"), Err(PathError::Traversal(_))));
        assert!(matches!(normalize("..\\x"), Err(PathError::Traversal(_))));
    }

    #[test]
    fn test_dotted_names_are_not_traversal() {
        assert_eq!(normalize("a/..b/c").unwrap(), "a/..b/c");
        assert_eq!(normalize("v1..2/x").unwrap(), "v1..2/x");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let inputs = [
            "a/b",
            "\\a\\b",
            "/x//y/./z/",
            "mytheme/images/bg.png",
            "./preview.png",
            "a/..b",
        ];
        for input in inputs {
            let once = normalize(input).unwrap();
            assert_eq!(normalize(&once).unwrap(), once, "input {input:?}");
        }
    }

    /// Every string over `alphabet` up to `max_len` characters.
    fn every_string(alphabet: &[char], max_len: usize) -> Vec<String> {
        let mut all = vec![String::new()];
        let mut frontier = vec![String::new()];
        for _ in 0..max_len {
            frontier = frontier
                .iter()
                .flat_map(|prefix| alphabet.iter().map(move |c| format!("{prefix}{c}")))
                .collect();
            all.extend(frontier.iter().cloned());
        }
        all
    }

    #[test]
    fn test_normalize_sweep() {
        for input in every_string(&['a', '.', '/', '\\', 'b'], 6) {
            let unified = input.replace('\\', "/");
            let segments: Vec<_> = unified.split('/').collect();
            match normalize(&input) {
                Ok(once) => {
                    assert_eq!(normalize(&once).as_ref(), Ok(&once), "input {input:?}");
                    assert!(!once.contains('\\') && !once.starts_with('/'), "{once:?}");
                    assert!(
                        once.split('/').all(|s| !matches!(s, "" | "." | "..")),
                        "input {input:?} gave {once:?}"
                    );
                }
                Err(PathError::Traversal(raw)) => {
                    assert_eq!(raw, input);
                    assert!(segments.contains(&".."), "input {input:?}");
                }
                Err(PathError::Empty) => {
                    assert!(segments.iter().all(|s| matches!(*s, "" | ".")), "{input:?}");
                }
                Err(other) => panic!("unexpected {other} for {input:?}"),
            }
        }
    }

    #[test]
    fn test_extraction_root_single_wrapper() {
        let paths = ["mytheme/theme.json", "mytheme/images/bg.png"];
        assert_eq!(extraction_root(paths), Some("mytheme".to_string()));
    }

    #[test]
    fn test_extraction_root_mixed_top_level() {
        assert_eq!(extraction_root(["a/x", "b/y"]), None);
    }

    #[test]
    fn test_extraction_root_top_level_file() {
        assert_eq!(extraction_root(["theme.json"]), None);
        assert_eq!(extraction_root(["pack/theme.json", "pack"]), None);
    }

    #[test]
    fn test_extraction_root_ignores_unsafe_and_backslashes() {
        let paths = ["skin\\theme.json", "skin/a.png", "../evil", ""];
        assert_eq!(extraction_root(paths), Some("skin".to_string()));
    }

    #[test]
    fn test_strip_root() {
        assert_eq!(
            strip_root("mytheme/images/bg.png", Some("mytheme")).unwrap(),
            "images/bg.png"
        );
        assert_eq!(strip_root("other/x.png", Some("mytheme")).unwrap(), "other/x.png");
        assert_eq!(strip_root("a/x", None).unwrap(), "a/x");
        assert_eq!(strip_root("mytheme/", Some("mytheme")), Err(PathError::Empty));
    }

    #[test]
    fn test_resolve_within() {
        let dir = tempdir().unwrap();
        let target = resolve_within(dir.path(), "images/bg.png").unwrap();
        let base = dir.path().canonicalize().unwrap();
        assert_eq!(target, base.join("images").join("bg.png"));

        assert!(resolve_within(dir.path(), "../outside").is_err());
        assert!(resolve_within(dir.path(), "").is_err());
    }
}
