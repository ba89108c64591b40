//! Package ingestion: zip files in, extracted theme trees and a catalog out.
//!
//! Each package is processed on its own. Any failure for one package is
//! turned into a catalog warning and the run moves on to the next one.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use filetime::FileTime;
use tracing::{debug, info, warn};

use crate::archive::{self, DecodedEntry};
use crate::catalog::{self, CatalogDocument, PackageInfo, ThemePaths, ThemeRecord, collate};
use crate::config::{CatalogDefaults, Layout};
use crate::error::{IngestError, IoContext, ManifestError};
use crate::ident::{IdRegistry, sanitize_id};
use crate::images;
use crate::manifest::{self, MANIFEST_NAME, Manifest};
use crate::path;

/// Terminal state of one package.
#[derive(Debug)]
pub enum Outcome {
    Ingested(ThemeRecord),
    Skipped { file_name: String, reason: String },
}

impl Outcome {
    /// Catalog warning line for a skipped package.
    pub fn warning(&self) -> Option<String> {
        match self {
            Self::Ingested(_) => None,
            Self::Skipped { file_name, reason } => Some(format!("{file_name}: {reason}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    layout: Layout,
    defaults: CatalogDefaults,
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Empty `dir`, creating it if needed.
fn clean_directory(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    for child in fs::read_dir(dir)? {
        let child = child?.path();
        if fs::symlink_metadata(&child)?.is_dir() {
            fs::remove_dir_all(&child)?;
        } else {
            fs::remove_file(&child)?;
        }
    }
    Ok(())
}

fn local_to_system(stamp: NaiveDateTime) -> Option<SystemTime> {
    Local
        .from_local_datetime(&stamp)
        .earliest()
        .map(SystemTime::from)
}

impl Pipeline {
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            defaults: CatalogDefaults::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: CatalogDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Rebuild everything: clear outputs, ingest every package, write the catalog.
    ///
    /// Only failures to prepare the output tree or write the catalog are
    /// returned as errors. Bad packages end up in `warnings`.
    pub fn run(&self) -> Result<CatalogDocument> {
        self.prepare_output()?;
        let archives = self.discover().with_context(|| {
            format!(
                "Failed to list packages in {}",
                self.layout.packages_dir.display()
            )
        })?;
        info!("Found {} package(s)", archives.len());

        let mut ids = IdRegistry::new();
        let mut themes = Vec::new();
        let mut warnings = Vec::new();
        for archive in &archives {
            match self.process(archive, &mut ids) {
                Outcome::Ingested(record) => themes.push(record),
                skipped => warnings.extend(skipped.warning()),
            }
        }

        let catalog = CatalogDocument::assemble(themes, warnings);
        let target = self.layout.catalog_path();
        catalog
            .write_to(&target)
            .with_context(|| format!("Failed to write catalog {}", target.display()))?;
        Ok(catalog)
    }

    fn prepare_output(&self) -> Result<()> {
        for dir in [self.layout.themes_dir(), self.layout.downloads_dir()] {
            clean_directory(&dir)
                .with_context(|| format!("Failed to clean {}", dir.display()))?;
        }
        let data = self.layout.data_dir();
        fs::create_dir_all(&data).with_context(|| format!("Failed to create {}", data.display()))
    }

    /// Every `*.zip` (any case) in the packages directory, in collated file-name order.
    pub fn discover(&self) -> io::Result<Vec<PathBuf>> {
        let dir = &self.layout.packages_dir;
        let listing = match fs::read_dir(dir) {
            Ok(listing) => listing,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("Packages directory {} does not exist", dir.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let mut archives = Vec::new();
        for entry in listing {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_lowercase();
            if name.ends_with(".zip") && entry.file_type()?.is_file() {
                archives.push(entry.path());
            }
        }
        archives.sort_by(|a, b| collate(&display_name(a), &display_name(b)));
        debug!("Discovered {:?}", archives);
        Ok(archives)
    }

    /// Ingest one package, converting any failure into [`Outcome::Skipped`].
    pub fn process(&self, archive: &Path, ids: &mut IdRegistry) -> Outcome {
        match self.ingest(archive, ids) {
            Ok(record) => {
                info!("Ingested {} as {}", display_name(archive), record.id);
                Outcome::Ingested(record)
            }
            Err(err) => {
                let file_name = display_name(archive);
                warn!("Skipping {file_name}: {err}");
                Outcome::Skipped {
                    file_name,
                    reason: err.to_string(),
                }
            }
        }
    }

    /// Ingest one package. The assigned id is claimed in `ids` only on success.
    pub fn ingest(&self, archive: &Path, ids: &mut IdRegistry) -> Result<ThemeRecord, IngestError> {
        let file_name = display_name(archive);
        let data = fs::read(archive).io_context(|| format!("failed to read {file_name}"))?;
        let entries = archive::decode(&data)?;

        let root = path::extraction_root(
            entries
                .iter()
                .filter(|e| !e.is_directory)
                .map(|e| e.raw_path.as_str()),
        );
        let manifest_entry =
            manifest::locate(&entries, root.as_deref()).ok_or(ManifestError::Missing)?;
        let manifest = Manifest::parse(&manifest_entry.bytes)?;
        for problem in manifest::validate(&manifest.as_value()) {
            warn!("{file_name}: {problem}");
        }

        let id = ids.propose(&self.base_id(&manifest, archive));
        let theme_dir = self.layout.themes_dir().join(&id);
        extract(&entries, root.as_deref(), &theme_dir)?;

        let download = self.layout.downloads_dir().join(&file_name);
        if let Err(err) = copy_download(archive, &download) {
            let _ = fs::remove_dir_all(&theme_dir);
            return Err(err);
        }

        let images = images::collect_images(&theme_dir);
        let preview = images::pick_preview(&images);
        let gallery = images::rank_gallery(&images, preview);
        let manifest_path = path::strip_root(&manifest_entry.raw_path, root.as_deref())
            .unwrap_or_else(|_| MANIFEST_NAME.to_string());

        let stat = fs::metadata(archive).io_context(|| format!("failed to stat {file_name}"))?;
        let modified = stat.modified().map(DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now());
        let defaults = &self.defaults;

        let record = ThemeRecord {
            source_id: manifest.text("id").unwrap_or_else(|| id.clone()),
            name: manifest.text("name").unwrap_or_else(|| id.clone()),
            version: manifest.text("version").unwrap_or_else(|| defaults.version.clone()),
            author: manifest.text("author").unwrap_or_else(|| defaults.author.clone()),
            description: manifest
                .text("description")
                .unwrap_or_else(|| defaults.description.clone()),
            schema_version: manifest
                .text("schemaVersion")
                .unwrap_or_else(|| defaults.schema_version.clone()),
            min_app_version: manifest
                .text("minAppVersion")
                .unwrap_or_else(|| defaults.min_app_version.clone()),
            min_platform_version: manifest
                .min_platform_version()
                .unwrap_or(defaults.min_platform_version),
            tags: manifest.tags(),
            updated_at: catalog::timestamp(modified),
            package: PackageInfo {
                file_name,
                size_bytes: stat.len(),
                download_url: self.url(&download),
            },
            paths: ThemePaths {
                theme_dir: self.url(&theme_dir),
                theme_json: self.url(&theme_dir.join(&manifest_path)),
                preview: preview.map(|p| self.url(&theme_dir.join(p))),
                gallery: gallery.iter().map(|g| self.url(&theme_dir.join(g))).collect(),
            },
            id: id.clone(),
        };
        ids.commit(id);
        Ok(record)
    }

    /// Sanitized manifest id, else the sanitized file stem, else the configured fallback.
    fn base_id(&self, manifest: &Manifest, archive: &Path) -> String {
        let from_manifest = manifest.text("id").map(|raw| sanitize_id(&raw));
        let from_file = archive
            .file_stem()
            .map(|stem| sanitize_id(&stem.to_string_lossy()));
        [from_manifest, from_file]
            .into_iter()
            .flatten()
            .find(|id| !id.is_empty())
            .unwrap_or_else(|| self.defaults.theme_id.clone())
    }

    fn url(&self, path: &Path) -> String {
        self.layout
            .public_url(path)
            .unwrap_or_else(|| path.to_string_lossy().replace('\\', "/"))
    }
}

/// Extract into a staging directory next to `dest`, renaming it into place on success.
///
/// Entries whose path is rejected by the path safety layer are skipped.
fn extract(
    entries: &[DecodedEntry],
    root: Option<&str>,
    dest: &Path,
) -> Result<usize, IngestError> {
    let parent = dest.parent().unwrap_or(Path::new("."));
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let staging = parent.join(format!(".staging-{name}"));
    if staging.exists() {
        fs::remove_dir_all(&staging)
            .io_context(|| format!("failed to clear {}", staging.display()))?;
    }
    fs::create_dir_all(&staging)
        .io_context(|| format!("failed to create {}", staging.display()))?;

    match write_entries(entries, root, &staging) {
        Ok(written) => {
            fs::rename(&staging, dest)
                .io_context(|| format!("failed to move theme into {}", dest.display()))?;
            Ok(written)
        }
        Err(err) => {
            let _ = fs::remove_dir_all(&staging);
            Err(err)
        }
    }
}

fn write_entries(
    entries: &[DecodedEntry],
    root: Option<&str>,
    staging: &Path,
) -> Result<usize, IngestError> {
    let mut written = 0;
    for entry in entries.iter().filter(|e| !e.is_directory) {
        let target = match path::strip_root(&entry.raw_path, root)
            .and_then(|relative| path::resolve_within(staging, &relative))
        {
            Ok(target) => target,
            Err(err) => {
                debug!("Dropping entry {:?}: {err}", entry.raw_path);
                continue;
            }
        };

        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir).io_context(|| format!("failed to create {}", dir.display()))?;
        }
        fs::write(&target, &entry.bytes)
            .io_context(|| format!("failed to write {}", entry.raw_path))?;
        if let Some(time) = entry.modified.and_then(local_to_system) {
            let _ = filetime::set_file_mtime(&target, FileTime::from_system_time(time));
        }
        written += 1;
    }
    Ok(written)
}

/// Copy the package unmodified, keeping its modification time.
fn copy_download(source: &Path, target: &Path) -> Result<(), IngestError> {
    if let Some(dir) = target.parent() {
        fs::create_dir_all(dir).io_context(|| format!("failed to create {}", dir.display()))?;
    }
    fs::copy(source, target).io_context(|| format!("failed to copy to {}", target.display()))?;
    if let Ok(meta) = fs::metadata(source) {
        let _ = filetime::set_file_mtime(target, FileTime::from_last_modification_time(&meta));
    }
    Ok(())
}
