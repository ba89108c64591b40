//! Preview and gallery selection for an extracted theme.

use std::cmp::Ordering;
use std::path::Path;

use walkdir::WalkDir;

use crate::catalog::collate;

pub const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "webp", "gif", "svg"];

pub const PREVIEW_CANDIDATES: [&str; 5] = [
    "preview.png",
    "preview.jpg",
    "preview.jpeg",
    "preview.webp",
    "preview.gif",
];

pub const GALLERY_LIMIT: usize = 8;

/// Gallery ranking tiers, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GalleryTier {
    Preview,
    PreviewNamed,
    Background,
    ImagesDir,
    Other,
}

impl GalleryTier {
    pub fn of(image: &str, preview: Option<&str>) -> Self {
        let lower = image.to_lowercase();
        if preview == Some(image) {
            Self::Preview
        } else if lower.contains("preview") {
            Self::PreviewNamed
        } else if lower.contains("bg") || lower.contains("background") {
            Self::Background
        } else if lower.starts_with("images/") {
            Self::ImagesDir
        } else {
            Self::Other
        }
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Every image under `dir`, as sorted `/`-separated paths relative to it.
pub fn collect_images(dir: &Path) -> Vec<String> {
    let mut images: Vec<String> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_image(e.path()))
        .filter_map(|e| {
            let relative = e.path().strip_prefix(dir).ok()?;
            let parts: Vec<_> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            Some(parts.join("/"))
        })
        .collect();
    images.sort_by(|a, b| collate(a, b));
    images
}

/// Known preview file name at the top level, else anything named "preview", else the first image.
pub fn pick_preview(images: &[String]) -> Option<&str> {
    PREVIEW_CANDIDATES
        .iter()
        .find_map(|candidate| images.iter().find(|image| image.to_lowercase() == *candidate))
        .or_else(|| images.iter().find(|image| image.to_lowercase().contains("preview")))
        .or_else(|| images.first())
        .map(String::as_str)
}

fn gallery_order(a: &str, b: &str, preview: Option<&str>) -> Ordering {
    GalleryTier::of(a, preview)
        .cmp(&GalleryTier::of(b, preview))
        .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
        .then_with(|| a.cmp(b))
}

/// Images ranked by [`GalleryTier`], ties broken lexicographically, at most [`GALLERY_LIMIT`].
pub fn rank_gallery(images: &[String], preview: Option<&str>) -> Vec<String> {
    let mut ordered = images.to_vec();
    ordered.sort_by(|a, b| gallery_order(a, b, preview));
    ordered.truncate(GALLERY_LIMIT);
    ordered
}
