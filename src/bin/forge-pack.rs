use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use theme_forge::ArchiveEntry;
use theme_forge::manifest::{self, MANIFEST_NAME};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "forge-pack")]
#[command(author, version, about = "Create, check and package theme directories")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scaffold a new theme directory
    Init {
        /// Theme id, e.g. aurora
        #[arg(long)]
        id: String,
        /// Display name
        #[arg(long, default_value = "新主题")]
        name: String,
        #[arg(long, default_value = "")]
        author: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Output directory (defaults to the id)
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Overwrite an existing theme.json
        #[arg(long)]
        force: bool,
    },
    /// Check a theme.json against the theme schema
    Validate {
        #[arg(long)]
        file: PathBuf,
    },
    /// Zip a theme directory
    Pack {
        /// Theme directory containing theme.json
        #[arg(long)]
        dir: PathBuf,
        /// Output archive
        #[arg(long)]
        out: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Init {
            id,
            name,
            author,
            description,
            dir,
            force,
        } => init(&id, &name, &author, &description, dir, force),
        Commands::Validate { file } => validate(&file),
        Commands::Pack { dir, out } => pack(&dir, &out),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init(
    id: &str,
    name: &str,
    author: &str,
    description: &str,
    dir: Option<PathBuf>,
    force: bool,
) -> Result<()> {
    let id = id.trim().to_lowercase();
    if !manifest::is_valid_id(&id) {
        bail!("--id must match ^[a-z0-9_]+$");
    }

    let theme_dir = dir.unwrap_or_else(|| PathBuf::from(&id));
    let theme_json = theme_dir.join(MANIFEST_NAME);
    if theme_json.exists() && !force {
        bail!("{} already exists, use --force", theme_json.display());
    }

    fs::create_dir_all(&theme_dir)
        .with_context(|| format!("Failed to create {}", theme_dir.display()))?;
    let data = manifest::template(&id, name, author, description);
    fs::write(&theme_json, serde_json::to_string_pretty(&data)?)
        .with_context(|| format!("Failed to write {}", theme_json.display()))?;

    for child in ["icons", "images", "buttons"] {
        fs::create_dir_all(theme_dir.join(child))?;
    }
    let preview = theme_dir.join("preview.png");
    if !preview.exists() {
        fs::write(&preview, b"")?;
    }

    println!("Created theme template: {}", theme_dir.display());
    for item in [MANIFEST_NAME, "preview.png", "icons/", "images/", "buttons/"] {
        println!("  {item}");
    }
    Ok(())
}

fn read_and_check(file: &Path) -> Result<()> {
    let bytes = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let parsed = manifest::Manifest::parse(&bytes)
        .with_context(|| format!("Cannot validate {}", file.display()))?;
    let errors = manifest::validate(&parsed.as_value());
    if !errors.is_empty() {
        println!("Validation failed:");
        for item in &errors {
            println!("  - {item}");
        }
        bail!("{} problem(s) in {}", errors.len(), file.display());
    }
    Ok(())
}

fn validate(file: &Path) -> Result<()> {
    read_and_check(file)?;
    println!("Validation passed");
    Ok(())
}

fn pack(dir: &Path, out: &Path) -> Result<()> {
    if !dir.is_dir() {
        bail!("invalid --dir: {}", dir.display());
    }
    let theme_json = dir.join(MANIFEST_NAME);
    if !theme_json.is_file() {
        bail!("{MANIFEST_NAME} is required");
    }
    read_and_check(&theme_json)?;

    let source = dir
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", dir.display()))?;
    let root_name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("Theme directory has no name")?;
    let out_resolved = out.canonicalize().ok();

    println!("Creating theme archive: {}", out.display());

    let mut entries = Vec::new();
    for entry in WalkDir::new(&source)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        if out_resolved.as_deref() == Some(entry.path()) {
            continue;
        }
        entries.push(process_file(entry.path(), &source, &root_name)?);
    }

    let bytes = theme_forge::encode(&entries)?;
    if let Some(parent) = out.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(out, &bytes).with_context(|| format!("Failed to write {}", out.display()))?;

    println!(
        "Successfully packed {} files ({} bytes) to {}",
        entries.len(),
        bytes.len(),
        out.display()
    );
    Ok(())
}

fn process_file(file_path: &Path, base_path: &Path, root_name: &str) -> Result<ArchiveEntry> {
    let relative: Vec<_> = file_path
        .strip_prefix(base_path)
        .unwrap_or(file_path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    let archive_path = format!("{root_name}/{}", relative.join("/"));

    println!("  Adding: {archive_path}");

    let content =
        fs::read(file_path).with_context(|| format!("Failed to read {}", file_path.display()))?;
    let modified = fs::metadata(file_path)?
        .modified()
        .map(|t| DateTime::<Local>::from(t).naive_local())
        .unwrap_or_else(|_| Local::now().naive_local());

    Ok(ArchiveEntry::with_timestamp(archive_path, content, modified))
}
