use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use theme_forge::{CatalogDefaults, Layout, Pipeline};
use tracing_subscriber::EnvFilter;

/// Extract every package and regenerate the theme catalog
#[derive(Parser)]
#[command(name = "forge-index")]
#[command(author, version, about)]
struct Cli {
    /// Project root containing packages/ and the published site
    #[arg(long, env = "THEME_FORGE_ROOT", default_value = ".")]
    root: PathBuf,

    /// Directory holding the *.zip packages (default: <root>/packages)
    #[arg(long, env = "THEME_FORGE_PACKAGES")]
    packages: Option<PathBuf>,

    /// Directory receiving themes/, downloads/ and data/ (default: <root>)
    #[arg(long, env = "THEME_FORGE_PUBLIC")]
    public: Option<PathBuf>,

    /// JSON file overriding the values used for fields a manifest omits
    #[arg(long, env = "THEME_FORGE_DEFAULTS")]
    defaults: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let fallback = Layout::from_root(&cli.root);
    let layout = Layout::new(
        cli.packages.unwrap_or(fallback.packages_dir),
        cli.public.unwrap_or(fallback.public_root),
    );

    let mut pipeline = Pipeline::new(layout);
    if let Some(path) = &cli.defaults {
        pipeline = pipeline.with_defaults(CatalogDefaults::load(path)?);
    }
    let catalog = pipeline.run()?;

    println!(
        "Built catalog with {} theme(s) at {}",
        catalog.count,
        pipeline.layout().catalog_path().display()
    );
    if !catalog.warnings.is_empty() {
        println!("Warnings:");
        for item in &catalog.warnings {
            println!("- {item}");
        }
    }
    Ok(())
}
