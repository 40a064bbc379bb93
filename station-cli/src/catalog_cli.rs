//! Station catalog CLI commands
//!
//! Listing, locator resolution and uploads go through a [`Catalog`] built
//! from configuration. `check-version` and `sort` run locally and need no
//! store.

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use std::path::{Path, PathBuf};
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};
use tracing::debug;

use station_core::catalog::{Catalog, CatalogView, ListFilter, LATEST};
use station_core::config::StationConfig;
use station_core::version;

#[derive(Subcommand, Debug)]
pub enum StationCommand {
    /// List mods and their versions, newest first
    List {
        /// Only mods whose id starts with this value
        #[clap(long)]
        mod_id: Option<String>,

        /// Version expression (accepted, not applied yet)
        #[clap(long)]
        version_expr: Option<String>,

        /// Output results as JSON
        #[clap(long)]
        json: bool,
    },

    /// Print the download URL of a mod version ("latest" picks the newest)
    Get {
        /// Mod id
        mod_id: String,

        /// Version, or "latest"
        version: String,
    },

    /// Upload an archive as a new mod version
    Put {
        /// Mod id
        mod_id: String,

        /// Version, e.g. 1.2.3 or 25.4.214123.zh
        version: String,

        /// Archive to upload
        file: PathBuf,
    },

    /// Show how each version string will be ordered
    CheckVersion {
        #[clap(required = true)]
        versions: Vec<String>,
    },

    /// Print versions in catalog order, newest first
    Sort {
        #[clap(required = true)]
        versions: Vec<String>,
    },
}

impl StationCommand {
    pub async fn execute(self, config_path: Option<&Path>) -> Result<()> {
        match self {
            StationCommand::List {
                mod_id,
                version_expr,
                json,
            } => {
                let filter = ListFilter {
                    artifact_id: mod_id,
                    version_expr,
                };
                execute_list(config_path, &filter, json).await
            }
            StationCommand::Get { mod_id, version } => {
                execute_get(config_path, &mod_id, &version).await
            }
            StationCommand::Put {
                mod_id,
                version,
                file,
            } => execute_put(config_path, &mod_id, &version, &file).await,
            StationCommand::CheckVersion { versions } => {
                execute_check_version(&versions);
                Ok(())
            }
            StationCommand::Sort { mut versions } => {
                version::sort_descending(&mut versions);
                for v in &versions {
                    println!("{v}");
                }
                Ok(())
            }
        }
    }
}

/// `~/.config/station/config.yaml`, when present
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("station").join("config.yaml"))
        .filter(|path| path.is_file())
}

fn open_catalog(config_path: Option<&Path>) -> Result<Catalog> {
    let path = config_path.map(Path::to_path_buf).or_else(default_config_path);
    if let Some(path) = &path {
        debug!("Using config file {}", path.display());
    }

    let config =
        StationConfig::load(path.as_deref()).context("Failed to load station configuration")?;
    config
        .validate()
        .context("Station configuration is incomplete")?;

    Catalog::from_config(&config).context("Failed to initialize the object store")
}

/// Table row for listed mods
#[derive(Tabled)]
struct ModRow {
    #[tabled(rename = "Mod")]
    mod_id: String,
    #[tabled(rename = "Latest")]
    latest: String,
    #[tabled(rename = "Versions")]
    versions: String,
}

fn mod_rows(view: &CatalogView) -> Vec<ModRow> {
    view.iter()
        .map(|(id, versions)| ModRow {
            mod_id: id.to_string(),
            latest: versions.first().cloned().unwrap_or_default(),
            versions: versions.join(", "),
        })
        .collect()
}

async fn execute_list(config_path: Option<&Path>, filter: &ListFilter, json: bool) -> Result<()> {
    let catalog = open_catalog(config_path)?;
    let view = catalog
        .list(filter)
        .await
        .context("Failed to list mods")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    if view.is_empty() {
        println!("\nNo mods found.");
        return Ok(());
    }

    println!(
        "\nFound {} mod(s), {} version(s):\n",
        view.artifact_count(),
        view.version_count()
    );

    let table = Table::new(mod_rows(&view))
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string();

    println!("{table}");
    Ok(())
}

async fn execute_get(config_path: Option<&Path>, mod_id: &str, version: &str) -> Result<()> {
    let catalog = open_catalog(config_path)?;

    match catalog
        .resolve(mod_id, version)
        .await
        .with_context(|| format!("Failed to resolve {mod_id}@{version}"))?
    {
        Some(url) => {
            println!("{url}");
            Ok(())
        }
        None => bail!("Mod '{mod_id}' not found"),
    }
}

/// Versions must match the maybe-version grammar to be uploaded
fn check_upload_version(version: &str) -> Result<()> {
    if version == LATEST || !version::is_maybe_version(version) {
        bail!(
            "Invalid version '{version}': expected dot or dash separated numbers \
             with an optional suffix, e.g. 1.2.3 or 25.4.214123.zh"
        );
    }
    Ok(())
}

async fn execute_put(
    config_path: Option<&Path>,
    mod_id: &str,
    version: &str,
    file: &Path,
) -> Result<()> {
    check_upload_version(version)?;

    let content = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read archive {}", file.display()))?;

    let catalog = open_catalog(config_path)?;
    catalog
        .put(mod_id, version, content)
        .await
        .with_context(|| format!("Failed to upload {mod_id}@{version}"))?;

    println!("Uploaded {mod_id}@{version}");
    println!("{}", catalog.get(mod_id, version)?);
    Ok(())
}

/// Table row for version classification
#[derive(Tabled)]
struct VersionRow {
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Class")]
    class: String,
    #[tabled(rename = "Uploadable")]
    uploadable: String,
}

fn version_rows(versions: &[String]) -> Vec<VersionRow> {
    versions
        .iter()
        .map(|v| VersionRow {
            version: v.clone(),
            class: version::classify(v).to_string(),
            uploadable: if check_upload_version(v).is_ok() {
                "yes".to_string()
            } else {
                "no".to_string()
            },
        })
        .collect()
}

fn execute_check_version(versions: &[String]) {
    let table = Table::new(version_rows(versions))
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string();

    println!("{table}");
}
