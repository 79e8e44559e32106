//! Project initialization: `forge-review init`.
//!
//! ```text
//! .forge/
//! ├── review.toml   # Review loop configuration
//! ├── review.db     # Feature and iteration store
//! └── .gitignore    # Keeps the store out of review commits
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::{CONFIG_FILE, ReviewToml};
use crate::store::ReviewDb;

/// The name of the forge configuration directory.
pub const FORGE_DIR: &str = ".forge";

const GITIGNORE: &str = "review.db\nreview.db-*\n";

/// Result of initializing a project.
#[derive(Debug)]
pub struct InitResult {
    pub forge_dir: PathBuf,
    /// False if `.forge/` already existed.
    pub created: bool,
    pub db_path: PathBuf,
}

/// Create `.forge/` with a default config and an empty store.
///
/// Existing files are left untouched, so running it twice is safe.
pub fn init_project(project_dir: &Path) -> Result<InitResult> {
    let forge_dir = get_forge_dir(project_dir);
    let created = !forge_dir.exists();
    std::fs::create_dir_all(&forge_dir)
        .with_context(|| format!("Failed to create {}", forge_dir.display()))?;

    let config_path = forge_dir.join(CONFIG_FILE);
    if !config_path.exists() {
        ReviewToml::default().save(&config_path)?;
    }

    let gitignore = forge_dir.join(".gitignore");
    if !gitignore.exists() {
        std::fs::write(&gitignore, GITIGNORE).context("Failed to write .forge/.gitignore")?;
    }

    let config = ReviewToml::load(&config_path)?;
    let db_path = config.db_path(&forge_dir);
    ReviewDb::new(&db_path)?;

    Ok(InitResult {
        forge_dir,
        created,
        db_path,
    })
}

/// Get the path to the .forge directory for a project.
pub fn get_forge_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(FORGE_DIR)
}

/// Check if a project has been initialized.
pub fn is_initialized(project_dir: &Path) -> bool {
    get_forge_dir(project_dir).join(CONFIG_FILE).exists()
}
