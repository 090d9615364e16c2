use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::{CatalogError, Result};

const APP_DIR: &str = "culture-catalog";

/// Per-user config location, `None` when the platform has no config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join(APP_DIR).join("config.json"))
}

pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| CatalogError::io(parent, err))?;
        }
    }
    Ok(())
}

pub fn write_text(path: &Path, contents: &str) -> Result<()> {
    ensure_parent(path)?;
    fs::write(path, contents).map_err(|err| CatalogError::io(path, err))
}

pub fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|err| CatalogError::io(path, err))
}
