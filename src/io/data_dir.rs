use std::fs;
use std::path::{Path, PathBuf};

use crate::io::backend::DATA_FILE;
use crate::io::config_io::{CONFIG_TEMPLATE, config_path};

#[derive(Debug, thiserror::Error)]
pub enum DataDirError {
    #[error("could not determine a data directory: set DAYMX_DIR or HOME")]
    NoHome,
    #[error("no daymx data in {0}: run `daymx init` first")]
    NotInitialized(PathBuf),
    #[error("{0} is already initialized")]
    AlreadyInitialized(PathBuf),
    #[error("could not create {path}: {source}")]
    CreateError {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Environment inputs to [`resolve_data_dir`], split out for testing
#[derive(Debug, Clone, Default)]
pub struct DirEnv {
    pub daymx_dir: Option<PathBuf>,
    pub xdg_data_home: Option<PathBuf>,
    pub home: Option<PathBuf>,
}

impl DirEnv {
    pub fn from_process() -> Self {
        let var = |name: &str| std::env::var_os(name).filter(|v| !v.is_empty()).map(PathBuf::from);
        DirEnv {
            daymx_dir: var("DAYMX_DIR"),
            xdg_data_home: var("XDG_DATA_HOME"),
            home: var("HOME"),
        }
    }
}

/// `-C` wins, then `$DAYMX_DIR`, then `$XDG_DATA_HOME/daymx`, then
/// `~/.local/share/daymx`.
pub fn resolve_data_dir(explicit: Option<&Path>, env: &DirEnv) -> Result<PathBuf, DataDirError> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }
    if let Some(dir) = &env.daymx_dir {
        return Ok(dir.clone());
    }
    if let Some(xdg) = &env.xdg_data_home {
        return Ok(xdg.join("daymx"));
    }
    env.home
        .as_ref()
        .map(|home| home.join(".local").join("share").join("daymx"))
        .ok_or(DataDirError::NoHome)
}

pub fn is_initialized(dir: &Path) -> bool {
    dir.join(DATA_FILE).is_file() || config_path(dir).is_file()
}

pub fn require_initialized(dir: &Path) -> Result<(), DataDirError> {
    if is_initialized(dir) {
        Ok(())
    } else {
        Err(DataDirError::NotInitialized(dir.to_path_buf()))
    }
}

/// Create the directory and its config template. The caller writes the
/// first document.
pub fn create_data_dir(dir: &Path) -> Result<(), DataDirError> {
    if is_initialized(dir) {
        return Err(DataDirError::AlreadyInitialized(dir.to_path_buf()));
    }
    fs::create_dir_all(dir).map_err(|source| DataDirError::CreateError {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = config_path(dir);
    fs::write(&path, CONFIG_TEMPLATE).map_err(|source| DataDirError::CreateError { path, source })
}
