use crate::remote::Session;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::fs;
use std::path::PathBuf;

/// Where the signed-in session is cached between invocations.
#[derive(Debug, Clone)]
pub struct SessionLocation {
    pub path: PathBuf,
}

impl SessionLocation {
    pub fn default_location() -> Result<Self> {
        Ok(SessionLocation {
            path: data_dir()?.join("session.yml"),
        })
    }
}

pub fn load_session(location: &SessionLocation) -> Result<Option<Session>> {
    if !location.path.exists() {
        return Ok(None);
    }
    let data = fs::read_to_string(&location.path)
        .with_context(|| format!("reading {:?}", location.path))?;
    let session: Session = serde_yaml::from_str(&data).context("parsing session file")?;
    Ok(Some(session))
}

pub fn save_session(location: &SessionLocation, session: &Session) -> Result<()> {
    if let Some(parent) = location.path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    let serialized = serde_yaml::to_string(session).context("serializing session")?;
    fs::write(&location.path, serialized)
        .with_context(|| format!("writing {:?}", location.path))?;
    Ok(())
}

pub fn clear_session(location: &SessionLocation) -> Result<()> {
    if location.path.exists() {
        fs::remove_file(&location.path)
            .with_context(|| format!("removing {:?}", location.path))?;
    }
    Ok(())
}

/// Data directory (session, logs). `TACHES_DATA_DIR` overrides it.
pub fn data_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("TACHES_DATA_DIR") {
        return Ok(PathBuf::from(dir));
    }
    Ok(project_dirs()?.data_dir().to_path_buf())
}

/// Config directory. `TACHES_CONFIG_DIR` overrides it.
pub fn config_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("TACHES_CONFIG_DIR") {
        return Ok(PathBuf::from(dir));
    }
    Ok(project_dirs()?.config_dir().to_path_buf())
}

pub fn logs_dir() -> Result<PathBuf> {
    Ok(data_dir()?.join("logs"))
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", "taches").context("locating data directory")
}
