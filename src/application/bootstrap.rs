use crate::infrastructure::error::InfraError;
use crate::infrastructure::settings_store::{
    ensure_default_settings, load_settings, settings_path,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct BootstrapResult {
    pub workspace_root: PathBuf,
    pub settings_path: PathBuf,
}

pub fn bootstrap_workspace(workspace_root: &Path) -> Result<BootstrapResult, InfraError> {
    let data_dir = workspace_root.join("data");
    let logs_dir = workspace_root.join("logs");

    fs::create_dir_all(&data_dir)?;
    fs::create_dir_all(&logs_dir)?;

    ensure_default_settings(&data_dir)?;
    let _ = load_settings(&data_dir)?;

    Ok(BootstrapResult {
        workspace_root: workspace_root.to_path_buf(),
        settings_path: settings_path(&data_dir),
    })
}
