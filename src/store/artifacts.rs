use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::error::{AppError, AppResult};

pub const LATENT_MODEL_FILE: &str = "latent_model.json";
pub const CONTENT_MODEL_FILE: &str = "content_model.json";
pub const FUSION_CONFIG_FILE: &str = "fusion_config.json";

/// Locations of the three trained artifacts
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPaths {
    pub latent: PathBuf,
    pub content: PathBuf,
    pub fusion: PathBuf,
}

impl ArtifactPaths {
    /// Standard file names under a models directory
    pub fn in_dir(models_dir: impl AsRef<Path>) -> Self {
        let dir = models_dir.as_ref();
        Self {
            latent: dir.join(LATENT_MODEL_FILE),
            content: dir.join(CONTENT_MODEL_FILE),
            fusion: dir.join(FUSION_CONFIG_FILE),
        }
    }

    pub fn all_exist(&self) -> bool {
        [&self.latent, &self.content, &self.fusion]
            .iter()
            .all(|path| path.exists())
    }
}

/// Writes a model artifact as JSON
///
/// The payload goes to a sibling temporary file which is then renamed over
/// the target, so readers see either the previous artifact or the new one.
pub fn save_artifact<T: Serialize>(path: impl AsRef<Path>, artifact: &T) -> AppResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = temporary_path(path);
    {
        let mut writer = BufWriter::new(fs::File::create(&tmp_path)?);
        serde_json::to_writer(&mut writer, artifact)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    fs::rename(&tmp_path, path)?;

    tracing::info!(path = %path.display(), "Artifact saved");
    Ok(())
}

/// Reads a model artifact written by [`save_artifact`]
pub fn load_artifact<T: DeserializeOwned>(path: impl AsRef<Path>) -> AppResult<T> {
    let path = path.as_ref();
    let file = fs::File::open(path)
        .map_err(|e| AppError::ArtifactNotFound(format!("{}: {}", path.display(), e)))?;

    let artifact = serde_json::from_reader(BufReader::new(file))?;

    tracing::info!(path = %path.display(), "Artifact loaded");
    Ok(artifact)
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
