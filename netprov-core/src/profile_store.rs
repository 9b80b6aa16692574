use crate::traits::ProfileRegistry;
use crate::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A credential record staged on disk.
pub struct WirelessProfile {
    pub ssid: String,
    pub password: String,
    pub staged_path: PathBuf,
}

impl fmt::Debug for WirelessProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WirelessProfile")
            .field("ssid", &self.ssid)
            .field("password", &"********")
            .field("staged_path", &self.staged_path)
            .finish()
    }
}

/// Stages, registers and removes named wireless profiles on the host.
pub struct ProfileStore {
    registry: Arc<dyn ProfileRegistry>,
    staging_dir: PathBuf,
}

impl ProfileStore {
    pub fn new(registry: Arc<dyn ProfileRegistry>, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            staging_dir: staging_dir.into(),
        }
    }

    pub fn staged_path(&self, ssid: &str) -> PathBuf {
        self.staging_dir.join(self.registry.profile_file_name(ssid))
    }

    /// Every profile name the host knows, in the host's order.
    pub async fn list_known_profiles(&self) -> Result<Vec<String>> {
        self.registry
            .known_profiles()
            .await
            .map_err(|e| Error::Registration(e.to_string()))
    }

    /// Writes the staged record for `ssid`, replacing any earlier one.
    pub async fn stage(&self, ssid: &str, password: &str) -> Result<WirelessProfile> {
        tokio::fs::create_dir_all(&self.staging_dir).await?;
        let staged_path = self.staged_path(ssid);
        let body = self.registry.render_profile(ssid, password);
        tokio::fs::write(&staged_path, body).await?;
        tracing::debug!(ssid = %ssid, path = %staged_path.display(), "Profile staged");

        Ok(WirelessProfile {
            ssid: ssid.to_string(),
            password: password.to_string(),
            staged_path,
        })
    }

    /// Asks the host to adopt the staged record.
    pub async fn register(&self, profile: &WirelessProfile) -> Result<()> {
        self.registry
            .add(&profile.staged_path)
            .await
            .map_err(|e| Error::Registration(e.to_string()))?;
        tracing::debug!(ssid = %profile.ssid, "Profile registered on host");
        Ok(())
    }

    /// Removes the host record named `ssid`. Absence is not an error.
    pub async fn unregister(&self, ssid: &str) -> Result<()> {
        let known = self.list_known_profiles().await?;
        if !known.iter().any(|name| name == ssid) {
            return Ok(());
        }
        self.registry
            .delete(ssid)
            .await
            .map_err(|e| Error::Registration(e.to_string()))?;
        tracing::debug!(ssid = %ssid, "Profile removed from host");
        Ok(())
    }

    /// Deletes the staged record file. Absence is not an error.
    pub async fn discard_staged(&self, ssid: &str) -> Result<()> {
        remove_if_present(&self.staged_path(ssid)).await
    }

    /// Issues a connection to a registered profile.
    pub async fn connect(&self, ssid: &str) -> Result<()> {
        self.registry
            .connect(ssid)
            .await
            .map_err(|e| Error::Registration(e.to_string()))
    }
}

async fn remove_if_present(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Maps an SSID onto a file-name-safe stem; the staged record must never land
/// outside the staging directory whatever the SSID contains.
pub fn file_stem_for(ssid: &str) -> String {
    let stem: String = ssid
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() { "_".to_string() } else { stem }
}
