//! Saved camera list.
//!
//! Stored as YAML, by default at `<user config dir>/camsnap/config.yaml`:
//!
//! ```yaml
//! cameras:
//!   - name: kitchen
//!     host: 192.168.0.175
//!     port: 554
//!     protocol: rtsp
//!     username: tapo
//!     password: secret
//!     rtsp_transport: udp
//!     stream: stream2
//! ```

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CamsnapError, Result};

/// One saved camera.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Camera {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub protocol: String,
    pub username: String,
    pub password: String,
    /// Explicit RTSP path (e.g. a UniFi Protect token); overrides `stream`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,
    /// Preferred lower transport, `tcp` or `udp`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub rtsp_transport: String,
    /// Default stream segment, e.g. `stream1` or `stream2`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stream: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub no_audio: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub audio_codec: String,
}

/// Root of the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cameras: Vec<Camera>,
}

/// `<user config dir>/camsnap/config.yaml`.
pub fn default_config_path() -> Result<PathBuf> {
    let dir = dirs::config_dir()
        .ok_or_else(|| CamsnapError::Config("cannot determine user config directory".to_string()))?;
    Ok(dir.join("camsnap").join("config.yaml"))
}

impl Config {
    /// Read the config at `path`. A missing file yields an empty config.
    pub fn load(path: &Path) -> Result<Self> {
        let data = match fs::read_to_string(path) {
            Ok(d) => d,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&data)?)
    }

    /// Write to `path`, creating parent directories. The file is private
    /// to the user on Unix since it holds camera passwords.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_yaml::to_string(self)?;

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(path)?;
        // `mode` only applies on creation; an existing file keeps its bits.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))?;
        }
        file.write_all(data.as_bytes())?;
        tracing::debug!(path = %path.display(), cameras = self.cameras.len(), "config saved");
        Ok(())
    }

    /// Insert or replace by name. Returns `true` when the camera is new.
    pub fn upsert(&mut self, camera: Camera) -> bool {
        match self.cameras.iter_mut().find(|c| c.name == camera.name) {
            Some(existing) => {
                *existing = camera;
                false
            }
            None => {
                self.cameras.push(camera);
                true
            }
        }
    }

    pub fn find(&self, name: &str) -> Option<&Camera> {
        self.cameras.iter().find(|c| c.name == name)
    }

    /// Like [`find`](Self::find), but a missing camera is an error.
    pub fn require(&self, name: &str) -> Result<&Camera> {
        self.find(name)
            .ok_or_else(|| CamsnapError::Config(format!("camera {name:?} not found")))
    }

    /// Stored `(username, password)` for a discovered `host[:port]`.
    ///
    /// Matches a camera whose host equals `host` or is its host part.
    /// Returns empty strings when nothing matches.
    pub fn credentials_for_host(&self, host: &str) -> (String, String) {
        self.cameras
            .iter()
            .find(|c| {
                !c.host.is_empty()
                    && (c.host == host || host.starts_with(&format!("{}:", c.host)))
            })
            .map(|c| (c.username.clone(), c.password.clone()))
            .unwrap_or_default()
    }
}
