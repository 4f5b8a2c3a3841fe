//! Configuration loading and persistence.
//!
//! Reads `config.json` from the config directory, applies `APNS_*`
//! environment overrides, and writes the result into a [`Provider`]'s
//! settings. Credentials are referenced by path and read at connect time.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::{fs, path::Path, path::PathBuf};

use crate::codec::DEFAULT_CODEC;
use crate::settings::keys;
use crate::Provider;

/// Gateway client configuration.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct GatewayConfig {
    /// Use the sandbox gateway.
    pub sandbox: bool,
    /// Default codec for messages without an override.
    pub codec: String,
    /// Passphrase for the key or bundle - NOT serialized to disk.
    #[serde(skip)]
    pub passphrase: Option<String>,
    /// PKCS#12 bundle path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pfx_file: Option<PathBuf>,
    /// PEM private key path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_file: Option<PathBuf>,
    /// PEM certificate path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_file: Option<PathBuf>,
    /// PEM trust anchors path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            sandbox: false,
            codec: DEFAULT_CODEC.to_string(),
            passphrase: None,
            pfx_file: None,
            key_file: None,
            cert_file: None,
            ca_file: None,
        }
    }
}

impl GatewayConfig {
    /// Returns the configuration directory path, creating it if necessary.
    ///
    /// `APNS_CONFIG_DIR` overrides the platform config dir.
    pub fn config_dir() -> Result<PathBuf> {
        let dir = if let Ok(dir) = std::env::var("APNS_CONFIG_DIR") {
            PathBuf::from(dir)
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join("apns-gateway")
        };
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Loads configuration from file, with environment variable overrides.
    ///
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            log::debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Loads configuration from a specific file, without overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Apply `APNS_*` overrides looked up through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(sandbox) = lookup("APNS_SANDBOX") {
            self.sandbox = matches!(sandbox.as_str(), "1" | "true" | "yes");
        }
        if let Some(codec) = lookup("APNS_CODEC") {
            self.codec = codec;
        }
        if let Some(passphrase) = lookup("APNS_PASSPHRASE") {
            self.passphrase = Some(passphrase);
        }
        if let Some(path) = lookup("APNS_PFX_FILE") {
            self.pfx_file = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("APNS_KEY_FILE") {
            self.key_file = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("APNS_CERT_FILE") {
            self.cert_file = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("APNS_CA_FILE") {
            self.ca_file = Some(PathBuf::from(path));
        }
    }

    /// Path of the config file.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Persists the configuration to the config file.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Persists the configuration to `path`.
    /// Note: the passphrase is never written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;

        // Set restrictive permissions (owner read/write only)
        #[cfg(unix)]
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;

        Ok(())
    }

    /// Write this configuration into the provider's settings.
    pub fn apply(&self, provider: &Provider) {
        provider
            .set(keys::SANDBOX, self.sandbox)
            .set(keys::CODEC, self.codec.as_str());

        if let Some(passphrase) = &self.passphrase {
            provider.set(keys::PASSPHRASE, passphrase.as_str());
        }

        let files = [
            (keys::PFX_FILE, &self.pfx_file),
            (keys::KEY_FILE, &self.key_file),
            (keys::CERT_FILE, &self.cert_file),
            (keys::CA_FILE, &self.ca_file),
        ];
        for (key, path) in files
            .into_iter()
            .filter_map(|(key, path)| path.as_ref().map(|p| (key, p)))
        {
            provider.set(key, path.to_string_lossy().into_owned());
        }
    }
}
